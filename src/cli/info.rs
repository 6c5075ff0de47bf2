//! Info command - show system information

use anyhow::Result;

use crate::ai::LlmClient;
use crate::config::Config;
use crate::knowledge::persist;

pub async fn run(config: Config) -> Result<()> {
    println!("ORBIT v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information:");
    println!("  OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    println!("  Config dir: {}", config_dir());

    println!();
    println!("Completion endpoint:");
    println!("  URL: {}", config.llm.endpoint);
    println!("  Model: {}", config.llm.model);
    match LlmClient::new(&config.llm) {
        Ok(client) => {
            let status = if client.is_available().await {
                "reachable"
            } else {
                "unreachable"
            };
            println!("  Status: {}", status);
        }
        Err(e) => println!("  Status: client error ({})", e),
    }

    println!();
    println!("Context budget:");
    if config.context.ctx_target > 0 {
        println!("  Target: {} tokens", config.context.ctx_target);
    } else {
        println!("  Target: unset (no compression until learned)");
    }
    println!("  Reserve: {} tokens", config.context.reserve);

    println!();
    println!("Knowledge store:");
    match persist::default_store_path() {
        Ok(path) => {
            let store = persist::load(&path, config.knowledge.enabled);
            println!("  Path: {}", path.display());
            println!("  Documents: {}", store.len());
            println!(
                "  Enabled: {}",
                if config.knowledge.enabled { "yes" } else { "no" }
            );
        }
        Err(e) => println!("  Unavailable: {}", e),
    }

    Ok(())
}

fn config_dir() -> String {
    directories::ProjectDirs::from("sh", "orbit", "orbit")
        .map(|p| p.config_dir().to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
