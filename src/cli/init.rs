//! Init command - interactive setup wizard

use anyhow::Result;
use dialoguer::{Confirm, Input};

use crate::config::{save_config, Config};

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m";
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";
    pub const FG: &str = "\x1b[38;2;212;212;215m";
}

pub async fn run(mut config: Config) -> Result<()> {
    print_banner();

    let endpoint: String = Input::new()
        .with_prompt("Completion endpoint (llama.cpp / Ollama compatible)")
        .default(config.llm.endpoint.clone())
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Model name")
        .default(config.llm.model.clone())
        .interact_text()?;

    let ctx_target: usize = Input::new()
        .with_prompt("Server context size in tokens (0 if unknown)")
        .default(config.context.ctx_target)
        .interact_text()?;

    let stream = Confirm::new()
        .with_prompt("Stream answers token by token?")
        .default(config.llm.stream)
        .interact()?;

    let knowledge = Confirm::new()
        .with_prompt("Enable the local knowledge store?")
        .default(config.knowledge.enabled)
        .interact()?;

    config.llm.endpoint = endpoint.trim().trim_end_matches('/').to_string();
    config.llm.model = model.trim().to_string();
    config.context.ctx_target = ctx_target;
    config.llm.stream = stream;
    config.knowledge.enabled = knowledge;

    let path = save_config(&config)?;
    print_complete(&path.display().to_string());
    Ok(())
}

fn print_banner() {
    println!();
    println!(
        "{}{}  ORBIT Setup{}",
        colors::PRIMARY,
        colors::BOLD,
        colors::RESET
    );
    println!(
        "{}  a few questions and you're ready to ask{}",
        colors::MUTED,
        colors::RESET
    );
    println!();
}

fn print_complete(path: &str) {
    println!();
    println!(
        "{}{}  ✓ Setup complete{}",
        colors::SUCCESS,
        colors::BOLD,
        colors::RESET
    );
    println!("{}  config written to {}{}", colors::MUTED, path, colors::RESET);
    println!();
    println!("{}  Quick start:{}", colors::MUTED, colors::RESET);
    println!(
        "{}  {}orbit ask \"question\"{}     one-shot question{}",
        colors::MUTED,
        colors::FG,
        colors::MUTED,
        colors::RESET
    );
    println!(
        "{}  {}orbit index docs/{}         fill the knowledge store{}",
        colors::MUTED,
        colors::FG,
        colors::MUTED,
        colors::RESET
    );
    println!(
        "{}  {}orbit{}                     interactive shell{}",
        colors::MUTED,
        colors::FG,
        colors::MUTED,
        colors::RESET
    );
    println!();
}
