//! Configuration management for ORBIT

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(skip)]
    pub verbose: bool,
}

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible server (llama.cpp, Ollama, ...).
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub stream: bool,
    pub system_prompt: String,
}

/// Context budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Declared context size of the server; 0 means unknown.
    pub ctx_target: usize,
    /// Headroom reserved for the system prompt and completion.
    pub reserve: usize,
}

/// Ceilings applied when reading attached files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    pub max_bytes: usize,
    pub max_chars: usize,
}

/// Knowledge store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub excerpt_chars: usize,
    /// Record each asked question back into the store.
    pub auto_ingest: bool,
}

/// Request history log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Log file path; the default lives under the project data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub preview_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            model: "llama".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            timeout_secs: 60,
            stream: false,
            system_prompt: "You are a concise and accurate assistant.".to_string(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ctx_target: 0,
            reserve: crate::context::budget::DEFAULT_RESERVE,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024,
            max_chars: 20_000,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            top_k: 3,
            excerpt_chars: 2_500,
            auto_ingest: true,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            preview_chars: 800,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            context: ContextConfig::default(),
            files: FilesConfig::default(),
            knowledge: KnowledgeConfig::default(),
            history: HistoryConfig::default(),
            verbose: false,
        }
    }
}

/// Get the configuration file path
fn config_path() -> Result<PathBuf> {
    let config_dir = directories::ProjectDirs::from("sh", "orbit", "orbit")
        .context("Failed to determine config directory")?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("config.toml"))
}

/// Load configuration from file or use defaults
pub fn load_config(custom_path: Option<&str>) -> Result<Config> {
    let path = if let Some(p) = custom_path {
        PathBuf::from(p)
    } else {
        config_path()?
    };

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Initialize configuration file with defaults
pub fn init_config() -> Result<PathBuf> {
    let path = config_path()?;

    if path.exists() {
        println!("Configuration file already exists at {:?}", path);
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let default_config = Config::default();
    let content = toml::to_string_pretty(&default_config)
        .context("Failed to serialize default config")?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    println!("Configuration initialized at {:?}", path);
    Ok(path)
}

/// Write `config` to the default config path, overwriting what is there.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;
    Ok(path)
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.llm.endpoint, config.llm.endpoint);
        assert_eq!(parsed.context.reserve, config.context.reserve);
        assert_eq!(parsed.knowledge.top_k, config.knowledge.top_k);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"
[llm]
endpoint = "http://10.0.0.5:8080"
model = "qwen"
temperature = 0.1
max_tokens = 256
timeout_secs = 30
stream = true
system_prompt = "hi"
"#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert_eq!(parsed.llm.model, "qwen");
        assert_eq!(parsed.files.max_chars, FilesConfig::default().max_chars);
        assert_eq!(parsed.history.preview_chars, 800);
    }
}
