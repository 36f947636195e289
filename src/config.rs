//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trialscout.toml` files.

use crate::registry::client::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".trialscout.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_model_timeout() -> u64 {
    300
}

/// ClinicalTrials.gov API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Studies endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_registry_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_registry_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_registry_timeout() -> u64 {
    30
}

/// Conversation and session log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Write a session log.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for session logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Messages kept in the conversation window.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: default_log_dir(),
            max_context_messages: default_max_context_messages(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_context_messages() -> usize {
    40
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_if_exists(Path::new(CONFIG_FILE))
    }

    fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their env fallbacks) take precedence over config
    /// file settings; only values actually provided override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(ref url) = args.registry_url {
            self.registry.base_url = url.clone();
        }
        if let Some(timeout) = args.registry_timeout {
            self.registry.timeout_seconds = timeout;
        }

        if let Some(ref dir) = args.log_dir {
            self.session.log_dir = dir.clone();
        }
        if args.no_session_log {
            self.session.enabled = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, OutputFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn empty_args() -> Args {
        Args {
            question: None,
            model: None,
            ollama_url: None,
            registry_url: None,
            config: None,
            verbose: false,
            quiet: false,
            temperature: None,
            timeout: None,
            registry_timeout: None,
            log_dir: None,
            no_session_log: false,
            format: OutputFormat::Text,
            init_config: false,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.registry.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.registry.timeout_seconds, 30);
        assert!(config.session.enabled);
        assert_eq!(config.session.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[model]
name = "qwen2.5:14b"
temperature = 0.2

[registry]
timeout_seconds = 10

[session]
enabled = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.model.name, "qwen2.5:14b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.timeout_seconds, 300);
        assert_eq!(config.registry.timeout_seconds, 10);
        assert_eq!(config.registry.base_url, DEFAULT_BASE_URL);
        assert!(!config.session.enabled);
        assert_eq!(config.session.max_context_messages, 40);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[registry]\nbase_url = \"http://localhost:8080/studies\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.registry.base_url, "http://localhost:8080/studies");

        assert!(Config::load_if_exists(&file.path().with_extension("missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model\nname = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_merge_only_overrides_given_values() {
        let mut config = Config::default();
        config.model.name = "from-file".to_string();

        let mut args = empty_args();
        config.merge_with_args(&args);
        assert_eq!(config.model.name, "from-file");
        assert!(config.session.enabled);

        args.model = Some("from-cli".to_string());
        args.registry_timeout = Some(5);
        args.no_session_log = true;
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "from-cli");
        assert_eq!(config.registry.timeout_seconds, 5);
        assert!(!config.session.enabled);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[session]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.registry.timeout_seconds, 30);
    }
}
