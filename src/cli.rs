//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// TrialScout - ask questions about clinical trials on ClinicalTrials.gov
///
/// Answers natural-language questions about trials, eligibility criteria,
/// enrollment, durations and sites using a local Ollama model with tool
/// calling. Without a question, starts an interactive shell.
///
/// Examples:
///   trialscout "How many Phase 3 asthma trials are recruiting?"
///   trialscout --model qwen2.5:14b "Sites for melanoma trials in Spain"
///   trialscout --format json "Average duration of completed COPD trials"
///   trialscout
///   trialscout --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Question to answer; omit to start the interactive shell
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Ollama model to use
    ///
    /// The model must support tool calling (e.g. llama3.1, qwen2.5).
    /// Can also be set via TRIALSCOUT_MODEL env var or .trialscout.toml config.
    #[arg(short, long, env = "TRIALSCOUT_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// ClinicalTrials.gov studies endpoint
    #[arg(long, value_name = "URL", env = "TRIALSCOUT_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trialscout.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Model request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Registry request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub registry_timeout: Option<u64>,

    /// Directory for session logs
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Do not write a session log
    #[arg(long)]
    pub no_session_log: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Generate a default .trialscout.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Console text (default)
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The question, if one was given and is not blank.
    pub fn question(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.ollama_url {
            if !is_http_url(url) {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref url) = self.registry_url {
            if !is_http_url(url) {
                return Err("Registry URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) || self.registry_timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.format == OutputFormat::Json && self.question().is_none() {
            return Err("--format json requires a question".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            question: Some("How many asthma trials?".to_string()),
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
    fn test_parse_positional_question() {
        let args = Args::try_parse_from(["trialscout", "--model", "qwen2.5", "Trials for asthma?"])
            .unwrap();
        assert_eq!(args.question(), Some("Trials for asthma?"));
        assert_eq!(args.model.as_deref(), Some("qwen2.5"));
    }

    #[test]
    fn test_blank_question_means_shell() {
        let mut args = make_args();
        args.question = Some("   ".to_string());
        assert!(args.question().is_none());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.registry_url = Some("ftp://example.org".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_temperature_and_timeout() {
        let mut args = make_args();
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.registry_timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_json_format_needs_question() {
        let mut args = make_args();
        args.format = OutputFormat::Json;
        assert!(args.validate().is_ok());

        args.question = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::WARN);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
