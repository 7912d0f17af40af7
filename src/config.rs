//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.consilium.toml` files.

use crate::classify::DEFAULT_INDICATORS;
use crate::llm::gemini::DEFAULT_API_URL;
use crate::store::DOCUMENT_EXTENSIONS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".consilium.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Output classification settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for per-stage text artifacts.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Directory for cached result payloads.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Input document extensions accepted by the CLI.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            cache_dir: default_cache_dir(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_results_dir() -> String {
    "results".to_string()
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

fn default_allowed_extensions() -> Vec<String> {
    DOCUMENT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

/// Model service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used for specialists, synthesis and derived views.
    #[serde(default = "default_model")]
    pub name: String,

    /// Model used for structured extraction.
    #[serde(default = "default_structured_model")]
    pub structured_model: String,

    /// Model service base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum tokens in a response.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Temperature for extraction-style calls.
    #[serde(default = "default_extraction_temperature")]
    pub extraction_temperature: f32,

    /// Temperature for the patient-facing narrative.
    #[serde(default = "default_narrative_temperature")]
    pub narrative_temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Total attempts per call when the service is unavailable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed wait between attempts, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            structured_model: default_structured_model(),
            api_url: default_api_url(),
            max_output_tokens: default_max_output_tokens(),
            extraction_temperature: default_extraction_temperature(),
            narrative_temperature: default_narrative_temperature(),
            timeout_seconds: default_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_structured_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_extraction_temperature() -> f32 {
    0.2
}

fn default_narrative_temperature() -> f32 {
    0.4
}

fn default_timeout() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    15
}

/// Pipeline stage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Run the structured JSON extraction after synthesis.
    #[serde(default)]
    pub structured_extraction: bool,
}

/// Error-shaped output detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Lowercase substrings that mark an output as failed.
    #[serde(default = "default_indicators")]
    pub indicators: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
        }
    }
}

fn default_indicators() -> Vec<String> {
    DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect()
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
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.api_url {
            self.model.api_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(delay) = args.retry_delay {
            self.model.retry_delay_seconds = delay;
        }

        if let Some(ref dir) = args.results_dir {
            self.general.results_dir = dir.display().to_string();
        }
        if let Some(ref dir) = args.cache_dir {
            self.general.cache_dir = dir.display().to_string();
        }

        // Flags only ever enable
        if args.structured {
            self.pipeline.structured_extraction = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "gemini-2.5-flash");
        assert_eq!(config.model.max_attempts, 3);
        assert_eq!(config.model.retry_delay_seconds, 15);
        assert_eq!(config.general.results_dir, "results");
        assert!(config.general.allowed_extensions.contains(&"txt".to_string()));
        assert!(config.classifier.indicators.contains(&"quota".to_string()));
        assert!(!config.pipeline.structured_extraction);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
results_dir = "out"

[model]
name = "gemini-2.5-pro"
narrative_temperature = 0.5
retry_delay_seconds = 2

[pipeline]
structured_extraction = true

[classifier]
indicators = ["refused"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.results_dir, "out");
        assert_eq!(config.general.cache_dir, "cache");
        assert_eq!(config.model.name, "gemini-2.5-pro");
        assert_eq!(config.model.narrative_temperature, 0.5);
        assert_eq!(config.model.retry_delay_seconds, 2);
        assert_eq!(config.model.max_output_tokens, 4096);
        assert!(config.pipeline.structured_extraction);
        assert_eq!(config.classifier.indicators, vec!["refused"]);
    }

    fn args_with_model(model: Option<&str>) -> crate::cli::Args {
        use clap::Parser;
        let mut args = crate::cli::Args::parse_from(["consilium", "--input", "a.txt"]);
        args.model = model.map(String::from);
        args
    }

    #[test]
    fn test_merge_keeps_file_model_without_cli_override() {
        let mut config: Config = toml::from_str("[model]\nname = \"gemini-2.5-pro\"\n").unwrap();
        config.merge_with_args(&args_with_model(None));
        assert_eq!(config.model.name, "gemini-2.5-pro");
    }

    #[test]
    fn test_merge_cli_model_overrides_file() {
        let mut config: Config = toml::from_str("[model]\nname = \"gemini-2.5-pro\"\n").unwrap();
        config.merge_with_args(&args_with_model(Some("gemini-2.5-flash-lite")));
        assert_eq!(config.model.name, "gemini-2.5-flash-lite");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[classifier]"));
    }
}
