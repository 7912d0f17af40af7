//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Consilium - multi-specialist report synthesis
///
/// Sends a clinical document to three specialist model agents in parallel,
/// merges their findings into one integrated report and derives a
/// patient-facing summary with action steps.
///
/// Examples:
///   consilium --input "reports/Laura Garcia.txt"
///   consilium --input case.txt --format json --output case.json
///   consilium --input case.txt --structured
///   consilium --reconcile
///   consilium --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Clinical document to analyze
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "reconcile"]
    )]
    pub input: Option<PathBuf>,

    /// Model used for the analysis [default: gemini-2.5-flash]
    #[arg(short, long, env = "CONSILIUM_MODEL")]
    pub model: Option<String>,

    /// API key for the model service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model service base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Directory for per-stage report files
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Directory for cached results
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .consilium.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for the printed result (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the rendered result to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also extract a structured JSON diagnosis and treatment plan
    #[arg(long)]
    pub structured: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Seconds to wait before retrying an unavailable service
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// Rebuild missing cache entries from the results directory and exit
    #[arg(long, conflicts_with = "input")]
    pub reconcile: bool,

    /// Generate a default .consilium.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the rendered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments against the accepted document extensions.
    pub fn validate(&self, allowed_extensions: &[String]) -> Result<(), String> {
        if self.init_config || self.reconcile {
            return Ok(());
        }

        let Some(ref input) = self.input else {
            return Err("An input document is required".to_string());
        };

        let extension = input
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(format!(
                "Invalid file type '{}'. Allowed: {}",
                input.display(),
                allowed_extensions.join(", ")
            ));
        }

        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err("GEMINI_API_KEY is not set (use --api-key or the environment)".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
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
            tracing::Level::INFO
        }
    }
}
