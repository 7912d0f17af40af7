//! Consilium - multi-specialist clinical report synthesis
//!
//! A CLI tool that fans a clinical document out to three specialist
//! model agents, merges their findings into an integrated report and
//! derives a patient-facing summary, falling back to the last good
//! cached result when the model service fails.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, I/O, invalid arguments)
//!   2 - The pipeline produced no result and no cached result was available

mod classify;
mod cli;
mod config;
mod llm;
mod models;
mod pipeline;
mod report;
mod store;

use anyhow::{Context, Result};
use classify::KeywordClassifier;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use llm::{GeminiService, ModelClient, RetryPolicy};
use pipeline::{AnalysisPipeline, PipelineContext, PipelineSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::{ReportStore, ResultCache};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse_args();

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Consilium v{}", env!("CARGO_PKG_VERSION"));
    debug!("Model override: {:?}, format: {:?}", args.model, args.format);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .consilium.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the model, directories and retry policy.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the requested command. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if let Err(e) = args.validate(&config.general.allowed_extensions) {
        eprintln!("Error: {}", e);
        return Ok(1);
    }

    let classifier = Arc::new(KeywordClassifier::new(&config.classifier.indicators));
    let cache = ResultCache::new(&config.general.cache_dir);

    if args.reconcile {
        println!("🔁 Rebuilding cache from {}", config.general.results_dir);
        let written = cache.reconcile(Path::new(&config.general.results_dir), classifier.as_ref())?;
        println!("✅ Rebuilt {} cache entr{}.", written, if written == 1 { "y" } else { "ies" });
        return Ok(0);
    }

    let input = args.input.clone().context("No input document given")?;
    let api_key = args.api_key.clone().unwrap_or_default();

    let service = GeminiService::new(
        &config.model.api_url,
        &api_key,
        config.model.timeout_seconds,
    )?;
    let client = ModelClient::new(
        Arc::new(service),
        config.model.name.clone(),
        config.model.max_output_tokens,
        RetryPolicy {
            max_attempts: config.model.max_attempts,
            delay: Duration::from_secs(config.model.retry_delay_seconds),
        },
    );

    let ctx = PipelineContext {
        client,
        store: ReportStore::new(&config.general.results_dir),
        cache,
        classifier,
    };
    let settings = PipelineSettings {
        extraction_temperature: config.model.extraction_temperature,
        narrative_temperature: config.model.narrative_temperature,
        structured_model: config
            .pipeline
            .structured_extraction
            .then(|| config.model.structured_model.clone()),
    };
    let pipeline = AnalysisPipeline::new(ctx, settings);

    if !args.quiet {
        println!("🩺 Analyzing: {}", input.display());
        println!("   Model: {}", config.model.name);
        println!("   Results: {}", config.general.results_dir);
    }

    let start_time = Instant::now();
    let spinner = (!args.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Consulting specialists...");
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let result = pipeline.run(&input).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let Some(payload) = result else {
        warn!("No result for {}", input.display());
        eprintln!("\n⛔ The analysis could not be completed. Please try again later.");
        return Ok(2);
    };

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&payload)?,
        OutputFormat::Markdown => report::generate_markdown_report(&payload),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("\n✅ Report saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }

    if !args.quiet {
        println!(
            "📄 Patient summary: {}",
            payload.patient_summary_path.display()
        );
        println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
