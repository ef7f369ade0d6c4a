//! tsw - tiny smart workers
//!
//! A command-line toolbox of small LLM-driven workers: deep research,
//! topic reports, article thinking and writing, PDF summaries, job
//! aggregation, a PDF knowledge base, and repository explanations.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime or configuration error

mod agent;
mod cli;
mod config;
mod llm;
mod mermaid;
mod models;
mod output;
mod render;
mod repo;
mod scanner;
mod web;
mod workers;

use anyhow::{bail, Context, Result};
use clap::CommandFactory;
use cli::{Cli, CodeCommand, Command, KbCommand};
use config::{
    load_json_config, read_json, AggregateConfig, CodeConfig, KbConfig, ResearchConfig, Settings,
    ThinkConfig, WriterConfig, SETTINGS_FILE,
};
use llm::{build_client, Provider};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use workers::kb::KbAction;
use workers::Workbench;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a local .env file
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse_args();

    // Handle --init-config early (no logging needed)
    if cli.init_config {
        return handle_init_config();
    }

    if cli.command.is_none() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&cli);

    info!("tsw v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {}", e),
    }
    debug!("Arguments: {:?}", cli);

    let start_time = Instant::now();
    match run(cli).await {
        Ok(()) => {
            debug!("Finished in {:.1}s", start_time.elapsed().as_secs_f64());
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .tsw.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(SETTINGS_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            SETTINGS_FILE
        );
        std::process::exit(1);
    }

    let content = Settings::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", SETTINGS_FILE))?;

    println!("✅ Created {} with default settings.", SETTINGS_FILE);
    println!("   Edit it to choose models, providers, and the output directory.");
    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the verbosity flags.
fn init_logging(cli: &Cli) {
    let level = cli.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load settings from --settings, the default file, or defaults.
fn load_settings(cli: &Cli) -> Result<Settings> {
    if let Some(ref path) = cli.settings {
        info!("Loading settings from: {}", path.display());
        return Settings::load(path);
    }

    match Settings::load_default() {
        Ok(Some(settings)) => {
            info!("Loaded settings from {}", SETTINGS_FILE);
            Ok(settings)
        }
        Ok(None) => {
            debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
        Err(e) => {
            warn!("Failed to load settings: {:#}", e);
            Ok(Settings::default())
        }
    }
}

/// Knowledge base config from `--config`, or from `PG_URL` with defaults.
fn kb_config(path: Option<&Path>) -> Result<KbConfig> {
    let config: KbConfig = match path {
        Some(path) => read_json(path)?,
        None => {
            let Ok(pg_url) = std::env::var("PG_URL") else {
                bail!("kb commands need --config FILE or the PG_URL environment variable");
            };
            serde_json::from_value(serde_json::json!({ "pg_url": pg_url }))?
        }
    };
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    match cli.command {
        Some(Command::Kb { action }) => run_kb(&settings, action).await,
        Some(command) => run_worker(&Workbench::from_settings(settings)?, command).await,
        None => Ok(()),
    }
}

async fn run_kb(settings: &Settings, action: KbCommand) -> Result<()> {
    let config = kb_config(action.config().map(|p| p.as_path()))?;
    let embedder = build_client(Provider::Gemini, settings);
    let action = match action {
        KbCommand::Create { file, .. } => KbAction::Create(file),
        KbCommand::Refresh { file, .. } => KbAction::Refresh(file),
        KbCommand::Remove { name, .. } => KbAction::Remove(name),
        KbCommand::List { .. } => KbAction::List,
    };
    workers::kb::run(embedder, &config, action).await
}

async fn run_worker(bench: &Workbench, command: Command) -> Result<()> {
    match command {
        Command::Research { topic, config } => {
            let config: ResearchConfig = load_json_config(config.as_deref())?;
            println!("🔬 Researching: {}", topic);
            workers::research::run(bench, &topic, &config).await?;
        }
        Command::Report { topic, format } => {
            println!("📝 Reporting on: {}", topic);
            workers::report::run(bench, &topic, format).await?;
        }
        Command::Think { link, config } => {
            let config: ThinkConfig = load_json_config(config.as_deref())?;
            println!("🤔 Thinking ({}) on: {}", config.mode, link);
            workers::think::run(bench, &link, &config).await?;
        }
        Command::Write { config } => {
            let config: WriterConfig = read_json(&config)?;
            workers::writer::run(bench, &config).await?;
        }
        Command::Summarise { file, kind } => {
            println!("📄 Summarising: {}", file.display());
            workers::summary::run(bench, &file, kind).await?;
        }
        Command::Aggregate { config } => {
            let config: AggregateConfig = read_json(&config)?;
            if workers::aggregate::run(bench, &config).await.is_none() {
                std::process::exit(1);
            }
        }
        Command::Code { action } => match action {
            CodeCommand::Explain { config } => {
                let config: CodeConfig = read_json(&config)?;
                println!("🧠 Explaining: {}", config.repo);
                workers::code::explain(bench, &config).await?;
            }
            CodeCommand::Pack { config } => {
                let config: CodeConfig = read_json(&config)?;
                println!("📦 Packing: {}", config.repo);
                workers::code::pack(bench, &config).await?;
            }
        },
        Command::Kb { .. } => bail!("kb commands don't run on the workbench"),
    }

    Ok(())
}
