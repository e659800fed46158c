//! Command-line entry point.

use anyhow::Context;
use aubade::config::AubadeConfig;
use aubade::delivery::DeliveryClient;
use aubade::greeting::{greeting_pipeline, GreetingOptions};
use aubade::observability::{init_logging, LogFormat, DEFAULT_LOG_FILTER};
use aubade::playback::{PlaybackScheduler, TickOutcome};
use aubade::providers::collaborators_from_config;
use aubade::receiver::{router, serve, ScheduleReceiver};
use aubade::trace::JsonlTraceSink;
use aubade::utils::write_atomic;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Aubade: a spoken greeting at every sunrise.
#[derive(Parser)]
#[command(name = "aubade", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, default_value = "aubade.toml")]
    config: PathBuf,

    /// Operational log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the greeting pipeline once and deliver the result.
    Generate {
        /// Keep the artifact in the run directory instead of delivering it.
        #[arg(long)]
        no_deliver: bool,
    },

    /// Accept deliveries and arm the playback schedule.
    Serve,

    /// Play the greeting if it is due. Meant to run every minute.
    Tick,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_format, DEFAULT_LOG_FILTER) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AubadeConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Generate { no_deliver } => generate(&config, no_deliver).await,
        Command::Serve => run_server(&config).await,
        Command::Tick => tick(&config).await,
    }
}

async fn generate(config: &AubadeConfig, no_deliver: bool) -> anyhow::Result<()> {
    let run_dir = config
        .paths
        .runs_dir()
        .join(Utc::now().format("%Y-%m-%dT%H%M%SZ").to_string());
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("cannot create run directory {}", run_dir.display()))?;
    info!(run_dir = %run_dir.display(), "Starting generation run");

    let trace = Arc::new(JsonlTraceSink::open(run_dir.join("trace.jsonl"))?);
    let collaborators = collaborators_from_config(config)?;
    let options = GreetingOptions::from_config(config, run_dir.clone());
    let orchestrator = greeting_pipeline(&collaborators, &options, trace)?;

    let artifact = orchestrator.run().await?;
    write_atomic(
        &run_dir.join("artifact.json"),
        serde_json::to_string_pretty(&artifact)?.as_bytes(),
    )?;
    info!(
        words = artifact.text.split_whitespace().count(),
        references = artifact.references.len(),
        absent = ?artifact.absent_sources,
        "Greeting generated"
    );

    if no_deliver {
        info!("Delivery skipped");
        return Ok(());
    }

    let receipt = DeliveryClient::new(&config.delivery)?
        .deliver_artifact(&artifact)
        .await?;
    info!(attempts = receipt.attempts, status = receipt.status, "Greeting delivered");
    Ok(())
}

async fn run_server(config: &AubadeConfig) -> anyhow::Result<()> {
    let receiver = Arc::new(ScheduleReceiver::from_config(config));
    let app = router(receiver, config.server.max_upload_bytes);
    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.server.bind))?;
    serve(listener, app).await?;
    Ok(())
}

async fn tick(config: &AubadeConfig) -> anyhow::Result<()> {
    let outcome = PlaybackScheduler::from_config(config).tick(Utc::now()).await?;
    match outcome {
        TickOutcome::Unarmed => info!("No schedule armed"),
        TickOutcome::NotYet { due } => info!(due, "Greeting not due yet"),
        TickOutcome::Played { previous, next } => info!(previous, next, "Greeting played"),
    }
    Ok(())
}
