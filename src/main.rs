//! minicron - cron-style job scheduling service.
//!
//! Main entry point for the minicron CLI and server.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use minicron_api::{ApiServer, AppState, ServerConfig};
use minicron_config::{Config, ConfigLoader};
use minicron_core::CronExpression;
use minicron_executor::Executor;
use minicron_scheduler::{Scheduler, SchedulerConfig};
use minicron_store::{FileJobStore, FileLogStore, JobStore, LogStore};

/// minicron CLI.
#[derive(Parser)]
#[command(name = "minicron")]
#[command(about = "Cron-style job scheduling service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and API server in foreground (default)
    Run {
        /// Override the configured server host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured server port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load and validate the configuration, then print a summary
    CheckConfig,

    /// Validate a cron expression and print its next occurrences
    Validate {
        /// 5-field cron expression, e.g. "0 6 * * *"
        expression: String,

        /// How many upcoming occurrences to print
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

/// Initialize tracing with console output and, when configured, a
/// daily-rotated file layer.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true));

    match &config.logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("minicron")
                .filename_suffix("log")
                .max_log_files(30)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer guard alive for the program's duration.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            registry
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}

/// Load the configuration, falling back to defaults when the config
/// file does not exist.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    ConfigLoader::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        None => {
            init_tracing(&config)?;
            run_server(config, None, None).await
        }
        Some(Commands::Run { host, port }) => {
            init_tracing(&config)?;
            run_server(config, host, port).await
        }
        Some(Commands::CheckConfig) => check_config(&config),
        Some(Commands::Validate { expression, count }) => validate_expression(&expression, count),
    }
}

/// Run the scheduler and the API server until Ctrl-C.
async fn run_server(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!("Starting minicron v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = &config.storage.data_dir;
    let store: Arc<dyn JobStore> = Arc::new(
        FileJobStore::new(data_dir.clone())
            .await
            .context("Failed to open job store")?,
    );
    let logs: Arc<dyn LogStore> = Arc::new(
        FileLogStore::new(data_dir.clone())
            .await
            .context("Failed to open log store")?,
    );

    let executor = Executor::new(
        Duration::from_secs(config.executor.timeout_secs),
        config.executor.max_output_bytes,
    );
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        logs.clone(),
        executor,
        SchedulerConfig {
            poll_interval: Duration::from_secs(config.scheduler.poll_interval_secs),
            max_concurrent_runs: config.scheduler.max_concurrent_runs,
        },
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.clone().run(shutdown_rx.clone()));

    let state = Arc::new(AppState::new(store, logs, scheduler));
    let server = ApiServer::new(
        ServerConfig::new(config.server.host.clone(), config.server.port),
        state,
    );

    let server_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!("API server failed: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    shutdown_tx.send(true).ok();

    let _ = scheduler_task.await;
    let _ = server_task.await;
    info!("minicron stopped");
    Ok(())
}

/// Print a configuration summary.
fn check_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration OK");
    println!("  server:    {}:{}", config.server.host, config.server.port);
    println!("  data dir:  {}", config.storage.data_dir.display());
    println!(
        "  scheduler: poll every {}s, up to {} concurrent runs",
        config.scheduler.poll_interval_secs, config.scheduler.max_concurrent_runs
    );
    println!(
        "  executor:  {}s timeout, {} byte output cap",
        config.executor.timeout_secs, config.executor.max_output_bytes
    );
    Ok(())
}

/// Parse an expression and print its upcoming occurrences.
fn validate_expression(expression: &str, count: usize) -> anyhow::Result<()> {
    let expr = CronExpression::parse(expression)?;
    println!("'{}' is valid", expression);

    let mut instant = Utc::now();
    for i in 1..=count {
        instant = expr.next_after(instant)?;
        println!("  {}. {}", i, instant.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}
