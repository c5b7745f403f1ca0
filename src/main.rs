//! Shared Store command-line front end
//!
//! Reads and writes persistent namespaces from the shell, or opens an
//! interactive REPL over the process-wide registry.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use shared_store::cli::{self, parse_value, render, Command, Session};
use shared_store::config::AppConfig;
use shared_store::paths::AppPaths;
use shared_store::state::{install_shared, shared};
use std::path::Path;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared Store - namespaced shared state with durable persistence
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SHARED_STORE_CONFIG")]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the current value of a namespace
    Get {
        namespace: String,
        /// Value to print when nothing is stored (JSON or plain text)
        #[arg(short, long)]
        default: Option<String>,
    },
    /// Store a value (JSON or plain text) under a namespace
    Set { namespace: String, value: String },
    /// Delete the persisted entry of a namespace
    Clear { namespace: String },
    /// Interactive shell (default)
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths = paths.with_config(config);
    }
    paths.ensure_directories()?;

    let config = AppConfig::load_or_default(&paths.config).await?;

    let level = args
        .log_level
        .clone()
        .or_else(|| config.logging.as_ref().and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    let log_to_file = config.logging.as_ref().map(|l| l.file).unwrap_or(false);
    let _log_guard = init_logging(&level, log_to_file.then_some(paths.logs_dir.as_path()))?;

    info!("Configuration file: {}", paths.config.display());
    debug!("Storage backend: {:?}", config.storage.backend);

    let storage = config.open_storage(&paths)?;
    if !install_shared(storage) {
        anyhow::bail!("shared registry was already initialized; configured storage not installed");
    }
    let registry = shared();

    match args.command.unwrap_or(Action::Repl) {
        Action::Get { namespace, default } => {
            let value = registry
                .peek(&namespace)
                .or_else(|| default.as_deref().map(parse_value))
                .unwrap_or(Value::Null);
            println!("{}", value);
        }
        Action::Set { namespace, value } => {
            let reply = Session::new(registry).execute(Command::Set(namespace, parse_value(&value)))?;
            render(&reply);
        }
        Action::Clear { namespace } => {
            let reply = Session::new(registry).execute(Command::Clear(namespace))?;
            render(&reply);
        }
        Action::Repl => {
            tokio::task::spawn_blocking(move || cli::run_repl(registry))
                .await
                .context("REPL task panicked")??;
        }
    }

    info!("Shared Store exiting");
    Ok(())
}

fn init_logging(level: &str, logs_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file_layer, guard) = match logs_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shared-store.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
