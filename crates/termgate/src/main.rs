//! termgate server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use termgate::api::{AppState, create_router, executor_from_config};
use termgate::bootstrap;
use termgate::config;
use termgate_exec::ContainerRuntime;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Local AI terminal gateway: command suggestions plus gated execution.",
    propagate_version = true
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve,
    /// Print the effective configuration as TOML.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Show the merged configuration (defaults, file, environment).
    Print,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Config {
            command: ConfigCommand::Print,
        } => {
            let rendered =
                toml::to_string_pretty(&config).context("serializing configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}

async fn serve(config: config::AppConfig) -> Result<()> {
    if config.auth.token.is_empty() {
        bail!("auth.token is not set; refusing to serve without a shared secret");
    }
    if config.gemini.api_key.is_empty() {
        warn!("gemini.api_key is not set; /suggest will fail until it is configured");
    }

    let runtime = ContainerRuntime::new();
    if config.exec.local {
        warn!("exec.local is enabled; commands run directly on the host");
    } else {
        // Runs to completion before the listener binds, so requests
        // never observe a half-bootstrapped target.
        bootstrap::ensure_container(&runtime, &config.exec).await;
    }

    let executor = Arc::new(executor_from_config(&config.exec, runtime)?);
    let bind = config.server.bind.clone();
    let port = config.server.port;

    let state = Arc::new(AppState::new(config, executor)?);
    let router = create_router(state);

    let listener = TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("binding {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");

    axum::serve(listener, router)
        .await
        .context("serving HTTP")?;

    Ok(())
}
