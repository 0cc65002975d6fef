//! writeaid-svc - Write Aid analysis microservice
//!
//! Accepts paragraphs over HTTP, runs a per-sentence upstream analysis
//! workflow for each, and serves the aggregated result through a
//! submit-then-poll job API.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use writeaid_common::{config::write_toml_config, TomlConfig};

use writeaid_svc::AppState;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "writeaid-svc", version, about = "Write Aid analysis service")]
struct Args {
    /// Config file path (overrides WRITEAID_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen host
    #[arg(long, env = "WRITEAID_HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(short, long, env = "WRITEAID_PORT")]
    port: Option<u16>,

    /// Upstream API base URL
    #[arg(long, env = "WRITEAID_UPSTREAM_URL")]
    upstream_url: Option<String>,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, origin) = TomlConfig::load_or_default(args.config.as_deref());
    apply_overrides(&mut config, &args);

    if let Some(path) = &args.write_config {
        write_toml_config(&config, path)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    writeaid_common::logging::init_tracing(&config.logging.level)?;

    info!("Starting writeaid-svc");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    origin.log();
    info!("Upstream: {}", config.upstream.base_url);

    let state = AppState::from_config(&config)?;

    let shutdown = CancellationToken::new();
    let sweeper = state.jobs.spawn_sweeper(
        Duration::from_secs(config.jobs.sweep_interval_secs.max(1)),
        shutdown.clone(),
    );

    let app = writeaid_svc::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;
    info!("writeaid-svc stopped");

    Ok(())
}

fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = &args.upstream_url {
        config.upstream.base_url = url.clone();
    }
}
