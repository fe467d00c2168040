//! Jukebox Server (jbox-server) - Main entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jbox_common::ConfigResolver;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jbox_server::api::{self, AppContext, HostIdentity};
use jbox_server::SharedState;

/// Command-line arguments for jbox-server
#[derive(Parser, Debug)]
#[command(name = "jbox-server")]
#[command(about = "Shared LAN jukebox with per-guest request quotas")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "JBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config decides the default log level, so it is resolved before tracing starts
    let (mut config, config_path) = ConfigResolver::new(args.config.clone()).resolve();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("jbox_server={},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting jbox-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found; using compiled defaults"),
    }

    let state = Arc::new(SharedState::from_config(&config));
    let identity = HostIdentity::from_config(config.host_ip.as_deref(), config.trust_proxy_headers);
    info!(
        "Host address: {} (proxy headers {})",
        identity.server_ip(),
        if config.trust_proxy_headers { "trusted" } else { "ignored" }
    );

    // Periodic quota compaction
    let cleanup_state = Arc::clone(&state);
    let cleanup_every = Duration::from_secs(config.quota_cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let report = cleanup_state.quota.write().await.cleanup();
            debug!(
                "Quota cleanup: {} events and {} actors removed, {} actors tracked",
                report.events_removed, report.actors_removed, report.actors_remaining
            );
        }
    });

    let ctx = AppContext::new(state, identity);
    api::run(&config.server_address(), ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
