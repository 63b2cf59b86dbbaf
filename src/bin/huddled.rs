//! Huddle Daemon - TCP group chat server
//!
//! Accepts client connections, onboards each one with a display name, and
//! relays chat globally or within named groups.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:8080)
//! huddled
//!
//! # Listen elsewhere
//! huddled --listen 127.0.0.1:9000
//!
//! # Use a specific config file
//! huddled --config ./huddled.toml
//! ```
//!
//! The listen address can also come from `HUDDLE_ADDR`. Logging is
//! controlled through `RUST_LOG`.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use huddled::config::{ServerConfig, LISTEN_ADDR_ENV};
use huddled::registry::spawn_registry;
use huddled::server::ChatServer;

/// huddle chat server
#[derive(Parser, Debug)]
#[command(name = "huddled", version, about)]
struct Args {
    /// Address to listen on (overrides the config file and HUDDLE_ADDR)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("huddled=info".parse()?)
                .add_directive("huddle_core=info".parse()?)
                .add_directive("huddle_protocol=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        listen = %config.listen_addr,
        "huddle server starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry(config.max_sessions);
    info!("Session registry started");

    let server = ChatServer::new(config, registry, cancel_token);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e).context("Failed to start server");
    }

    info!("huddle server stopped");
    Ok(())
}

/// Layers the config file, `HUDDLE_ADDR` and `--listen` over the defaults.
fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = ServerConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;

    let env_addr = env::var(LISTEN_ADDR_ENV).ok();
    config
        .override_listen_addr(env_addr.as_deref())
        .with_context(|| format!("Invalid {LISTEN_ADDR_ENV}"))?;
    config
        .override_listen_addr(args.listen.as_deref())
        .context("Invalid --listen address")?;

    Ok(config)
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
