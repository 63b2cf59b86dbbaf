//! Huddle - terminal client for the huddle chat server
//!
//! # Usage
//!
//! ```bash
//! # Connect to the default server (127.0.0.1:8080)
//! huddle
//!
//! # Connect elsewhere, printing unterminated output on its own line
//! huddle --server chat.example.com:8080 --append-newline
//! ```
//!
//! The server address can also come from `HUDDLE_SERVER`. Logs go to
//! stderr and are quiet unless `RUST_LOG` asks for more.

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use huddle::{ChatClient, ClientConfig, ExitReason};

/// huddle chat client
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about)]
struct Args {
    /// Server address as host:port (overrides HUDDLE_SERVER)
    #[arg(short, long, value_name = "ADDR")]
    server: Option<String>,

    /// Print a line terminator after received output that lacks one
    #[arg(long)]
    append_newline: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("huddle=warn".parse()?))
        .init();

    let config = ClientConfig::resolve(args.server, args.append_newline);

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run_client(config));
    // A pending stdin read holds a blocking thread; don't wait for it
    runtime.shutdown_background();

    match result {
        Ok(reason) => {
            info!(reason = ?reason, "Client exiting");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Client error");
            eprintln!("huddle: {e:#}");
            process::exit(1);
        }
    }
}

async fn run_client(config: ClientConfig) -> Result<ExitReason> {
    let cancel_token = CancellationToken::new();

    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                interrupt_token.cancel();
            }
            Err(e) => error!(error = %e, "Error waiting for Ctrl+C"),
        }
    });

    let addr = config.server_addr.clone();
    let client = ChatClient::new(config, cancel_token);
    client
        .run()
        .await
        .with_context(|| format!("Chat session with {addr} failed"))
}
