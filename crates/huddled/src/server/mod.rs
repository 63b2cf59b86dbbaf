//! TCP chat server.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Registers each connection and spawns a SessionHandler for it
//! - Rejects connections with a notice when the registry is full
//! - Shuts down gracefully via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept() + register()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SessionHandler  │────▶│  RegistryHandle │
//! │  (per client)   │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │ replies / chat
//!         ▼
//! ┌─────────────────┐
//! │     Router      │──▶ other sessions' links
//! └─────────────────┘
//! ```
//!
//! # Shutdown
//!
//! Cancelling the token stops the accept loop and drops the listener, so no
//! new connection is admitted. Every registered session is then closed
//! through the registry, and the server waits a bounded grace period for
//! the session tasks to finish before aborting any stragglers.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{SessionError, SessionHandler, SessionState};

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use huddle_protocol::ServerReply;

use crate::config::ServerConfig;
use crate::link::SessionLink;
use crate::registry::{RegistryError, RegistryHandle, RemovalReason};
use crate::router::Router;

/// Pause after a failed accept, so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on writing the "server full" notice to a rejected peer.
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP chat server.
///
/// Owns the accept loop and the set of running session tasks.
pub struct ChatServer {
    /// Listen address and session limits
    config: ServerConfig,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Shared delivery for all sessions
    router: Router,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl ChatServer {
    /// Creates a new chat server.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved server configuration
    /// * `registry` - Handle to the session registry
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        let router = Router::new(registry.clone(), config.write_timeout());
        Self {
            config,
            registry,
            router,
            cancel_token,
        }
    }

    /// Binds the listening socket on the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.listen_addr;
        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })
    }

    /// Binds and runs the server.
    ///
    /// Does not return until shutdown completes.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accepts connections on `listener` until the cancellation token fires,
    /// then shuts every session down.
    pub async fn serve(&self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!(addr = %addr, "Chat server listening"),
            Err(e) => info!(error = %e, "Chat server listening on unknown address"),
        }

        let mut sessions: JoinSet<RemovalReason> = JoinSet::new();

        loop {
            tokio::select! {
                // Check for cancellation
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                // Reap finished session tasks
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Session task failed");
                    }
                }

                // Accept new connection
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            self.handle_connection(stream, peer, &mut sessions).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            // Keep accepting after a short pause
                            sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        drop(listener);
        self.shutdown(sessions).await;
    }

    /// Registers a new connection and spawns its session task.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        sessions: &mut JoinSet<RemovalReason>,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let link = SessionLink::new(writer);

        let session_id = match self.registry.register(link.clone()).await {
            Ok(id) => id,
            Err(RegistryError::RegistryFull { max }) => {
                warn!(peer = %peer, max = max, "Rejecting connection, server full");
                tokio::spawn(reject(link));
                return;
            }
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to register connection");
                return;
            }
        };

        info!(session_id = %session_id, peer = %peer, "Client connected");

        let handler = SessionHandler::new(
            session_id,
            reader,
            link,
            self.registry.clone(),
            self.router.clone(),
            self.config.max_line_length,
        );
        sessions.spawn(handler.run());
    }

    /// Closes every session and waits for their tasks to finish.
    async fn shutdown(&self, mut sessions: JoinSet<RemovalReason>) {
        let closed = self.registry.close_all().await;
        info!(sessions = closed, "Closed all sessions");

        let grace = self.config.shutdown_grace();
        let drain = async {
            while let Some(joined) = sessions.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Session task failed during shutdown");
                }
            }
        };

        if timeout(grace, drain).await.is_err() {
            warn!(
                remaining = sessions.len(),
                grace_ms = grace.as_millis() as u64,
                "Session tasks still running after grace period, aborting"
            );
            sessions.abort_all();
        }

        info!("Server shutdown complete");
    }
}

/// Tells a peer the server is full, then closes its connection.
async fn reject(link: SessionLink) {
    let notice = ServerReply::ServerFull.render();
    match timeout(REJECT_WRITE_TIMEOUT, link.write_text(&notice)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to send server-full notice"),
        Err(_) => debug!("Timed out sending server-full notice"),
    }
    if let Err(e) = link.shutdown().await {
        debug!(error = %e, "Failed to close rejected connection");
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}
