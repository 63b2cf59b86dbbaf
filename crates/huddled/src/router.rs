//! Message delivery: single sends and chat fan-out.
//!
//! The router never holds registry state while writing. A broadcast first
//! asks the registry for a recipient snapshot, then writes to each recipient
//! in turn. A failed write tears that recipient down and delivery moves on to
//! the next one; the sender's own turn is never failed by someone else's
//! broken connection.
//!
//! Sends are sequential and unbuffered. Without a write timeout, a peer that
//! stops reading stalls the broadcasting task once the socket buffers fill.
//! Configuring `write_timeout` bounds that stall and drops the slow peer.

use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use huddle_core::{BroadcastScope, SessionId};
use huddle_protocol::ServerReply;

use crate::link::SessionLink;
use crate::registry::{Recipient, RegistryHandle, RemovalReason};

/// Why a single write did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("connection closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// Summary of one chat fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Where the message went
    pub scope: BroadcastScope,
    /// Recipients that received the message
    pub delivered: usize,
    /// Recipients whose write failed (and who were torn down)
    pub failed: usize,
}

/// Routes messages to session connections.
#[derive(Clone)]
pub struct Router {
    registry: RegistryHandle,
    write_timeout: Option<Duration>,
}

impl Router {
    /// Creates a router over `registry`.
    ///
    /// `write_timeout` bounds each individual write; `None` lets a write
    /// block for as long as the peer does.
    pub fn new(registry: RegistryHandle, write_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Writes `text` to one recipient.
    ///
    /// On failure the recipient is unregistered: an unwritable peer is
    /// treated as gone, and the write is not retried.
    pub async fn send(&self, recipient: &Recipient, text: &str) -> Result<(), SendError> {
        match self.write(&recipient.link, text).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(session_id = %recipient.id, error = %e, "Send failed, dropping recipient");
                self.registry
                    .unregister(recipient.id, RemovalReason::WriteFailed)
                    .await;
                Err(e)
            }
        }
    }

    /// Relays a chat message from `sender` to its group, or to everyone.
    ///
    /// Returns `None` if the sender is no longer registered or not named.
    pub async fn broadcast(&self, sender: SessionId, body: &str) -> Option<BroadcastReport> {
        let snapshot = self.registry.snapshot_recipients(sender).await?;

        let line = ServerReply::chat(snapshot.scope.clone(), snapshot.sender_name, body).render();

        let mut report = BroadcastReport {
            scope: snapshot.scope,
            delivered: 0,
            failed: 0,
        };

        for recipient in &snapshot.recipients {
            match self.send(recipient, &line).await {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }

        debug!(
            session_id = %sender,
            scope = %report.scope,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );

        Some(report)
    }

    /// One write + flush, abandoned if the link closes first.
    async fn write(&self, link: &SessionLink, text: &str) -> Result<(), SendError> {
        let write = async {
            match self.write_timeout {
                Some(limit) => match timeout(limit, link.write_text(text)).await {
                    Ok(result) => result.map_err(|e| SendError::Io(e.to_string())),
                    Err(_) => Err(SendError::Timeout(limit)),
                },
                None => link
                    .write_text(text)
                    .await
                    .map_err(|e| SendError::Io(e.to_string())),
            }
        };

        tokio::select! {
            biased;
            _ = link.closed() => Err(SendError::Closed),
            result = write => result,
        }
    }
}
