//! Session handler for individual client connections.
//!
//! Each accepted connection gets its own `SessionHandler` that:
//! - Prompts for and commits a display name
//! - Reads newline-delimited lines and classifies them as commands or chat
//! - Answers commands from registry state
//! - Relays chat through the router
//! - Unregisters itself and shuts the socket down when it stops
//!
//! # States
//!
//! ```text
//! CONNECTING ──prompt sent──▶ AWAITING_NAME ──name committed──▶ ACTIVE
//!      │                           │                              │
//!      └──────── write error ──────┴── EOF / read error / close ──┴──▶ CLOSED
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in session teardown

use std::fmt;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info};

use huddle_core::{DisplayName, SessionId};
use huddle_protocol::{decode_line, ClientCommand, ProtocolError, ServerReply};

use crate::link::SessionLink;
use crate::registry::{Recipient, RegistryError, RegistryHandle, RemovalReason};
use crate::router::{Router, SendError};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted; the onboarding prompt has not been sent yet.
    Connecting,
    /// Prompt sent; the next line is the display name.
    AwaitingName,
    /// Named; lines are commands or chat.
    Active,
    /// Terminal. The session has been unregistered.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::AwaitingName => write!(f, "awaiting-name"),
            Self::Active => write!(f, "active"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Control loop for a single client connection.
///
/// Owns the read half of the connection. The write half is shared through
/// the session's `SessionLink`, which the registry also hands to routers of
/// other sessions.
pub struct SessionHandler<R> {
    /// Buffered reader for incoming lines
    reader: BufReader<R>,

    /// Shared writer and closed signal for this connection
    link: SessionLink,

    /// Identity assigned at accept time
    session_id: SessionId,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Delivery for replies and chat
    router: Router,

    /// Longest accepted line, terminator included
    max_line_length: usize,

    /// Current lifecycle state
    state: SessionState,

    /// Display name once onboarding completes
    name: Option<DisplayName>,
}

impl<R> SessionHandler<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a handler for an already-registered session.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Identity returned by `RegistryHandle::register`
    /// * `reader` - Read half of the connection
    /// * `link` - The same link that was registered
    /// * `registry` - Handle to the session registry
    /// * `router` - Router for replies and chat
    /// * `max_line_length` - Longest accepted inbound line
    pub fn new(
        session_id: SessionId,
        reader: R,
        link: SessionLink,
        registry: RegistryHandle,
        router: Router,
        max_line_length: usize,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            link,
            session_id,
            registry,
            router,
            max_line_length,
            state: SessionState::Connecting,
            name: None,
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session until it closes.
    ///
    /// Always ends by unregistering the session and shutting down its
    /// connection. Returns the reason the session ended.
    pub async fn run(mut self) -> RemovalReason {
        debug!(session_id = %self.session_id, "Session started");

        let reason = match self.drive().await {
            Ok(()) | Err(SessionError::Eof) => RemovalReason::Disconnected,
            Err(e) => {
                debug!(
                    session_id = %self.session_id,
                    state = %self.state,
                    error = %e,
                    "Session ending"
                );
                e.removal_reason()
            }
        };

        self.state = SessionState::Closed;
        self.registry.unregister(self.session_id, reason).await;
        if let Err(e) = self.link.shutdown().await {
            debug!(session_id = %self.session_id, error = %e, "Socket shutdown failed");
        }

        info!(
            session_id = %self.session_id,
            name = ?self.name.as_ref().map(DisplayName::as_str),
            reason = %reason,
            "Session closed"
        );
        reason
    }

    /// State machine loop. Only returns once the session must end.
    async fn drive(&mut self) -> Result<(), SessionError> {
        loop {
            match self.state {
                SessionState::Connecting => {
                    self.reply(ServerReply::Prompt).await?;
                    self.state = SessionState::AwaitingName;
                }
                SessionState::AwaitingName => {
                    let line = self.read_line().await?;
                    self.handle_name(line).await?;
                }
                SessionState::Active => {
                    let line = self.read_line().await?;
                    self.handle_line(&line).await?;
                }
                SessionState::Closed => return Ok(()),
            }
        }
    }

    /// Commits the first non-blank line as the display name.
    async fn handle_name(&mut self, line: String) -> Result<(), SessionError> {
        let name = match DisplayName::new(line) {
            Ok(name) => name,
            Err(_) => {
                // Blank name: ask again
                return self.reply(ServerReply::Prompt).await;
            }
        };

        self.registry.set_name(self.session_id, name.clone()).await?;
        info!(session_id = %self.session_id, name = %name, "Client onboarded");

        self.name = Some(name.clone());
        self.reply(ServerReply::welcome(name)).await?;
        self.state = SessionState::Active;
        Ok(())
    }

    /// Dispatches one line from an active session.
    async fn handle_line(&mut self, line: &str) -> Result<(), SessionError> {
        match ClientCommand::parse(line) {
            ClientCommand::Users => {
                let listing = self.registry.list_users(self.session_id).await?;
                self.reply(ServerReply::Users(listing)).await
            }
            ClientCommand::Join(group) => {
                let outcome = self.registry.join_group(self.session_id, group).await?;
                self.reply(ServerReply::Join(outcome)).await
            }
            ClientCommand::JoinUsage => self.reply(ServerReply::JoinUsage).await,
            ClientCommand::Groups => {
                let groups = self.registry.list_groups().await?;
                self.reply(ServerReply::Groups(groups)).await
            }
            ClientCommand::Leave => {
                let outcome = self.registry.leave_group(self.session_id).await?;
                self.reply(ServerReply::Leave(outcome)).await
            }
            ClientCommand::Chat(body) => {
                if self.router.broadcast(self.session_id, &body).await.is_none() {
                    debug!(session_id = %self.session_id, "Chat dropped, sender no longer registered");
                }
                Ok(())
            }
            ClientCommand::Empty => Ok(()),
        }
    }

    /// Sends a reply to this session through the router.
    async fn reply(&self, reply: ServerReply) -> Result<(), SessionError> {
        let recipient = Recipient {
            id: self.session_id,
            link: self.link.clone(),
        };
        self.router.send(&recipient, &reply.render()).await?;
        Ok(())
    }

    /// Reads the next line.
    ///
    /// Gives up with `SessionError::Closed` as soon as the link is closed,
    /// even if the peer is silent, carrying the reason the link was closed. A final unterminated line before EOF is
    /// still delivered.
    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut buf = Vec::new();
        let limit = self.max_line_length;

        let read = {
            let mut limited = (&mut self.reader).take(limit as u64);
            tokio::select! {
                biased;
                _ = self.link.closed() => {
                    let reason = self.link.close_reason().unwrap_or(RemovalReason::Disconnected);
                    return Err(SessionError::Closed(reason));
                }
                result = limited.read_until(b'\n', &mut buf) => result,
            }
        };

        let bytes_read = read.map_err(|e| SessionError::Io(e.to_string()))?;
        if bytes_read == 0 {
            return Err(SessionError::Eof);
        }

        if bytes_read >= limit && !buf.ends_with(b"\n") {
            return Err(ProtocolError::LineTooLong { max: limit }.into());
        }

        let line = decode_line(&buf);
        debug!(session_id = %self.session_id, bytes = bytes_read, "Received line");
        Ok(line)
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Peer closed the connection")]
    Eof,

    #[error("Connection closed: {0}")]
    Closed(RemovalReason),

    #[error("Send failed: {0}")]
    Send(#[from] SendError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl SessionError {
    /// Maps the error to the reason recorded when the session is removed.
    pub fn removal_reason(&self) -> RemovalReason {
        match self {
            Self::Io(_) | Self::Eof => RemovalReason::Disconnected,
            Self::Send(_) => RemovalReason::WriteFailed,
            Self::Protocol(_) => RemovalReason::ProtocolViolation,
            Self::Closed(reason) => *reason,
            Self::Registry(_) => RemovalReason::Shutdown,
        }
    }
}
