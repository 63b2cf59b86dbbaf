//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `SessionEvent`: Events published by the registry for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::fmt;

use huddle_core::{
    BroadcastScope, DisplayName, GroupName, GroupSummary, JoinOutcome, LeaveOutcome, SessionId,
    UserListing,
};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::link::SessionLink;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking. The actor
/// handles one command at a time, which is what serializes every access
/// to registry state.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Allocate the next identity and insert an unnamed session.
    ///
    /// # Errors
    /// - `RegistryError::RegistryFull` if a session limit is configured and reached
    Register {
        /// Write access to the new connection
        link: SessionLink,
        /// Channel to send the allocated identity
        respond_to: oneshot::Sender<Result<SessionId, RegistryError>>,
    },

    /// Record the display name chosen during onboarding.
    ///
    /// # Errors
    /// - `RegistryError::SessionNotFound` if the session doesn't exist
    /// - `RegistryError::NameAlreadySet` if the session was already named
    SetName {
        session_id: SessionId,
        name: DisplayName,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a session from every mapping.
    ///
    /// Responds with the session's link only if this command removed it,
    /// so exactly one caller ends up closing the connection.
    Unregister {
        session_id: SessionId,
        reason: RemovalReason,
        respond_to: oneshot::Sender<Option<SessionLink>>,
    },

    /// Put a session into a group, creating the group if needed.
    ///
    /// # Errors
    /// - `RegistryError::SessionNotFound` if the session doesn't exist
    JoinGroup {
        session_id: SessionId,
        group: GroupName,
        respond_to: oneshot::Sender<Result<JoinOutcome, RegistryError>>,
    },

    /// Remove a session from its current group.
    LeaveGroup {
        session_id: SessionId,
        respond_to: oneshot::Sender<LeaveOutcome>,
    },

    /// List the caller's group members, or every named session.
    ListUsers {
        session_id: SessionId,
        respond_to: oneshot::Sender<UserListing>,
    },

    /// List groups that currently have members.
    ListGroups {
        respond_to: oneshot::Sender<Vec<GroupSummary>>,
    },

    /// Copy the recipients of a chat message from `sender`.
    ///
    /// Returns `None` if the sender is unknown or not yet named.
    SnapshotRecipients {
        sender: SessionId,
        respond_to: oneshot::Sender<Option<RecipientSnapshot>>,
    },

    /// Remove every session and hand back their links for closing.
    CloseAll {
        respond_to: oneshot::Sender<Vec<SessionLink>>,
    },

    /// Get a single session by ID.
    GetSession {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<SessionView>>,
    },

    /// Get all sessions in registration order.
    GetAllSessions {
        respond_to: oneshot::Sender<Vec<SessionView>>,
    },
}

// ============================================================================
// Query Results
// ============================================================================

/// Read-only view of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub id: SessionId,
    pub name: Option<DisplayName>,
    pub group: Option<GroupName>,
}

/// One delivery target captured in a recipient snapshot.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: SessionId,
    pub link: SessionLink,
}

/// Point-in-time copy of who should receive a chat message.
///
/// Taken in a single actor turn; the router writes to the recipients after
/// the actor has moved on, so no network write ever happens while registry
/// state is being accessed.
#[derive(Debug, Clone)]
pub struct RecipientSnapshot {
    /// Where the message goes (the sender's group, or global)
    pub scope: BroadcastScope,
    /// The sender's display name, for the message prefix
    pub sender_name: DisplayName,
    /// Named sessions in scope, excluding the sender, in scope order
    pub recipients: Vec<Recipient>,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has reached its configured session capacity.
    #[error("registry is full (max: {max} sessions)")]
    RegistryFull {
        /// Maximum number of sessions allowed
        max: usize,
    },

    /// Every session identity has been handed out.
    #[error("session identities exhausted")]
    IdsExhausted,

    /// The requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session already has a display name.
    #[error("session {0} is already named")]
    NameAlreadySet(SessionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Session Events
// ============================================================================

/// Events published by the registry after each state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection was accepted and given an identity.
    Registered { session_id: SessionId },

    /// A session finished onboarding.
    Named {
        session_id: SessionId,
        name: DisplayName,
    },

    /// A session joined a group.
    JoinedGroup {
        session_id: SessionId,
        group: GroupName,
        /// Whether the group was created by this join
        created: bool,
    },

    /// A session left a group.
    LeftGroup {
        session_id: SessionId,
        group: GroupName,
    },

    /// A session was removed from the registry.
    Removed {
        session_id: SessionId,
        reason: RemovalReason,
    },
}

/// Reason why a session was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The peer closed the connection or a read failed.
    Disconnected,

    /// A write to the peer failed or timed out.
    WriteFailed,

    /// The peer sent data that breaks the line protocol.
    ProtocolViolation,

    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "peer disconnected"),
            Self::WriteFailed => write!(f, "write to peer failed"),
            Self::ProtocolViolation => write!(f, "protocol violation"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}
