//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to session events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use huddle_core::{
    DisplayName, GroupName, GroupSummary, JoinOutcome, LeaveOutcome, SessionId, UserListing,
};

use super::commands::{
    RecipientSnapshot, RegistryCommand, RegistryError, RemovalReason, SessionEvent, SessionView,
};
use crate::link::SessionLink;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let id = handle.register(SessionLink::new(writer)).await?;
/// handle.set_name(id, DisplayName::new("Alice")?).await?;
/// let outcome = handle.join_group(id, GroupName::new("team")?).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<SessionEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Sends a command built around a fresh oneshot and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Register a newly accepted connection and get its identity.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RegistryFull` if the registry is at maximum capacity
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(&self, link: SessionLink) -> Result<SessionId, RegistryError> {
        self.request(|respond_to| RegistryCommand::Register { link, respond_to })
            .await?
    }

    /// Commit a session's display name.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the session doesn't exist
    /// - `RegistryError::NameAlreadySet` if a name was already committed
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn set_name(
        &self,
        session_id: SessionId,
        name: DisplayName,
    ) -> Result<(), RegistryError> {
        self.request(|respond_to| RegistryCommand::SetName {
            session_id,
            name,
            respond_to,
        })
        .await?
    }

    /// Remove a session and close its connection.
    ///
    /// Safe to call any number of times from any task: only the call that
    /// actually removes the session closes the link. Returns whether this
    /// call did the removal.
    pub async fn unregister(&self, session_id: SessionId, reason: RemovalReason) -> bool {
        let removed = self
            .request(|respond_to| RegistryCommand::Unregister {
                session_id,
                reason,
                respond_to,
            })
            .await;

        match removed {
            Ok(Some(link)) => {
                link.close_with(reason);
                true
            }
            Ok(None) => false,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Unregister skipped");
                false
            }
        }
    }

    /// Put a session into a group.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the session doesn't exist
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn join_group(
        &self,
        session_id: SessionId,
        group: GroupName,
    ) -> Result<JoinOutcome, RegistryError> {
        self.request(|respond_to| RegistryCommand::JoinGroup {
            session_id,
            group,
            respond_to,
        })
        .await?
    }

    /// Take a session out of its group.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn leave_group(&self, session_id: SessionId) -> Result<LeaveOutcome, RegistryError> {
        self.request(|respond_to| RegistryCommand::LeaveGroup {
            session_id,
            respond_to,
        })
        .await
    }

    /// List users visible to a session.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn list_users(&self, session_id: SessionId) -> Result<UserListing, RegistryError> {
        self.request(|respond_to| RegistryCommand::ListUsers {
            session_id,
            respond_to,
        })
        .await
    }

    /// List groups with at least one member.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn list_groups(&self) -> Result<Vec<GroupSummary>, RegistryError> {
        self.request(|respond_to| RegistryCommand::ListGroups { respond_to })
            .await
    }

    /// Copy the recipient set for a chat message from `sender`.
    ///
    /// Returns `None` if the sender is gone, unnamed, or the actor stopped.
    pub async fn snapshot_recipients(&self, sender: SessionId) -> Option<RecipientSnapshot> {
        self.request(|respond_to| RegistryCommand::SnapshotRecipients { sender, respond_to })
            .await
            .ok()
            .flatten()
    }

    /// Remove every session and close all their connections.
    ///
    /// Returns the number of sessions closed.
    pub async fn close_all(&self) -> usize {
        let links = self
            .request(|respond_to| RegistryCommand::CloseAll { respond_to })
            .await
            .unwrap_or_default();

        for link in &links {
            link.close_with(RemovalReason::Shutdown);
        }
        links.len()
    }

    /// Get a single session by ID.
    ///
    /// Returns `None` if the session doesn't exist or if communication
    /// with the actor fails.
    pub async fn get_session(&self, session_id: SessionId) -> Option<SessionView> {
        self.request(|respond_to| RegistryCommand::GetSession {
            session_id,
            respond_to,
        })
        .await
        .ok()
        .flatten()
    }

    /// Get all sessions in registration order.
    ///
    /// Returns an empty vector if no sessions are registered or if
    /// communication with the actor fails.
    pub async fn get_all_sessions(&self) -> Vec<SessionView> {
        self.request(|respond_to| RegistryCommand::GetAllSessions { respond_to })
            .await
            .unwrap_or_default()
    }

    /// Subscribe to session events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let handle = RegistryHandle::new(cmd_tx, event_tx);
        (handle, cmd_rx)
    }

    fn test_link() -> SessionLink {
        let (local, _remote) = tokio::io::duplex(64);
        SessionLink::new(local)
    }

    #[tokio::test]
    async fn test_register_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(RegistryCommand::Register { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(Ok(SessionId::new(7)));
                return true;
            }
            false
        });

        let result = handle.register(test_link()).await;
        assert_eq!(result, Ok(SessionId::new(7)));
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_register_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx); // Close the channel

        let result = handle.register(test_link()).await;
        assert_eq!(result, Err(RegistryError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_unregister_closes_returned_link() {
        let (handle, mut rx) = create_test_handle();
        let link = test_link();
        let registered = link.clone();

        tokio::spawn(async move {
            if let Some(RegistryCommand::Unregister { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(Some(registered));
            }
        });

        assert!(handle.unregister(SessionId::new(1), RemovalReason::Disconnected).await);
        assert!(link.is_closed());
    }

    #[tokio::test]
    async fn test_unregister_absent_session_closes_nothing() {
        let (handle, mut rx) = create_test_handle();

        tokio::spawn(async move {
            if let Some(RegistryCommand::Unregister { respond_to, .. }) = rx.recv().await {
                let _ = respond_to.send(None);
            }
        });

        assert!(!handle.unregister(SessionId::new(1), RemovalReason::Disconnected).await);
    }

    #[tokio::test]
    async fn test_queries_degrade_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.get_session(SessionId::new(1)).await.is_none());
        assert!(handle.get_all_sessions().await.is_empty());
        assert!(handle.snapshot_recipients(SessionId::new(1)).await.is_none());
        assert_eq!(handle.close_all().await, 0);
        assert!(!handle.unregister(SessionId::new(1), RemovalReason::Shutdown).await);
        assert_eq!(
            handle.list_groups().await,
            Err(RegistryError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_is_connected() {
        let (handle, rx) = create_test_handle();
        assert!(handle.is_connected());

        drop(rx);
        assert!(!handle.is_connected());
    }
}
