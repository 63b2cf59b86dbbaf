//! Session registry using Actor pattern.
//!
//! The registry is the single source of truth for who is connected, what
//! they are called, and which group they are in. It receives commands via a
//! tokio mpsc channel and processes them one at a time, which serializes every
//! read and write of that state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ SessionHandler  │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! │ / Router        │     │                 │     │  (SessionEvent)  │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │
//!         │   RegistryCommand     │   sessions / groups / memberships
//!         │   (mpsc channel)      │
//!         ▼                       ▼
//!  register / join / leave   BTreeMap<SessionId, SessionEntry>
//!  list / snapshot           BTreeMap<GroupName, Vec<SessionId>>
//! ```
//!
//! Network writes never happen inside the actor. Queries that lead to a
//! write (recipient snapshots, unregister) hand links back to the caller,
//! which does the I/O after the actor has moved on to the next command.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    Recipient, RecipientSnapshot, RegistryCommand, RegistryError, RemovalReason, SessionEvent,
    SessionView,
};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Returns a RegistryHandle for client use
///
/// `max_sessions` caps concurrent sessions; `None` means unlimited.
///
/// # Example
///
/// ```no_run
/// use huddled::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(None);
///
///     let sessions = handle.get_all_sessions().await;
///     assert!(sessions.is_empty());
/// }
/// ```
pub fn spawn_registry(max_sessions: Option<usize>) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), max_sessions);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
