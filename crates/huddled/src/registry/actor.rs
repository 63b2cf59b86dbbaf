//! Registry actor - owns all session state and processes commands.
//!
//! The RegistryActor is the single owner of chat state in the server.
//! It receives commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are ignored, never panicked on

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use huddle_core::{
    BroadcastScope, DisplayName, GroupName, GroupSummary, JoinOutcome, LeaveOutcome, SessionId,
    UserListing,
};

use super::commands::{
    Recipient, RecipientSnapshot, RegistryCommand, RegistryError, RemovalReason, SessionEvent,
    SessionView,
};
use crate::link::SessionLink;

/// Per-session state held by the registry.
struct SessionEntry {
    /// Empty until onboarding commits a name
    name: Option<DisplayName>,

    /// Non-owning write access to the connection
    link: SessionLink,
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all session and group state.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
///
/// # Ownership
///
/// The actor owns:
/// - `sessions`: every live session keyed by identity (iteration order is
///   registration order because identities only grow)
/// - `groups`: group name → member identities in join order
/// - `memberships`: identity → the one group it belongs to
///
/// `groups` and `memberships` always describe the same relation. Groups
/// that lose their last member stay in `groups` with an empty list: they can
/// still be joined (as an existing group) but are not listed.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// All state mutations happen within this single task.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live sessions by identity
    sessions: BTreeMap<SessionId, SessionEntry>,

    /// Group members in join order
    groups: BTreeMap<GroupName, Vec<SessionId>>,

    /// Reverse index: which group each session is in
    memberships: HashMap<SessionId, GroupName>,

    /// Identity handed to the next registration, `None` once exhausted
    next_id: Option<SessionId>,

    /// Optional capacity limit
    max_sessions: Option<usize>,

    /// Event publisher for subscribers
    event_publisher: broadcast::Sender<SessionEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    /// * `max_sessions` - Capacity limit, `None` for unlimited
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<SessionEvent>,
        max_sessions: Option<usize>,
    ) -> Self {
        Self {
            receiver,
            sessions: BTreeMap::new(),
            groups: BTreeMap::new(),
            memberships: HashMap::new(),
            next_id: Some(SessionId::FIRST),
            max_sessions,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Registry actor stopped (sessions: {})",
            self.sessions.len()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { link, respond_to } => {
                let result = self.handle_register(link);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::SetName {
                session_id,
                name,
                respond_to,
            } => {
                let result = self.handle_set_name(session_id, name);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister {
                session_id,
                reason,
                respond_to,
            } => {
                let result = self.handle_unregister(session_id, reason);
                let _ = respond_to.send(result);
            }
            RegistryCommand::JoinGroup {
                session_id,
                group,
                respond_to,
            } => {
                let result = self.handle_join_group(session_id, group);
                let _ = respond_to.send(result);
            }
            RegistryCommand::LeaveGroup {
                session_id,
                respond_to,
            } => {
                let result = self.handle_leave_group(session_id);
                let _ = respond_to.send(result);
            }
            RegistryCommand::ListUsers {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_list_users(session_id));
            }
            RegistryCommand::ListGroups { respond_to } => {
                let _ = respond_to.send(self.handle_list_groups());
            }
            RegistryCommand::SnapshotRecipients { sender, respond_to } => {
                let _ = respond_to.send(self.handle_snapshot_recipients(sender));
            }
            RegistryCommand::CloseAll { respond_to } => {
                let _ = respond_to.send(self.handle_close_all());
            }
            RegistryCommand::GetSession {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_get_session(session_id));
            }
            RegistryCommand::GetAllSessions { respond_to } => {
                let _ = respond_to.send(self.handle_get_all_sessions());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Handles registration of a freshly accepted connection.
    ///
    /// Allocating the identity here puts the counter under the same
    /// serialization as the rest of the registry state.
    fn handle_register(&mut self, link: SessionLink) -> Result<SessionId, RegistryError> {
        if let Some(max) = self.max_sessions {
            if self.sessions.len() >= max {
                warn!(
                    current = self.sessions.len(),
                    max = max,
                    "Registry is full, rejecting registration"
                );
                return Err(RegistryError::RegistryFull { max });
            }
        }

        let Some(session_id) = self.next_id else {
            warn!("Session identities exhausted, rejecting registration");
            return Err(RegistryError::IdsExhausted);
        };
        self.next_id = session_id.next();
        self.sessions
            .insert(session_id, SessionEntry { name: None, link });

        info!(
            session_id = %session_id,
            total_sessions = self.sessions.len(),
            "Session registered"
        );

        // Publish event (ignore if no subscribers)
        let _ = self
            .event_publisher
            .send(SessionEvent::Registered { session_id });

        Ok(session_id)
    }

    /// Handles committing a display name.
    fn handle_set_name(
        &mut self,
        session_id: SessionId,
        name: DisplayName,
    ) -> Result<(), RegistryError> {
        let entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or(RegistryError::SessionNotFound(session_id))?;

        if entry.name.is_some() {
            debug!(session_id = %session_id, "Session already named, ignoring");
            return Err(RegistryError::NameAlreadySet(session_id));
        }

        entry.name = Some(name.clone());
        info!(session_id = %session_id, name = %name, "Session named");

        let _ = self
            .event_publisher
            .send(SessionEvent::Named { session_id, name });

        Ok(())
    }

    /// Handles removal of a session from every mapping.
    ///
    /// Returns the link only when the session was present, which makes
    /// repeated or concurrent removals harmless.
    fn handle_unregister(
        &mut self,
        session_id: SessionId,
        reason: RemovalReason,
    ) -> Option<SessionLink> {
        let entry = self.sessions.remove(&session_id)?;
        let group = self.detach_from_group(session_id);

        info!(
            session_id = %session_id,
            group = ?group,
            reason = %reason,
            remaining_sessions = self.sessions.len(),
            "Session removed"
        );

        let _ = self
            .event_publisher
            .send(SessionEvent::Removed { session_id, reason });

        Some(entry.link)
    }

    /// Handles a group join request.
    fn handle_join_group(
        &mut self,
        session_id: SessionId,
        group: GroupName,
    ) -> Result<JoinOutcome, RegistryError> {
        if !self.sessions.contains_key(&session_id) {
            return Err(RegistryError::SessionNotFound(session_id));
        }

        if let Some(current) = self.memberships.get(&session_id) {
            debug!(
                session_id = %session_id,
                current = %current,
                requested = %group,
                "Session already in a group"
            );
            return Ok(JoinOutcome::AlreadyInGroup);
        }

        let created = match self.groups.entry(group.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(vec![session_id]);
                true
            }
            Entry::Occupied(mut slot) => {
                slot.get_mut().push(session_id);
                false
            }
        };
        self.memberships.insert(session_id, group.clone());

        info!(
            session_id = %session_id,
            group = %group,
            created = created,
            "Session joined group"
        );

        let _ = self.event_publisher.send(SessionEvent::JoinedGroup {
            session_id,
            group: group.clone(),
            created,
        });

        Ok(if created {
            JoinOutcome::Created(group)
        } else {
            JoinOutcome::Joined(group)
        })
    }

    /// Handles a group leave request.
    fn handle_leave_group(&mut self, session_id: SessionId) -> LeaveOutcome {
        match self.detach_from_group(session_id) {
            Some(group) => {
                info!(session_id = %session_id, group = %group, "Session left group");
                let _ = self.event_publisher.send(SessionEvent::LeftGroup {
                    session_id,
                    group: group.clone(),
                });
                LeaveOutcome::Left(group)
            }
            None => LeaveOutcome::NotInGroup,
        }
    }

    /// Handles a `/users` query.
    fn handle_list_users(&self, session_id: SessionId) -> UserListing {
        match self.memberships.get(&session_id) {
            Some(group) => {
                let names = self
                    .groups
                    .get(group)
                    .map(|members| {
                        members
                            .iter()
                            .filter_map(|id| self.name_of(*id))
                            .collect()
                    })
                    .unwrap_or_default();
                UserListing {
                    group: Some(group.clone()),
                    names,
                }
            }
            None => UserListing {
                group: None,
                names: self
                    .sessions
                    .values()
                    .filter_map(|entry| entry.name.clone())
                    .collect(),
            },
        }
    }

    /// Handles a `/groups` query.
    fn handle_list_groups(&self) -> Vec<GroupSummary> {
        self.groups
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(name, members)| GroupSummary {
                name: name.clone(),
                members: members.len(),
            })
            .collect()
    }

    /// Handles a recipient snapshot for a chat message.
    fn handle_snapshot_recipients(&self, sender: SessionId) -> Option<RecipientSnapshot> {
        let sender_name = self.sessions.get(&sender)?.name.clone()?;

        let (scope, candidates): (BroadcastScope, Vec<SessionId>) =
            match self.memberships.get(&sender) {
                Some(group) => (
                    BroadcastScope::Group(group.clone()),
                    self.groups.get(group).cloned().unwrap_or_default(),
                ),
                None => (BroadcastScope::Global, self.sessions.keys().copied().collect()),
            };

        let recipients = candidates
            .into_iter()
            .filter(|id| *id != sender)
            .filter_map(|id| {
                let entry = self.sessions.get(&id)?;
                if entry.name.is_none() {
                    return None;
                }
                Some(Recipient {
                    id,
                    link: entry.link.clone(),
                })
            })
            .collect();

        Some(RecipientSnapshot {
            scope,
            sender_name,
            recipients,
        })
    }

    /// Handles shutdown: drops every session and returns their links.
    fn handle_close_all(&mut self) -> Vec<SessionLink> {
        let sessions = std::mem::take(&mut self.sessions);
        self.memberships.clear();
        for members in self.groups.values_mut() {
            members.clear();
        }

        info!(count = sessions.len(), "Removing all sessions for shutdown");

        sessions
            .into_iter()
            .map(|(session_id, entry)| {
                let _ = self.event_publisher.send(SessionEvent::Removed {
                    session_id,
                    reason: RemovalReason::Shutdown,
                });
                entry.link
            })
            .collect()
    }

    /// Handles getting a single session by ID.
    fn handle_get_session(&self, session_id: SessionId) -> Option<SessionView> {
        self.sessions
            .get(&session_id)
            .map(|entry| self.view_of(session_id, entry))
    }

    /// Handles getting all sessions.
    fn handle_get_all_sessions(&self) -> Vec<SessionView> {
        self.sessions
            .iter()
            .map(|(id, entry)| self.view_of(*id, entry))
            .collect()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Removes a session from its group, keeping both indexes in step.
    fn detach_from_group(&mut self, session_id: SessionId) -> Option<GroupName> {
        let group = self.memberships.remove(&session_id)?;
        if let Some(members) = self.groups.get_mut(&group) {
            members.retain(|member| *member != session_id);
        }
        Some(group)
    }

    fn name_of(&self, session_id: SessionId) -> Option<DisplayName> {
        self.sessions
            .get(&session_id)
            .and_then(|entry| entry.name.clone())
    }

    fn view_of(&self, session_id: SessionId, entry: &SessionEntry) -> SessionView {
        SessionView {
            id: session_id,
            name: entry.name.clone(),
            group: self.memberships.get(&session_id).cloned(),
        }
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of sessions currently registered.
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Checks that sessions, groups and memberships agree with each other.
    #[cfg(test)]
    fn check_consistency(&self) -> Result<(), String> {
        for (id, group) in &self.memberships {
            if !self.sessions.contains_key(id) {
                return Err(format!("membership for unknown session {id}"));
            }
            let members = self
                .groups
                .get(group)
                .ok_or_else(|| format!("session {id} mapped to missing group {group}"))?;
            if members.iter().filter(|m| *m == id).count() != 1 {
                return Err(format!("session {id} not listed exactly once in {group}"));
            }
        }

        for (group, members) in &self.groups {
            for member in members {
                if self.memberships.get(member) != Some(group) {
                    return Err(format!("member {member} of {group} has no matching mapping"));
                }
            }
        }

        Ok(())
    }
}
