//! Chat groups and the outcomes of group membership operations.

use std::fmt;

use crate::error::{DomainError, DomainResult};
use crate::session::DisplayName;

/// Name of a chat group.
///
/// Case-sensitive and otherwise arbitrary, but never empty. Groups are
/// created implicitly the first time someone joins a previously unseen name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupName(String);

impl GroupName {
    /// Creates a group name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyGroupName` if `name` is empty or blank.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyGroupName);
        }
        Ok(Self(name))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Result of asking the registry to put a session into a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The session already belongs to a group; nothing changed.
    AlreadyInGroup,

    /// The group did not exist and was created with the session as its first member.
    Created(GroupName),

    /// The group already existed and the session was appended to it.
    Joined(GroupName),
}

/// Result of asking the registry to remove a session from its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The session was not in any group; nothing changed.
    NotInGroup,

    /// The session left the named group.
    Left(GroupName),
}

/// A group and its current member count, as shown by `/groups`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub name: GroupName,
    pub members: usize,
}

/// Names returned by `/users`.
///
/// When the caller is in a group, `group` is set and `names` lists that
/// group's members in join order; otherwise `names` lists every named
/// session in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserListing {
    pub group: Option<GroupName>,
    pub names: Vec<DisplayName>,
}

/// Where a chat message is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Every named session on the server.
    Global,

    /// Only members of the named group.
    Group(GroupName),
}

impl BroadcastScope {
    /// Label used inside the `[...]` prefix of relayed chat lines.
    pub fn label(&self) -> &str {
        match self {
            Self::Global => "Global",
            Self::Group(name) => name.as_str(),
        }
    }
}

impl fmt::Display for BroadcastScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
