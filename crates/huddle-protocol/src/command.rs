//! Classification of lines sent by an onboarded client.

use huddle_core::GroupName;

const USERS_PREFIX: &str = "/users";
const JOIN_PREFIX: &str = "/join ";
const JOIN_BARE: &str = "/join";
const GROUPS_PREFIX: &str = "/groups";
const LEAVE_PREFIX: &str = "/leave";

/// What an active client asked for.
///
/// Commands are matched by exact string prefix on the decoded line; any
/// line that is not a command is a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `/users` - list users in the caller's group, or everyone.
    Users,

    /// `/join <group>` - join (and possibly create) a group.
    Join(GroupName),

    /// `/join` without a usable group name.
    JoinUsage,

    /// `/groups` - list non-empty groups and their sizes.
    Groups,

    /// `/leave` - leave the current group.
    Leave,

    /// Anything else, relayed to the caller's group or to everyone.
    Chat(String),

    /// A blank line; ignored.
    Empty,
}

impl ClientCommand {
    /// Classifies a decoded line (terminator already stripped).
    pub fn parse(line: &str) -> Self {
        if line.starts_with(USERS_PREFIX) {
            return Self::Users;
        }
        if let Some(rest) = line.strip_prefix(JOIN_PREFIX) {
            return match GroupName::new(rest.trim()) {
                Ok(group) => Self::Join(group),
                Err(_) => Self::JoinUsage,
            };
        }
        if line == JOIN_BARE {
            return Self::JoinUsage;
        }
        if line.starts_with(GROUPS_PREFIX) {
            return Self::Groups;
        }
        if line.starts_with(LEAVE_PREFIX) {
            return Self::Leave;
        }
        if line.is_empty() {
            return Self::Empty;
        }
        Self::Chat(line.to_string())
    }
}
