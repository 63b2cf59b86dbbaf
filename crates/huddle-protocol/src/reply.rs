//! Text the server writes to clients.
//!
//! `ServerReply` renders through `Display` to the exact bytes sent on the
//! wire. Every reply except the onboarding prompt ends with `\n`.

use std::fmt;

use huddle_core::{
    BroadcastScope, DisplayName, GroupSummary, JoinOutcome, LeaveOutcome, UserListing,
};

/// Commands advertised in the welcome message, as (usage, description).
const COMMAND_HELP: [(&str, &str); 4] = [
    ("/users", "List all connected users"),
    ("/join <group_name>", "Join a group"),
    ("/groups", "List all available groups"),
    ("/leave", "Leave the current group"),
];

/// A message from the server to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    /// Sent immediately after accept; asks for a display name.
    Prompt,

    /// Greeting plus command help, sent once the name is committed.
    Welcome { name: DisplayName },

    /// Answer to `/users`.
    Users(UserListing),

    /// Answer to `/groups`.
    Groups(Vec<GroupSummary>),

    /// Answer to `/join <group>`.
    Join(JoinOutcome),

    /// Answer to `/join` without a group name.
    JoinUsage,

    /// Answer to `/leave`.
    Leave(LeaveOutcome),

    /// A chat message relayed from another session.
    Chat {
        scope: BroadcastScope,
        sender: DisplayName,
        body: String,
    },

    /// Sent before closing a connection the server has no room for.
    ServerFull,
}

impl ServerReply {
    /// Creates a welcome reply.
    pub fn welcome(name: DisplayName) -> Self {
        Self::Welcome { name }
    }

    /// Creates a relayed chat line.
    pub fn chat(scope: BroadcastScope, sender: DisplayName, body: impl Into<String>) -> Self {
        Self::Chat {
            scope,
            sender,
            body: body.into(),
        }
    }

    /// Renders the reply to its wire form.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt => f.write_str("Please enter your username: "),
            Self::Welcome { name } => {
                writeln!(f, "Welcome {name}! You can use the following commands:")?;
                for (usage, description) in COMMAND_HELP {
                    writeln!(f, "{usage} - {description}")?;
                }
                Ok(())
            }
            Self::Users(listing) => {
                match &listing.group {
                    Some(group) => write!(f, "Users connected to {group}:")?,
                    None => f.write_str("Connected Users:")?,
                }
                for (position, name) in listing.names.iter().enumerate() {
                    write!(f, "\n{}. {name}", position + 1)?;
                }
                f.write_str("\n")
            }
            Self::Groups(groups) => {
                f.write_str("Available Groups:")?;
                for group in groups {
                    write!(f, "\n- {} ({} user/s)", group.name, group.members)?;
                }
                f.write_str("\n")
            }
            Self::Join(JoinOutcome::AlreadyInGroup) => {
                f.write_str("You are already a part of a group.\n")
            }
            Self::Join(JoinOutcome::Created(group)) => writeln!(f, "Created group {group}"),
            Self::Join(JoinOutcome::Joined(group)) => {
                writeln!(f, "Successfully joined group {group}")
            }
            Self::JoinUsage => f.write_str("Usage: /join <group_name>\n"),
            Self::Leave(LeaveOutcome::NotInGroup) => {
                f.write_str("You are not part of any group.\n")
            }
            Self::Leave(LeaveOutcome::Left(group)) => writeln!(f, "You have left the group {group}"),
            Self::Chat {
                scope,
                sender,
                body,
            } => writeln!(f, "[{scope}] {sender}: {body}"),
            Self::ServerFull => f.write_str("Server is full, try again later.\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::GroupName;

    fn name(s: &str) -> DisplayName {
        DisplayName::new(s).unwrap()
    }

    fn group(s: &str) -> GroupName {
        GroupName::new(s).unwrap()
    }

    #[test]
    fn test_prompt_has_no_terminator() {
        assert_eq!(ServerReply::Prompt.render(), "Please enter your username: ");
    }

    #[test]
    fn test_welcome_lists_all_commands() {
        let text = ServerReply::welcome(name("Alice")).render();
        assert!(text.starts_with("Welcome Alice! You can use the following commands:\n"));
        for command in ["/users", "/join <group_name>", "/groups", "/leave"] {
            assert!(text.contains(command), "missing {command}");
        }
        assert!(text.ends_with("/leave - Leave the current group\n"));
    }

    #[test]
    fn test_global_user_list() {
        let reply = ServerReply::Users(UserListing {
            group: None,
            names: vec![name("Alice"), name("Bob")],
        });
        assert_eq!(reply.render(), "Connected Users:\n1. Alice\n2. Bob\n");
    }

    #[test]
    fn test_group_user_list() {
        let reply = ServerReply::Users(UserListing {
            group: Some(group("team")),
            names: vec![name("Bob")],
        });
        assert_eq!(reply.render(), "Users connected to team:\n1. Bob\n");
    }

    #[test]
    fn test_group_list_is_bulleted() {
        let reply = ServerReply::Groups(vec![
            GroupSummary {
                name: group("rust"),
                members: 3,
            },
            GroupSummary {
                name: group("team"),
                members: 1,
            },
        ]);
        assert_eq!(
            reply.render(),
            "Available Groups:\n- rust (3 user/s)\n- team (1 user/s)\n"
        );
        assert_eq!(ServerReply::Groups(Vec::new()).render(), "Available Groups:\n");
    }

    #[test]
    fn test_join_replies() {
        assert_eq!(
            ServerReply::Join(JoinOutcome::AlreadyInGroup).render(),
            "You are already a part of a group.\n"
        );
        assert_eq!(
            ServerReply::Join(JoinOutcome::Created(group("team"))).render(),
            "Created group team\n"
        );
        assert_eq!(
            ServerReply::Join(JoinOutcome::Joined(group("team"))).render(),
            "Successfully joined group team\n"
        );
    }

    #[test]
    fn test_leave_replies() {
        assert_eq!(
            ServerReply::Leave(LeaveOutcome::NotInGroup).render(),
            "You are not part of any group.\n"
        );
        assert_eq!(
            ServerReply::Leave(LeaveOutcome::Left(group("team"))).render(),
            "You have left the group team\n"
        );
    }

    #[test]
    fn test_chat_prefixes() {
        let grouped = ServerReply::chat(BroadcastScope::Group(group("team")), name("Alice"), "hello");
        assert_eq!(grouped.render(), "[team] Alice: hello\n");

        let global = ServerReply::chat(BroadcastScope::Global, name("Carol"), "hi all");
        assert_eq!(global.render(), "[Global] Carol: hi all\n");
    }
}
