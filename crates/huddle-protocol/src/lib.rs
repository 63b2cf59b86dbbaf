//! Huddle Protocol - Wire protocol for the chat service
//!
//! This crate provides line framing, command parsing for lines sent by
//! clients, and the exact text of every reply the server writes back.
//!
//! The transport is a plain byte stream. Each logical message is one
//! newline-terminated line; a trailing `\r` is tolerated and stripped.

pub mod command;
pub mod frame;
pub mod reply;

pub use command::ClientCommand;
pub use frame::{decode_line, encode_line, ProtocolError, DEFAULT_MAX_LINE_LENGTH};
pub use reply::ServerReply;
