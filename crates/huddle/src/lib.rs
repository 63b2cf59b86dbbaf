//! Huddle - Terminal client library
//!
//! Connects to a huddle server and relays between the terminal and the
//! socket:
//!
//! 1. **Input side**: each line typed on stdin is sent to the server as one
//!    newline-terminated line
//! 2. **Output side**: whatever the server sends is printed to stdout, after
//!    clearing the line the user may be typing on
//!
//! The relay stops when the server disconnects, stdin reaches EOF, or the
//! shared `CancellationToken` fires.

pub mod client;
pub mod error;

// Re-export commonly used types
pub use client::{ChatClient, ClientConfig, ExitReason};
pub use error::{ClientError, Result};
