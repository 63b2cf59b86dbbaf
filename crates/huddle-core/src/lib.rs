//! Huddle Core - Shared types for the huddle chat service
//!
//! This crate provides the domain types shared between
//! the server (huddled), the wire protocol and the client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod group;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use group::{BroadcastScope, GroupName, GroupSummary, JoinOutcome, LeaveOutcome, UserListing};
pub use session::{DisplayName, SessionId};
