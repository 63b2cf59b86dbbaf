//! Huddle Daemon - Chat session registry and message routing server
//!
//! This crate provides the core infrastructure for the chat server:
//! - `registry` - Registry actor owning sessions, names and group memberships
//! - `router` - Recipient fan-out and single-recipient delivery
//! - `server` - TCP acceptor, per-connection session handlers and shutdown
//! - `config` - Server configuration (defaults, TOML file, overrides)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       huddled server                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │────▶│      RegistryActor          │   │
//! │  │ (TcpListener)   │     │ (sessions, groups, links)   │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │ spawn per connection        │ commands          │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ SessionHandler  │────▶│          Router             │   │
//! │  │ (owns reader)   │     │ (snapshot, then write each) │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod link;
pub mod registry;
pub mod router;
pub mod server;
