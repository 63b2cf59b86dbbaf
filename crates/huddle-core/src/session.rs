//! Session identity and display name value objects.

use std::fmt;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Unique identifier for a connected chat session.
///
/// Identities are allocated from a strictly increasing counter when a
/// connection is accepted and are never reused for the lifetime of the
/// server process. Ordering by `SessionId` is therefore registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// The first identity handed out by a fresh server.
    pub const FIRST: SessionId = SessionId(1);

    /// Creates a SessionId from a raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the identity allocated after this one, or `None` once the
    /// counter is exhausted.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Display Name
// ============================================================================

/// Name a user picked during onboarding.
///
/// Stored verbatim: the protocol strips only the line terminator, so
/// interior and surrounding spaces are preserved exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Creates a display name, rejecting blank input.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyDisplayName` if `name` is empty or
    /// consists only of whitespace.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyDisplayName);
        }
        Ok(Self(name))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
