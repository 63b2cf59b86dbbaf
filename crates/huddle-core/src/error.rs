//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when constructing domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Group names must contain at least one non-whitespace character
    #[error("Group name must not be empty")]
    EmptyGroupName,

    /// Display names must contain at least one non-whitespace character
    #[error("Display name must not be empty")]
    EmptyDisplayName,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
