//! Error types for the huddle client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Client errors.
///
/// Each variant names which side of the relay failed, so the binary can
/// report something more useful than a bare I/O error.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the server.
    ///
    /// Usually means no server is listening at `addr`. Check the address
    /// passed with `--server` or set in `HUDDLE_SERVER`.
    #[error("Failed to connect to {addr}: {error}")]
    Connect {
        /// The address that was dialed.
        addr: String,
        /// The underlying connect error.
        error: String,
    },

    /// Reading from or writing to the server failed mid-session.
    #[error("Connection to server failed: {0}")]
    Connection(String),

    /// Reading a line from the terminal failed.
    #[error("Failed to read input: {0}")]
    Input(String),

    /// Writing server output to the terminal failed.
    #[error("Failed to write output: {0}")]
    Output(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let error = ClientError::Connect {
            addr: "127.0.0.1:8080".to_string(),
            error: "connection refused".to_string(),
        };
        let display = format!("{error}");
        assert!(display.contains("127.0.0.1:8080"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_side_specific_messages() {
        assert!(ClientError::Connection("reset".into())
            .to_string()
            .starts_with("Connection to server failed"));
        assert!(ClientError::Input("bad fd".into())
            .to_string()
            .starts_with("Failed to read input"));
        assert!(ClientError::Output("broken pipe".into())
            .to_string()
            .starts_with("Failed to write output"));
    }
}
