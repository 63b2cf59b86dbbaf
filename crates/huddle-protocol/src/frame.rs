//! Newline framing for the chat stream.
//!
//! A stream transport does not preserve write boundaries, so a single read
//! can return half a message or several messages at once. Every message in
//! either direction is therefore terminated by `\n`, and receivers split on
//! that byte rather than on read boundaries.

use thiserror::Error;

/// Default upper bound for a single inbound line, terminator included.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Errors raised while framing inbound data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A line exceeded the configured maximum before its terminator arrived.
    #[error("line too long: more than {max} bytes without a terminator")]
    LineTooLong { max: usize },
}

/// Decodes one raw line into text.
///
/// Strips a trailing `\n` and an optional `\r` before it. Invalid UTF-8 is
/// replaced rather than rejected so that a misbehaving client cannot wedge
/// its own session.
pub fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Terminates `text` for the wire, unless it already ends with `\n`.
pub fn encode_line(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}
