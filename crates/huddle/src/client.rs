//! Server connection and terminal relay.
//!
//! This module provides the `ChatClient` which handles:
//! - Connecting to the server over TCP
//! - Sending each stdin line as one protocol line
//! - Printing server output, clearing the current terminal line first
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::env;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use huddle_protocol::encode_line;

use crate::error::{ClientError, Result};

/// Default server address.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";

/// Environment variable that overrides the server address.
pub const SERVER_ADDR_ENV: &str = "HUDDLE_SERVER";

/// Erases the current terminal line and returns the cursor to column 0.
const CLEAR_LINE: &str = "\x1b[2K\r";

/// Size of a single read from the server.
const READ_BUFFER_SIZE: usize = 4096;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the chat client.
///
/// # Example
///
/// ```rust
/// use huddle::client::ClientConfig;
///
/// let config = ClientConfig {
///     server_addr: "10.0.0.5:8080".to_string(),
///     ..Default::default()
/// };
/// assert!(!config.append_newline);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Address of the server, as `host:port`.
    pub server_addr: String,

    /// Append a line terminator to received output that lacks one.
    pub append_newline: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            append_newline: false,
        }
    }
}

impl ClientConfig {
    /// Builds a config from defaults, then `HUDDLE_SERVER`, then the
    /// `--server` flag. Blank values count as unset.
    pub fn resolve(server_flag: Option<String>, append_newline: bool) -> Self {
        let server_addr = non_blank(server_flag)
            .or_else(|| non_blank(env::var(SERVER_ADDR_ENV).ok()))
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

        Self {
            server_addr,
            append_newline,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Chat Client
// ============================================================================

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The server closed the connection.
    ServerClosed,
    /// Input reached EOF.
    InputClosed,
    /// The cancellation token fired (Ctrl-C).
    Cancelled,
}

/// Terminal client for a huddle server.
pub struct ChatClient {
    /// Where to connect and how to print
    config: ClientConfig,

    /// Cancellation token for Ctrl-C
    cancel_token: CancellationToken,
}

impl ChatClient {
    /// Creates a new client.
    pub fn new(config: ClientConfig, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            cancel_token,
        }
    }

    /// Connects to the server and relays stdin/stdout until one side stops.
    pub async fn run(&self) -> Result<ExitReason> {
        let addr = &self.config.server_addr;
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|e| ClientError::Connect {
                addr: addr.clone(),
                error: e.to_string(),
            })?;
        info!(addr = %addr, "Connected to server");

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(b"connected to server\n")
            .await
            .map_err(|e| ClientError::Output(e.to_string()))?;

        let (reader, writer) = stream.into_split();
        let stdin = BufReader::new(tokio::io::stdin());
        self.relay(reader, writer, stdin, stdout).await
    }

    /// Relays between a server connection and a terminal.
    ///
    /// Generic over both ends so it can run over in-memory pipes.
    pub async fn relay<R, W, I, O>(
        &self,
        mut server_rx: R,
        mut server_tx: W,
        input: I,
        mut output: O,
    ) -> Result<ExitReason>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Relay cancelled");
                    return Ok(ExitReason::Cancelled);
                }

                read = server_rx.read(&mut buf) => {
                    let n = read.map_err(|e| ClientError::Connection(e.to_string()))?;
                    if n == 0 {
                        info!("Server closed the connection");
                        return Ok(ExitReason::ServerClosed);
                    }

                    let text = String::from_utf8_lossy(&buf[..n]);
                    let rendered = render_incoming(&text, self.config.append_newline);
                    output
                        .write_all(rendered.as_bytes())
                        .await
                        .map_err(|e| ClientError::Output(e.to_string()))?;
                    output
                        .flush()
                        .await
                        .map_err(|e| ClientError::Output(e.to_string()))?;
                }

                line = lines.next_line() => {
                    match line.map_err(|e| ClientError::Input(e.to_string()))? {
                        Some(line) => {
                            server_tx
                                .write_all(encode_line(&line).as_bytes())
                                .await
                                .map_err(|e| ClientError::Connection(e.to_string()))?;
                            server_tx
                                .flush()
                                .await
                                .map_err(|e| ClientError::Connection(e.to_string()))?;
                        }
                        None => {
                            debug!("Input closed");
                            if let Err(e) = server_tx.shutdown().await {
                                debug!(error = %e, "Failed to close connection");
                            }
                            return Ok(ExitReason::InputClosed);
                        }
                    }
                }
            }
        }
    }
}

/// Formats a chunk of server output for the terminal.
pub fn render_incoming(text: &str, append_newline: bool) -> String {
    let mut out = String::with_capacity(CLEAR_LINE.len() + text.len() + 1);
    out.push_str(CLEAR_LINE);
    out.push_str(text);
    if append_newline && !text.ends_with('\n') {
        out.push('\n');
    }
    out
}
