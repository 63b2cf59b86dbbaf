//! Shared write access to a session's connection.
//!
//! The session handler owns the read half of its connection. The write half
//! lives behind a `SessionLink`, which the registry keeps as a non-owning
//! reference so that other sessions (through the router) can deliver
//! messages to it.
//!
//! Closing a link only cancels its token. Readers and writers select on that
//! token, so a close interrupts a blocked read in the owning handler and any
//! in-flight write to the peer. The owning handler performs the actual socket
//! shutdown once it has stopped.
//!
//! Whoever removes a session from the registry closes its link with the
//! removal reason, so the owning handler can report why it was stopped.

use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::registry::RemovalReason;

/// How long `shutdown` waits to flush bytes a peer has not taken yet.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Any writable half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Writer shared between a session and everyone who sends to it.
///
/// The mutex serializes whole messages, so two broadcasts to the same
/// recipient never interleave mid-line.
pub type SessionWriter = Arc<Mutex<BufWriter<BoxedWriter>>>;

/// Handle to one live connection: its shared writer and its closed signal.
#[derive(Clone)]
pub struct SessionLink {
    writer: SessionWriter,
    closed: CancellationToken,
    reason: Arc<OnceLock<RemovalReason>>,
}

impl SessionLink {
    /// Wraps the write half of a freshly accepted connection.
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedWriter = Box::new(writer);
        Self {
            writer: Arc::new(Mutex::new(BufWriter::new(boxed))),
            closed: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Writes `text` and flushes it, holding the writer lock throughout.
    ///
    /// This does not observe the closed signal; callers that must not block
    /// on a closed or stalled peer go through the router instead.
    pub async fn write_text(&self, text: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await
    }

    /// Signals that the connection is closed. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Closes the link, recording why. The first recorded reason wins.
    pub fn close_with(&self, reason: RemovalReason) {
        // Set before cancelling so a woken reader always sees it
        let _ = self.reason.set(reason);
        self.closed.cancel();
    }

    /// Reason passed to the first `close_with`, if any.
    pub fn close_reason(&self) -> Option<RemovalReason> {
        self.reason.get().copied()
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves when the link is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Flushes and shuts down the write half.
    ///
    /// Called by the owning session handler when it stops. Any write that
    /// was blocked on this peer has already been aborted by `close`, so the
    /// writer lock is free by the time this runs. Bytes left buffered by an
    /// aborted write are dropped if the peer does not take them within
    /// `SHUTDOWN_FLUSH_TIMEOUT`.
    pub async fn shutdown(&self) -> io::Result<()> {
        self.close();
        let mut writer = self.writer.lock().await;
        match timeout(SHUTDOWN_FLUSH_TIMEOUT, writer.flush()).await {
            Ok(flushed) => flushed?,
            Err(_) => {
                debug!("Peer not reading, dropping unflushed output");
            }
        }
        // Skip BufWriter's own flush, which would block again
        writer.get_mut().shutdown().await
    }
}

impl fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLink")
            .field("closed", &self.is_closed())
            .field("reason", &self.close_reason())
            .finish_non_exhaustive()
    }
}
