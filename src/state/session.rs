//! Session identity and the handle other actors use to reach a session.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

/// Process-unique session identifier.
///
/// Channel removal is keyed by id rather than username so that a late
/// teardown can never evict a newer session that reused the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:06}", self.0)
    }
}

/// Generates session ids for accepted connections.
pub struct SessionIdGenerator {
    counter: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next unique id.
    pub fn next(&self) -> SessionId {
        SessionId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Something queued for a session's connection.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A text line; the writer appends the newline.
    Line(String),
    /// Raw file contents relayed by `/send`.
    File(Bytes),
}

/// Cloneable reference to a negotiated session.
///
/// This is what channels store in their member and queue lists. Delivery
/// never blocks: the outbox is bounded and a full outbox drops the message.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    username: Arc<str>,
    outbox: mpsc::Sender<Outbound>,
    disconnect: Arc<Notify>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        username: &str,
        outbox: mpsc::Sender<Outbound>,
        disconnect: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            username: Arc::from(username),
            outbox,
            disconnect,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Queue `message` for this session's connection.
    ///
    /// Returns `false` if the message was dropped.
    pub fn deliver(&self, message: Outbound) -> bool {
        match self.outbox.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                crate::metrics::record_dropped_delivery();
                debug!(session = %self.id, user = %self.username, "Outbox full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn send_line(&self, line: String) -> bool {
        self.deliver(Outbound::Line(line))
    }

    /// Ask the owning session to close its connection.
    ///
    /// The permit is stored, so a session that is not currently waiting
    /// still observes it on its next wait.
    pub fn disconnect(&self) {
        self.disconnect.notify_one();
    }
}
