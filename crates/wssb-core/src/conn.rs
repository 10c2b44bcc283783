//! Live connection handles.
//!
//! One [`Connection`] exists per accepted socket. The registry stores clones
//! of the `Arc` under the authenticated user, the resolver returns them, and
//! delivery goes through the bounded outbound channel so a stalled peer can
//! never block a connection task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::packet::Response;

/// Unique identifier for a live connection (UUID v7, time-ordered).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One live client socket.
pub struct Connection {
    id: ConnectionId,
    /// Authenticated user name, set once auth succeeds.
    user: Mutex<Option<String>>,
    /// Send channel to the socket's outbound write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Cancelled to force-close the socket (kick, orphaned after reload).
    cancel: CancellationToken,
    connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl Connection {
    /// Wrap an outbound channel in a connection handle.
    pub fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::new(),
            user: Mutex::new(None),
            tx,
            cancel: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// The connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Bind the authenticated user. Called exactly once, on auth success.
    pub fn bind_user(&self, name: &str) {
        *self.user.lock() = Some(name.to_owned());
    }

    /// The authenticated user name, if any.
    pub fn user(&self) -> Option<String> {
        self.user.lock().clone()
    }

    /// Whether auth has completed on this connection.
    pub fn is_authenticated(&self) -> bool {
        self.user.lock().is_some()
    }

    /// Queue an already-serialized frame.
    ///
    /// Returns `false` if the channel is full or closed, incrementing the
    /// dropped counter; delivery is best-effort.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize one response packet and queue it.
    pub fn send_response(&self, response: &Response) -> bool {
        self.send(Arc::new(response.to_value().to_string()))
    }

    /// Total frames dropped on a full or closed channel.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Order the socket closed. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Token the connection task watches for forced closes.
    pub fn close_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether a close has been ordered.
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user", &self.user.lock())
            .finish_non_exhaustive()
    }
}

/// Equality is identity: two handles are the same connection iff ids match.
impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
