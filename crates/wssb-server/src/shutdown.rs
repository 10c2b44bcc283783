//! Server-wide shutdown signal.
//!
//! A single-resolution primitive built on `CancellationToken`: the first
//! `stop` command (or interrupt signal) wins, duplicates are no-ops, and
//! every listener observes the same cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time to wait for connection tasks to drain before giving up.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates shutdown across the listener and all connection tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    requested: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            requested: AtomicBool::new(false),
        }
    }

    /// Get a clone of the cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown.
    ///
    /// Returns `true` only for the call that actually resolved the signal;
    /// concurrent or repeated requests return `false` and change nothing.
    pub fn request(&self, reason: &str) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            debug!(reason, "duplicate shutdown request ignored");
            return false;
        }
        info!(reason, "shutdown requested");
        self.token.cancel();
        true
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait up to `timeout` for the given task handles to finish.
    ///
    /// Call after [`request`](Self::request); tasks that ignore the token are
    /// left running and reported, not aborted.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let all = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, all).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("is_shutting_down", &self.is_shutting_down())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn first_request_wins() {
        let coord = ShutdownCoordinator::new();
        assert!(coord.request("stop command"));
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn duplicate_requests_are_noops() {
        let coord = ShutdownCoordinator::new();
        assert!(coord.request("first"));
        assert!(!coord.request("second"));
        assert!(!coord.request("third"));
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        let _ = coord.request("stop command");
        assert!(token.is_cancelled());
    }

    #[test]
    fn multiple_tokens_all_cancelled() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        let _ = coord.request("stop command");
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn token_cancelled_future_resolves() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();

        let handle = tokio::spawn(async move {
            token.cancelled().await;
            true
        });

        let _ = coord.request("stop command");
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn drain_awaits_all_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();

        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });

        let _ = coord.request("stop command");
        coord.drain(vec![handle], None).await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_task() {
        let coord = ShutdownCoordinator::new();

        // A task that ignores the token entirely.
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        let _ = coord.request("stop command");
        coord
            .drain(vec![handle], Some(Duration::from_millis(50)))
            .await;
        assert!(coord.is_shutting_down());
    }
}
