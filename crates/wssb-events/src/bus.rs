//! The event bus.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};
use wssb_core::Envelope;

use crate::ctx::{EventCtx, EventKind};
use crate::handler::EventHandler;

/// Registry of lifecycle event handlers, keyed by kind.
///
/// Handlers run in registration order within a kind. The bus is assembled
/// once at startup (plugins register while it is still exclusively owned)
/// and never mutated afterwards, so triggering needs no locking.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Fire a conditional event: every handler votes, the AND of all
    /// verdicts decides.
    ///
    /// Zero handlers pass vacuously. Every handler is invoked even after
    /// one votes no, so the side effects of later handlers still happen;
    /// only the aggregate is affected.
    pub async fn trigger_conditional(&self, kind: EventKind, ctx: &EventCtx) -> bool {
        let handlers = self.handlers.get(&kind).map_or(&[][..], Vec::as_slice);
        trace!(%kind, handlers = handlers.len(), "conditional trigger");

        let mut pass = true;
        for handler in handlers {
            pass &= handler.handle(ctx).await.verdict();
        }
        if !pass {
            debug!(%kind, "event vetoed by plugin handler");
        }
        pass
    }

    /// Fire a notify event: every handler runs, replies are collected in
    /// registration order.
    pub async fn trigger_notify(&self, kind: EventKind, ctx: &EventCtx) -> Vec<Envelope> {
        let handlers = self.handlers.get(&kind).map_or(&[][..], Vec::as_slice);
        trace!(%kind, handlers = handlers.len(), "notify trigger");

        let mut replies = Vec::new();
        for handler in handlers {
            if let Some(reply) = handler.handle(ctx).await.into_reply() {
                replies.push(reply);
            }
        }
        replies
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handler_count", &self.count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
