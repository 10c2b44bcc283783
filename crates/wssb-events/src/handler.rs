//! The handler trait and its outcome type.

use async_trait::async_trait;

use wssb_core::Envelope;

use crate::ctx::EventCtx;

/// What one handler made of one event.
///
/// A single outcome type serves both trigger modes: conditional triggering
/// reads the verdict, notify triggering takes the reply. A handler that has
/// nothing to say returns [`HookOutcome::pass`].
#[derive(Debug)]
pub struct HookOutcome {
    verdict: bool,
    reply: Option<Envelope>,
}

impl HookOutcome {
    /// No objection, no reply.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            verdict: true,
            reply: None,
        }
    }

    /// Object to the event (conditional triggers only).
    #[must_use]
    pub fn veto() -> Self {
        Self {
            verdict: false,
            reply: None,
        }
    }

    /// No objection, plus a reply envelope (notify triggers only).
    #[must_use]
    pub fn respond(reply: Envelope) -> Self {
        Self {
            verdict: true,
            reply: Some(reply),
        }
    }

    /// The handler's vote on whether the event may proceed.
    #[must_use]
    pub fn verdict(&self) -> bool {
        self.verdict
    }

    /// The handler's reply envelope, if any.
    #[must_use]
    pub fn into_reply(self) -> Option<Envelope> {
        self.reply
    }
}

/// A plugin's hook into one lifecycle event.
///
/// Handlers must not fail: refusal is expressed through the outcome, and
/// anything unrecoverable should be logged and turned into a
/// [`HookOutcome::pass`] or [`HookOutcome::veto`] as appropriate for the
/// event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// React to one event.
    async fn handle(&self, ctx: &EventCtx) -> HookOutcome;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
