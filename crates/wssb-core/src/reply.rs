//! The tagged reply union handlers return.
//!
//! The original system signaled these cases through loosely-shaped values
//! (absent result, plain payload, marker-carrying payload); here each case is
//! a variant so router dispatch is exhaustive.

use std::sync::Arc;

use crate::conn::Connection;
use crate::packet::Response;
use crate::target::Target;

/// An order to force-close one connection, with the reason sent to the peer.
#[derive(Debug, Clone)]
pub struct CloseOrder {
    /// The connection to close.
    pub connection: Arc<Connection>,
    /// Human-readable reason, delivered in the kick notice.
    pub reason: String,
}

impl CloseOrder {
    /// Build a close order.
    #[must_use]
    pub fn new(connection: Arc<Connection>, reason: impl Into<String>) -> Self {
        Self {
            connection,
            reason: reason.into(),
        }
    }
}

/// A routed reply: payload, where it goes, and side effects to apply.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// Response packets, sent together as one frame.
    pub payload: Vec<Response>,
    /// Where the payload goes. Meaningless when the payload is empty.
    pub target: Target,
    /// Connections to kick after delivery.
    pub close: Vec<CloseOrder>,
    /// Resolve the server-wide shutdown signal after delivery.
    pub shutdown: bool,
}

impl Envelope {
    /// A single-packet envelope.
    #[must_use]
    pub fn single(response: Response, target: Target) -> Self {
        Self {
            payload: vec![response],
            target,
            close: Vec::new(),
            shutdown: false,
        }
    }

    /// An envelope with no payload, used to carry only side effects.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a close order (builder style).
    #[must_use]
    pub fn with_close(mut self, order: CloseOrder) -> Self {
        self.close.push(order);
        self
    }

    /// Set the shutdown flag (builder style).
    #[must_use]
    pub fn with_shutdown(mut self) -> Self {
        self.shutdown = true;
        self
    }

    /// Fold another envelope's side effects into this one.
    ///
    /// Used by the composite `reload` command: payloads stay with their own
    /// envelopes, but forced closes and shutdown flags propagate.
    pub fn absorb_effects(&mut self, other: &Envelope) {
        self.close.extend(other.close.iter().cloned());
        self.shutdown = self.shutdown || other.shutdown;
    }
}

/// What a routed request produced.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The handler chose not to answer.
    None,
    /// A successful authentication: the user to bind plus the welcome
    /// envelopes collected from the `UserAuthenticated` hooks, in order.
    Auth {
        /// Name of the newly authenticated user.
        user: String,
        /// Plugin welcome envelopes, delivered after the success packet.
        welcome: Vec<Envelope>,
    },
    /// A payload and/or side effects to apply.
    Envelope(Envelope),
}

impl Reply {
    /// Shorthand for a single-packet reply to the source connection.
    #[must_use]
    pub fn to_source(response: Response) -> Self {
        Self::Envelope(Envelope::single(response, Target::source()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
