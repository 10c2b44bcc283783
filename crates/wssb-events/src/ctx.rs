//! Event kinds and the context passed to handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use wssb_core::{Connection, Request};

/// The five lifecycle events plugins can hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fired once before the listener binds; conditional (veto blocks startup).
    ServerStart,
    /// Fired once when shutdown resolves; notify.
    ServerStop,
    /// Fired when a known user attempts auth; conditional (veto rejects).
    UserAuthAttempt,
    /// Fired after a user is authenticated and registered; notify.
    UserAuthenticated,
    /// Fired when an authenticated connection goes away; notify.
    UserDisconnect,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ServerStart => "server_start",
            Self::ServerStop => "server_stop",
            Self::UserAuthAttempt => "user_auth_attempt",
            Self::UserAuthenticated => "user_authenticated",
            Self::UserDisconnect => "user_disconnect",
        };
        f.write_str(name)
    }
}

/// Kind-specific payload of an event.
#[derive(Clone, Debug)]
pub enum EventDetail {
    /// The server is about to start listening.
    ServerStart,
    /// The server is shutting down.
    ServerStop,
    /// `user` sent an auth request over `conn`.
    UserAuthAttempt {
        /// Name of the user attempting to authenticate.
        user: String,
        /// The auth request as received.
        request: Request,
        /// The connection the attempt arrived on.
        conn: Arc<Connection>,
    },
    /// `user` was authenticated and `conn` registered to them.
    UserAuthenticated {
        /// Name of the newly authenticated user.
        user: String,
        /// The connection now attached to the user.
        conn: Arc<Connection>,
    },
    /// An authenticated connection of `user` disconnected.
    UserDisconnect {
        /// Name of the user the connection belonged to.
        user: String,
        /// The connection that went away.
        conn: Arc<Connection>,
    },
}

/// Context handed to every handler of one trigger pass.
///
/// The annotation map is shared by all handlers of the pass; cooperating
/// plugins communicate through it instead of holding references to each
/// other (e.g. one plugin marks an auth attempt as a session resumption,
/// another skips its password check on seeing the mark).
#[derive(Debug)]
pub struct EventCtx {
    detail: EventDetail,
    annotations: Mutex<Map<String, Value>>,
    at: DateTime<Utc>,
}

impl EventCtx {
    fn new(detail: EventDetail) -> Self {
        Self {
            detail,
            annotations: Mutex::new(Map::new()),
            at: Utc::now(),
        }
    }

    /// Context for [`EventKind::ServerStart`].
    #[must_use]
    pub fn server_start() -> Self {
        Self::new(EventDetail::ServerStart)
    }

    /// Context for [`EventKind::ServerStop`].
    #[must_use]
    pub fn server_stop() -> Self {
        Self::new(EventDetail::ServerStop)
    }

    /// Context for [`EventKind::UserAuthAttempt`].
    #[must_use]
    pub fn auth_attempt(user: &str, request: Request, conn: Arc<Connection>) -> Self {
        Self::new(EventDetail::UserAuthAttempt {
            user: user.to_string(),
            request,
            conn,
        })
    }

    /// Context for [`EventKind::UserAuthenticated`].
    #[must_use]
    pub fn authenticated(user: &str, conn: Arc<Connection>) -> Self {
        Self::new(EventDetail::UserAuthenticated {
            user: user.to_string(),
            conn,
        })
    }

    /// Context for [`EventKind::UserDisconnect`].
    #[must_use]
    pub fn disconnect(user: &str, conn: Arc<Connection>) -> Self {
        Self::new(EventDetail::UserDisconnect {
            user: user.to_string(),
            conn,
        })
    }

    /// The kind this context belongs to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self.detail {
            EventDetail::ServerStart => EventKind::ServerStart,
            EventDetail::ServerStop => EventKind::ServerStop,
            EventDetail::UserAuthAttempt { .. } => EventKind::UserAuthAttempt,
            EventDetail::UserAuthenticated { .. } => EventKind::UserAuthenticated,
            EventDetail::UserDisconnect { .. } => EventKind::UserDisconnect,
        }
    }

    /// Kind-specific payload.
    #[must_use]
    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }

    /// The user involved, where the kind carries one.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::ServerStart | EventDetail::ServerStop => None,
            EventDetail::UserAuthAttempt { user, .. }
            | EventDetail::UserAuthenticated { user, .. }
            | EventDetail::UserDisconnect { user, .. } => Some(user),
        }
    }

    /// The request packet, where the kind carries one.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match &self.detail {
            EventDetail::UserAuthAttempt { request, .. } => Some(request),
            _ => None,
        }
    }

    /// The connection involved, where the kind carries one.
    #[must_use]
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        match &self.detail {
            EventDetail::ServerStart | EventDetail::ServerStop => None,
            EventDetail::UserAuthAttempt { conn, .. }
            | EventDetail::UserAuthenticated { conn, .. }
            | EventDetail::UserDisconnect { conn, .. } => Some(conn),
        }
    }

    /// When the event was raised.
    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Set a shared annotation visible to later handlers of this pass.
    pub fn annotate(&self, key: &str, value: Value) {
        let _ = self.annotations.lock().insert(key.to_string(), value);
    }

    /// Read a shared annotation set earlier in this pass.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<Value> {
        self.annotations.lock().get(key).cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
