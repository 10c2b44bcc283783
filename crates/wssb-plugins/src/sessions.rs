//! Session continuity plugin.
//!
//! On every fresh authentication the plugin mints a session (UUID v4) and
//! tells the client its id in a `SESSIONS_NEW` response. A client that
//! reconnects within the session timeout can present that id in its auth
//! request and is let back in without re-proving anything else; other
//! auth-gating plugins see the resumption through the
//! [`SESSION_RESUMED_KEY`] annotation and stand down.
//!
//! Sessions live for a fixed `session_timeout` from creation (default 300
//! seconds, `plugins/sessions.json`); the expiry timers race a shared
//! cancellation token that server shutdown cancels.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use wssb_core::{ConnectionId, Envelope, Response, Status, Target};
use wssb_events::{EventCtx, EventHandler, EventKind, HookOutcome};
use wssb_settings::{TableStore, plugin_table};

use crate::plugin::Plugin;

/// Annotation key set on an auth-attempt pass when a session id checked out.
pub const SESSION_RESUMED_KEY: &str = "session_resumed";

/// Response code announcing a freshly minted session.
pub const SESSIONS_NEW: &str = "SESSIONS_NEW";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

struct Session {
    id: String,
    user: String,
    conn: Mutex<Option<ConnectionId>>,
}

struct SessionStore {
    table: TableStore,
    timeout: Mutex<Duration>,
    sessions: Mutex<Vec<Arc<Session>>>,
    /// Connections whose auth attempt presented a valid session id, waiting
    /// for the authenticated event to re-attach them.
    resumed: Mutex<HashMap<ConnectionId, String>>,
    cancel: CancellationToken,
}

impl SessionStore {
    fn load_config(&self, reload: bool) -> bool {
        let loaded = if reload {
            self.table.reload()
        } else {
            self.table.load()
        };
        match loaded {
            Ok(table) => {
                let secs = table
                    .get("session_timeout")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS);
                *self.timeout.lock() = Duration::from_secs(secs);
                true
            }
            Err(err) => {
                error!(%err, "failed to load sessions config");
                false
            }
        }
    }

    fn find(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().iter().find(|s| s.id == id).cloned()
    }

    fn create(self: &Arc<Self>, user: &str, conn: ConnectionId) -> Arc<Session> {
        let session = Arc::new(Session {
            id: Uuid::new_v4().to_string(),
            user: user.to_string(),
            conn: Mutex::new(Some(conn)),
        });
        self.sessions.lock().push(Arc::clone(&session));
        info!(session = %session.id, user, "session generated");

        let store = Arc::clone(self);
        let id = session.id.clone();
        let ttl = *self.timeout.lock();
        let cancel = self.cancel.clone();
        let _ = tokio::spawn(async move {
            // Biased so cancellation beats an already-elapsed timer.
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(ttl) => {
                    store.sessions.lock().retain(|s| s.id != id);
                    info!(session = %id, "session expired");
                }
            }
        });
        session
    }

    fn attach(&self, id: &str, conn: ConnectionId) {
        if let Some(session) = self.find(id) {
            *session.conn.lock() = Some(conn);
        }
    }

    fn detach(&self, conn: &ConnectionId) {
        for session in self.sessions.lock().iter() {
            let mut attached = session.conn.lock();
            if attached.as_ref() == Some(conn) {
                *attached = None;
            }
        }
    }
}

struct StartHandler {
    store: Arc<SessionStore>,
}

#[async_trait]
impl EventHandler for StartHandler {
    async fn handle(&self, _ctx: &EventCtx) -> HookOutcome {
        if self.store.load_config(false) {
            info!("sessions plugin loaded");
            HookOutcome::pass()
        } else {
            HookOutcome::veto()
        }
    }
}

struct StopHandler {
    store: Arc<SessionStore>,
}

#[async_trait]
impl EventHandler for StopHandler {
    async fn handle(&self, _ctx: &EventCtx) -> HookOutcome {
        self.store.cancel.cancel();
        info!("session expiry timers cancelled");
        HookOutcome::pass()
    }
}

struct AuthAttemptHandler {
    store: Arc<SessionStore>,
}

#[async_trait]
impl EventHandler for AuthAttemptHandler {
    async fn handle(&self, ctx: &EventCtx) -> HookOutcome {
        let (Some(conn), Some(user)) = (ctx.connection(), ctx.user()) else {
            return HookOutcome::pass();
        };
        // A vetoed earlier attempt must not leave a stale resume marker
        // behind for this connection.
        let _ = self.store.resumed.lock().remove(conn.id());

        let Some(session_id) = ctx.request().and_then(|r| r.get_str("session_id")) else {
            return HookOutcome::pass();
        };
        match self.store.find(session_id) {
            Some(session) if session.user == user => {
                let _ = self
                    .store
                    .resumed
                    .lock()
                    .insert(conn.id().clone(), session.id.clone());
                ctx.annotate(SESSION_RESUMED_KEY, Value::Bool(true));
                HookOutcome::pass()
            }
            Some(_) => {
                warn!(user, "session id belongs to a different user");
                HookOutcome::veto()
            }
            None => {
                warn!(user, "unknown or expired session id");
                HookOutcome::veto()
            }
        }
    }
}

struct AuthenticatedHandler {
    store: Arc<SessionStore>,
}

#[async_trait]
impl EventHandler for AuthenticatedHandler {
    async fn handle(&self, ctx: &EventCtx) -> HookOutcome {
        let (Some(conn), Some(user)) = (ctx.connection(), ctx.user()) else {
            return HookOutcome::pass();
        };
        let resumed = self.store.resumed.lock().remove(conn.id());
        if let Some(session_id) = resumed {
            self.store.attach(&session_id, conn.id().clone());
            info!(session = %session_id, user, "session resumed");
            return HookOutcome::pass();
        }

        let session = self.store.create(user, conn.id().clone());
        HookOutcome::respond(Envelope::single(
            Response::bare(Status::Info, SESSIONS_NEW)
                .with_field("session_id", Value::String(session.id.clone())),
            Target::source(),
        ))
    }
}

struct DisconnectHandler {
    store: Arc<SessionStore>,
}

#[async_trait]
impl EventHandler for DisconnectHandler {
    async fn handle(&self, ctx: &EventCtx) -> HookOutcome {
        if let Some(conn) = ctx.connection() {
            self.store.detach(conn.id());
        }
        HookOutcome::pass()
    }
}

/// The sessions plugin.
pub struct SessionsPlugin {
    store: Arc<SessionStore>,
}

impl SessionsPlugin {
    /// Create the plugin with its table under `config_dir`.
    #[must_use]
    pub fn new(config_dir: &Path) -> Self {
        let table = plugin_table(
            config_dir,
            "sessions",
            json!({ "session_timeout": DEFAULT_TIMEOUT_SECS }),
        );
        Self {
            store: Arc::new(SessionStore {
                table,
                timeout: Mutex::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
                sessions: Mutex::new(Vec::new()),
                resumed: Mutex::new(HashMap::new()),
                cancel: CancellationToken::new(),
            }),
        }
    }
}

#[async_trait]
impl Plugin for SessionsPlugin {
    fn name(&self) -> &str {
        "sessions"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn handlers(&self) -> Vec<(EventKind, Arc<dyn EventHandler>)> {
        vec![
            (
                EventKind::ServerStart,
                Arc::new(StartHandler {
                    store: Arc::clone(&self.store),
                }) as _,
            ),
            (
                EventKind::ServerStop,
                Arc::new(StopHandler {
                    store: Arc::clone(&self.store),
                }) as _,
            ),
            (
                EventKind::UserAuthAttempt,
                Arc::new(AuthAttemptHandler {
                    store: Arc::clone(&self.store),
                }) as _,
            ),
            (
                EventKind::UserAuthenticated,
                Arc::new(AuthenticatedHandler {
                    store: Arc::clone(&self.store),
                }) as _,
            ),
            (
                EventKind::UserDisconnect,
                Arc::new(DisconnectHandler {
                    store: Arc::clone(&self.store),
                }) as _,
            ),
        ]
    }

    async fn reload(&self) -> bool {
        self.store.load_config(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
