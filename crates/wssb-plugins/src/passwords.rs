//! Password gate plugin.
//!
//! Groups listed under `required_groups` in `plugins/passwords.json` only
//! admit members who present the right `password` field with their auth
//! request; everyone else authenticates by name alone, exactly as without
//! this plugin. Session resumptions skip the check: the sessions plugin
//! marks them through the shared [`SESSION_RESUMED_KEY`] annotation, so the
//! two plugins cooperate without referencing each other.
//!
//! Passwords are stored and compared in plain text, which is only as
//! defensible as the trusted-LAN deployments this server is built for.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use wssb_events::{EventCtx, EventHandler, EventKind, HookOutcome};
use wssb_settings::{TableStore, plugin_table};
use wssb_users::UserRegistry;

use crate::plugin::Plugin;
use crate::sessions::SESSION_RESUMED_KEY;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PasswordsConfig {
    /// Groups whose members must present a password.
    required_groups: Vec<String>,
    /// User name → expected password.
    passwords: HashMap<String, String>,
}

struct PasswordsState {
    table: TableStore,
    registry: Arc<UserRegistry>,
    config: Mutex<PasswordsConfig>,
}

impl PasswordsState {
    fn load_config(&self, reload: bool) -> bool {
        let loaded = if reload {
            self.table.reload()
        } else {
            self.table.load()
        };
        match loaded.and_then(|table| Ok(serde_json::from_value(table)?)) {
            Ok(config) => {
                *self.config.lock() = config;
                true
            }
            Err(err) => {
                error!(%err, "failed to load passwords config");
                false
            }
        }
    }

    /// Decide one auth attempt. `None` means this plugin has no say.
    fn check(&self, user_name: &str, given: Option<&str>) -> Option<bool> {
        let user = self.registry.find_user(user_name)?;
        let config = self.config.lock();
        let needs_password = user
            .groups()
            .iter()
            .any(|g| config.required_groups.contains(g));
        if !needs_password {
            return None;
        }
        match (config.passwords.get(user_name), given) {
            (Some(expected), Some(given)) => Some(expected == given),
            // A member of a gated group with no password on file stays
            // locked out until the operator sets one.
            _ => Some(false),
        }
    }
}

struct StartHandler {
    state: Arc<PasswordsState>,
}

#[async_trait]
impl EventHandler for StartHandler {
    async fn handle(&self, _ctx: &EventCtx) -> HookOutcome {
        if self.state.load_config(false) {
            info!("passwords plugin loaded");
            HookOutcome::pass()
        } else {
            HookOutcome::veto()
        }
    }
}

struct AuthAttemptHandler {
    state: Arc<PasswordsState>,
}

#[async_trait]
impl EventHandler for AuthAttemptHandler {
    async fn handle(&self, ctx: &EventCtx) -> HookOutcome {
        if ctx.annotation(SESSION_RESUMED_KEY).is_some() {
            return HookOutcome::pass();
        }
        let Some(user) = ctx.user() else {
            return HookOutcome::pass();
        };
        let given = ctx.request().and_then(|r| r.get_str("password"));
        match self.state.check(user, given) {
            Some(true) | None => HookOutcome::pass(),
            Some(false) => {
                warn!(user, "password check failed");
                HookOutcome::veto()
            }
        }
    }
}

/// The passwords plugin.
pub struct PasswordsPlugin {
    state: Arc<PasswordsState>,
}

impl PasswordsPlugin {
    /// Create the plugin with its table under `config_dir`.
    ///
    /// Needs the registry to resolve a user's groups when deciding whether
    /// the attempt is password-gated.
    #[must_use]
    pub fn new(config_dir: &Path, registry: Arc<UserRegistry>) -> Self {
        let table = plugin_table(
            config_dir,
            "passwords",
            json!({ "required_groups": [], "passwords": {} }),
        );
        Self {
            state: Arc::new(PasswordsState {
                table,
                registry,
                config: Mutex::new(PasswordsConfig::default()),
            }),
        }
    }
}

#[async_trait]
impl Plugin for PasswordsPlugin {
    fn name(&self) -> &str {
        "passwords"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn handlers(&self) -> Vec<(EventKind, Arc<dyn EventHandler>)> {
        vec![
            (
                EventKind::ServerStart,
                Arc::new(StartHandler {
                    state: Arc::clone(&self.state),
                }) as _,
            ),
            (
                EventKind::UserAuthAttempt,
                Arc::new(AuthAttemptHandler {
                    state: Arc::clone(&self.state),
                }) as _,
            ),
        ]
    }

    async fn reload(&self) -> bool {
        self.state.load_config(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
