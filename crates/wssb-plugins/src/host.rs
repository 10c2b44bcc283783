//! The plugin host.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use wssb_core::{Connection, Reply, Request};
use wssb_events::EventBus;
use wssb_users::User;

use crate::plugin::{Plugin, RouteHandler};

struct RouteBinding {
    plugin: String,
    code: String,
    handler: Arc<dyn RouteHandler>,
}

/// Holds the loaded plugins and their materialized route table.
///
/// Plugins are registered in load order and that order is preserved
/// everywhere: event handlers fire, route dispatch runs, and reloads
/// happen in the order plugins were registered.
#[derive(Default)]
pub struct PluginHost {
    plugins: Vec<Arc<dyn Plugin>>,
    routes: Vec<RouteBinding>,
}

impl PluginHost {
    /// Create an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin: wire its event handlers into `bus` and its
    /// routes into the host's dispatch table.
    pub fn register(&mut self, bus: &mut EventBus, plugin: Arc<dyn Plugin>) {
        let name = plugin.name().to_string();
        for (kind, handler) in plugin.handlers() {
            bus.register(kind, handler);
        }
        for (code, handler) in plugin.routes() {
            debug!(plugin = %name, %code, "plugin route bound");
            self.routes.push(RouteBinding {
                plugin: name.clone(),
                code,
                handler,
            });
        }
        info!(plugin = %name, version = %plugin.version(), "plugin registered");
        self.plugins.push(plugin);
    }

    /// The loaded plugins, in registration order.
    #[must_use]
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Number of loaded plugins.
    #[must_use]
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// True if any plugin routes the given request code.
    #[must_use]
    pub fn claims(&self, code: &str) -> bool {
        self.routes.iter().any(|r| r.code == code)
    }

    /// Dispatch a request to every plugin that claims its code.
    ///
    /// All claiming plugins respond, not just the first; several plugins
    /// may legitimately react to one command. Handlers that answer
    /// [`Reply::None`] are dropped from the result.
    pub async fn dispatch(
        &self,
        request: &Request,
        user: &User,
        source: &Arc<Connection>,
    ) -> Vec<Reply> {
        let mut replies = Vec::new();
        for binding in &self.routes {
            if binding.code == request.code() {
                trace!(plugin = %binding.plugin, code = %binding.code, "dispatching plugin route");
                match binding.handler.handle(request, user, source).await {
                    Reply::None => {}
                    reply => replies.push(reply),
                }
            }
        }
        replies
    }

    /// Ask every plugin to reload its config. Returns the number that failed.
    pub async fn reload_all(&self) -> usize {
        let mut failures = 0;
        for plugin in &self.plugins {
            if plugin.reload().await {
                debug!(plugin = %plugin.name(), "plugin config reloaded");
            } else {
                warn!(plugin = %plugin.name(), "plugin reload failed, keeping previous config");
                failures += 1;
            }
        }
        failures
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("plugins", &self.plugins.len())
            .field("routes", &self.routes.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
