//! Server dependency-injection context.
//!
//! Everything the router and connection tasks touch lives here, passed
//! explicitly instead of through process-wide globals. Assembled once at
//! startup, then shared behind one `Arc` for the life of the process.

use std::path::PathBuf;
use std::time::Instant;

use parking_lot::RwLock;
use std::sync::Arc;

use wssb_events::EventBus;
use wssb_plugins::PluginHost;
use wssb_settings::ServerSettings;
use wssb_users::UserRegistry;

use crate::config::ServerConfig;
use crate::shutdown::ShutdownCoordinator;

/// Shared state passed to every router and connection code path.
pub struct ServerContext {
    /// Bind address and operational knobs, fixed at startup.
    pub config: ServerConfig,
    /// Directory holding the config tables (`server.json`, `users.json`, ...).
    pub config_dir: PathBuf,
    /// Live view of the server settings table, replaced by `reloadcfg`.
    pub settings: RwLock<ServerSettings>,
    /// Users, groups, and their attached sockets.
    pub registry: Arc<UserRegistry>,
    /// Event handler tables, frozen after plugin registration.
    pub bus: EventBus,
    /// Registered plugins and their route tables.
    pub plugins: PluginHost,
    /// Server-wide shutdown signal.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started, for uptime reporting.
    pub start_time: Instant,
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("config", &self.config)
            .field("config_dir", &self.config_dir)
            .field("registry", &self.registry)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
