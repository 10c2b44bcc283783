//! Shared helpers for the crate's unit tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;

use wssb_core::Connection;
use wssb_events::EventBus;
use wssb_plugins::PluginHost;
use wssb_settings::{ServerSettings, load_identity_tables};
use wssb_users::UserRegistry;

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::shutdown::ShutdownCoordinator;

/// Write identity tables where "joe" is an admin (group `admins` holding
/// `wssb`) and "amy" has no permissions at all.
pub(crate) fn write_identity(dir: &Path) {
    write_identity_tables(
        dir,
        r#"{"admins": {"permissions": "wssb"}}"#,
        r#"{
            "joe": {"permissions": "", "groups": "admins", "address": ""},
            "amy": {"permissions": "", "groups": "", "address": ""}
        }"#,
    );
}

/// Write arbitrary groups/users tables into `dir`.
pub(crate) fn write_identity_tables(dir: &Path, groups: &str, users: &str) {
    std::fs::write(dir.join("groups.json"), groups).unwrap();
    std::fs::write(dir.join("users.json"), users).unwrap();
}

/// Build a context over `dir` with the default identity tables and no
/// plugins registered.
pub(crate) fn make_context(dir: &Path) -> Arc<ServerContext> {
    make_context_with(dir, |_bus, _host, _registry| {})
}

/// Build a context over `dir`, letting the caller register plugins before
/// the bus and host are frozen.
pub(crate) fn make_context_with(
    dir: &Path,
    setup: impl FnOnce(&mut EventBus, &mut PluginHost, &Arc<UserRegistry>),
) -> Arc<ServerContext> {
    if !dir.join("users.json").exists() {
        write_identity(dir);
    }
    let tables = load_identity_tables(dir).unwrap();
    let registry = Arc::new(UserRegistry::new());
    let orphans = registry.reload(&tables);
    assert!(orphans.is_empty());

    let mut bus = EventBus::new();
    let mut host = PluginHost::new();
    setup(&mut bus, &mut host, &registry);

    Arc::new(ServerContext {
        config: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            send_queue: 64,
        },
        config_dir: dir.to_path_buf(),
        settings: RwLock::new(ServerSettings::default()),
        registry,
        bus,
        plugins: host,
        shutdown: Arc::new(ShutdownCoordinator::new()),
        start_time: Instant::now(),
    })
}

/// A connection handle with its outbound receiver.
pub(crate) fn make_conn() -> (Arc<Connection>, mpsc::Receiver<Arc<String>>) {
    let (tx, rx) = mpsc::channel(64);
    (Arc::new(Connection::new(tx)), rx)
}

/// Pop every frame currently queued on a connection's outbound channel,
/// parsed as JSON.
pub(crate) fn drain_frames(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}
