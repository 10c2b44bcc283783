//! The plugin trait and its route handler companion.

use std::sync::Arc;

use async_trait::async_trait;
use wssb_core::{Connection, Reply, Request};
use wssb_events::{EventHandler, EventKind};
use wssb_users::User;

/// A request handler contributed by a plugin.
///
/// Routes run only for authenticated connections, so the resolved [`User`]
/// is always available alongside the raw request and the source socket.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Answer one request addressed to this route's code.
    async fn handle(&self, request: &Request, user: &User, source: &Arc<Connection>) -> Reply;
}

/// A server extension.
///
/// Implementations hand out their routes and event handlers once, at
/// registration; the handlers share plugin state through `Arc`s rather than
/// back-references to the plugin object.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name, unique among loaded plugins.
    fn name(&self) -> &str;

    /// Plugin version string.
    fn version(&self) -> &str;

    /// Request codes this plugin answers.
    fn routes(&self) -> Vec<(String, Arc<dyn RouteHandler>)> {
        Vec::new()
    }

    /// Lifecycle events this plugin hooks.
    fn handlers(&self) -> Vec<(EventKind, Arc<dyn EventHandler>)> {
        Vec::new()
    }

    /// Re-read the plugin's config table from disk.
    ///
    /// Fired by the `reloadplugins` command. Returns whether the reload
    /// succeeded; a failing plugin keeps its previous config.
    async fn reload(&self) -> bool {
        true
    }
}
