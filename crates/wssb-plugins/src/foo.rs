//! Worked example plugin.
//!
//! Demonstrates the whole plugin surface in the smallest useful shape: a
//! server-start hook that materializes a config table, one route (`foo`),
//! and a reload hook. New plugin authors should start from here.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use wssb_core::{Connection, Reply, Request, Response};
use wssb_events::{EventCtx, EventHandler, EventKind, HookOutcome};
use wssb_settings::{TableStore, plugin_table};
use wssb_users::User;

use crate::plugin::{Plugin, RouteHandler};

/// Response code for a handled `foo` request.
pub const FOO_OK: &str = "FOO_OK";

struct StartHandler {
    table: TableStore,
}

#[async_trait]
impl EventHandler for StartHandler {
    async fn handle(&self, _ctx: &EventCtx) -> HookOutcome {
        match self.table.load() {
            Ok(_) => {
                info!("foo plugin started successfully");
                HookOutcome::pass()
            }
            Err(err) => {
                error!(%err, "failed to load foo config");
                HookOutcome::veto()
            }
        }
    }
}

struct FooRoute;

#[async_trait]
impl RouteHandler for FooRoute {
    async fn handle(&self, _request: &Request, user: &User, _source: &Arc<Connection>) -> Reply {
        info!(user = user.name(), "foo requested");
        Reply::to_source(Response::success(FOO_OK, "bar"))
    }
}

/// The example plugin.
pub struct FooPlugin {
    table: TableStore,
}

impl FooPlugin {
    /// Create the plugin with its table under `config_dir`.
    #[must_use]
    pub fn new(config_dir: &Path) -> Self {
        let defaults = json!({
            "section_1": { "option_1": true, "option_2": false },
            "section_2": { "option_3": 3, "option_4": "test" },
        });
        Self {
            table: plugin_table(config_dir, "foo", defaults),
        }
    }
}

#[async_trait]
impl Plugin for FooPlugin {
    fn name(&self) -> &str {
        "foo"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn routes(&self) -> Vec<(String, Arc<dyn RouteHandler>)> {
        vec![("foo".to_string(), Arc::new(FooRoute) as _)]
    }

    fn handlers(&self) -> Vec<(EventKind, Arc<dyn EventHandler>)> {
        vec![(
            EventKind::ServerStart,
            Arc::new(StartHandler {
                table: self.table.clone(),
            }) as _,
        )]
    }

    async fn reload(&self) -> bool {
        match self.table.reload() {
            Ok(_) => true,
            Err(err) => {
                error!(%err, "failed to reload foo config");
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
