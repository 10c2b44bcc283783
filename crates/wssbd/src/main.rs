//! # wssbd
//!
//! WSSB server daemon. Wires the crates together and runs the
//! WebSocket server, plus a small management CLI for the config tables.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use tracing_subscriber::EnvFilter;

use wssb_events::{EventBus, EventCtx, EventKind};
use wssb_plugins::{FooPlugin, PasswordsPlugin, PluginHost, SessionsPlugin};
use wssb_server::{ServerConfig, ServerContext, ShutdownCoordinator, WssbServer};
use wssb_settings::{ServerSettings, groups_table, load_identity_tables, load_server_settings, users_table};
use wssb_users::UserRegistry;

/// WSSB WebSocket server daemon.
#[derive(Parser, Debug)]
#[command(name = "wssbd", about = "WSSB WebSocket server daemon")]
struct Cli {
    /// Directory holding the config tables (created if missing).
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Run the server.
    Run {
        /// Host to bind (overrides the server table).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides the server table).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Delete the config tables and regenerate clean defaults.
    ResetCfg,
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Assemble the full server context from the config directory, with CLI
/// overrides applied over the server table and its env overrides.
fn build_context(
    config_dir: &Path,
    host: Option<String>,
    port: Option<u16>,
) -> Result<Arc<ServerContext>> {
    std::fs::create_dir_all(config_dir).with_context(|| {
        format!("failed to create config directory {}", config_dir.display())
    })?;

    let settings =
        load_server_settings(config_dir).context("failed to load server settings")?;
    let mut config = ServerConfig::from_settings(&settings);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let tables =
        load_identity_tables(config_dir).context("failed to load identity tables")?;
    let registry = Arc::new(UserRegistry::new());
    let _ = registry.reload(&tables);
    tracing::info!(
        users = registry.user_count(),
        groups = registry.group_count(),
        "identity tables loaded"
    );

    // Fixed load order: sessions before passwords, so the password gate
    // sees session-resumption marks left on the auth attempt.
    let mut bus = EventBus::new();
    let mut plugins = PluginHost::new();
    plugins.register(&mut bus, Arc::new(SessionsPlugin::new(config_dir)));
    plugins.register(
        &mut bus,
        Arc::new(PasswordsPlugin::new(config_dir, Arc::clone(&registry))),
    );
    plugins.register(&mut bus, Arc::new(FooPlugin::new(config_dir)));
    tracing::info!(plugins = plugins.count(), handlers = bus.count(), "plugins loaded");

    Ok(Arc::new(ServerContext {
        config,
        config_dir: config_dir.to_path_buf(),
        settings: RwLock::new(settings),
        registry,
        bus,
        plugins,
        shutdown: Arc::new(ShutdownCoordinator::new()),
        start_time: Instant::now(),
    }))
}

async fn run(config_dir: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let ctx = build_context(config_dir, host, port)?;

    // Startup gate: a plugin that cannot load its config vetoes here and
    // the server refuses to start rather than run half-configured.
    let started = ctx
        .bus
        .trigger_conditional(EventKind::ServerStart, &EventCtx::server_start())
        .await;
    if !started {
        anyhow::bail!("a plugin vetoed server start; see the log for which");
    }

    let metrics = wssb_server::metrics::install_recorder();
    let server = WssbServer::new(Arc::clone(&ctx), metrics);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!("wssbd listening on ws://{addr}/ws");

    // Wait for whichever comes first: the stop command resolving the
    // token, or an interrupt from the terminal.
    let shutdown_token = ctx.shutdown.token();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            if ctx.shutdown.request("interrupt signal") {
                let _ = ctx
                    .bus
                    .trigger_notify(EventKind::ServerStop, &EventCtx::server_stop())
                    .await;
            }
        }
        () = shutdown_token.cancelled() => {}
    }

    tracing::info!("shutting down");
    ctx.shutdown.drain(vec![handle], None).await;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Reset the three root tables to their generated defaults.
///
/// Plugin tables are left alone; each plugin regenerates its own on the
/// next start.
fn reset_cfg(config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir).with_context(|| {
        format!("failed to create config directory {}", config_dir.display())
    })?;

    let _ = ServerSettings::table(config_dir)
        .reset()
        .context("failed to reset server.json")?;
    let _ = groups_table(config_dir)
        .reset()
        .context("failed to reset groups.json")?;
    let _ = users_table(config_dir)
        .reset()
        .context("failed to reset users.json")?;

    tracing::info!(dir = %config_dir.display(), "config tables reset to defaults");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.quiet);

    match args.action {
        Action::Run { host, port } => run(&args.config_dir, host, port).await,
        Action::ResetCfg => reset_cfg(&args.config_dir),
    }
}
