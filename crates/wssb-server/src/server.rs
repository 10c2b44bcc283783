//! `WssbServer`: the Axum HTTP + WebSocket surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::context::ServerContext;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::session;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The server context shared with every session task.
    pub ctx: Arc<ServerContext>,
    /// Handle rendering the Prometheus registry.
    pub metrics: PrometheusHandle,
}

/// The WSSB server.
pub struct WssbServer {
    ctx: Arc<ServerContext>,
    metrics: PrometheusHandle,
}

impl WssbServer {
    /// Create a server over an assembled context.
    pub fn new(ctx: Arc<ServerContext>, metrics: PrometheusHandle) -> Self {
        Self { ctx, metrics }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.ctx.shutdown
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            ctx: Arc::clone(&self.ctx),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listener and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port 0) and the serve task's
    /// handle. Graceful shutdown stops accepting and waits for in-flight
    /// sessions, which end on their own once the token reaches them.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.ctx.config.host, self.ctx.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "server listening");

        let router = self.router();
        let token = self.ctx.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned());
            if let Err(error) = serve.await {
                tracing::error!(%error, "server task failed");
            }
        });

        Ok((local_addr, handle))
    }
}

/// GET /ws: WebSocket upgrade into a session task.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    // Once shutdown resolves, no new sessions.
    if state.ctx.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| session::run_ws_session(socket, state.ctx))
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.ctx.registry.connected_users();
    let connections = connected.iter().map(|user| user.sockets().len()).sum();
    Json(health::health_check(
        state.ctx.start_time,
        connections,
        connected.len(),
    ))
}

/// GET /metrics: Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::render(&state.metrics)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
