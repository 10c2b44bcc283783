//! End-to-end tests driving the server through a real WebSocket client.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use wssb_core::codes;
use wssb_events::{EventBus, EventCtx, EventHandler, EventKind, HookOutcome};
use wssb_plugins::sessions::SESSIONS_NEW;
use wssb_plugins::{FooPlugin, PasswordsPlugin, PluginHost, SessionsPlugin};
use wssb_server::{ServerConfig, ServerContext, ShutdownCoordinator, WssbServer};
use wssb_settings::{ServerSettings, load_identity_tables};
use wssb_users::UserRegistry;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    url: String,
    http_base: String,
    server: WssbServer,
    handle: tokio::task::JoinHandle<()>,
    config: tempfile::TempDir,
}

/// Seed identity tables: `joe` holds the `wssb` permission tree through the
/// `admins` group, `amy` holds nothing.
fn write_identity(dir: &Path) {
    std::fs::write(
        dir.join("groups.json"),
        r#"{"admins": {"permissions": "wssb"}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("users.json"),
        r#"{
            "joe": {"permissions": "", "groups": "admins", "address": ""},
            "amy": {"permissions": "", "groups": "", "address": ""}
        }"#,
    )
    .unwrap();
}

/// Boot a server on an ephemeral port, with `setup` wiring extra handlers
/// and plugins before startup.
async fn boot_server_with(
    setup: impl FnOnce(&Path, &mut EventBus, &mut PluginHost, &Arc<UserRegistry>),
) -> TestServer {
    let config = tempfile::tempdir().unwrap();
    write_identity(config.path());

    let tables = load_identity_tables(config.path()).unwrap();
    let registry = Arc::new(UserRegistry::new());
    assert!(registry.reload(&tables).is_empty());

    let mut bus = EventBus::new();
    let mut plugins = PluginHost::new();
    setup(config.path(), &mut bus, &mut plugins, &registry);

    let ctx = Arc::new(ServerContext {
        config: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            send_queue: 64,
        },
        config_dir: config.path().to_path_buf(),
        settings: RwLock::new(ServerSettings::default()),
        registry,
        bus,
        plugins,
        shutdown: Arc::new(ShutdownCoordinator::new()),
        start_time: Instant::now(),
    });
    assert!(
        ctx.bus
            .trigger_conditional(EventKind::ServerStart, &EventCtx::server_start())
            .await,
        "a startup hook vetoed"
    );

    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let server = WssbServer::new(ctx, metrics);
    let (addr, handle) = server.listen().await.unwrap();

    TestServer {
        url: format!("ws://{addr}/ws"),
        http_base: format!("http://{addr}"),
        server,
        handle,
        config,
    }
}

async fn boot_server() -> TestServer {
    boot_server_with(|_, _, _, _| {}).await
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Read the next text frame as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Send one request packet; extra fields are merged into the packet body.
async fn send_request(ws: &mut WsStream, code: &str, fields: Value) {
    let mut req = json!({"type": "request", "code": code});
    if let Some(extra) = fields.as_object() {
        for (key, value) in extra {
            req[key] = value.clone();
        }
    }
    ws.send(Message::text(req.to_string())).await.unwrap();
}

/// Authenticate and return the first reply.
async fn auth(ws: &mut WsStream, user: &str) -> Value {
    send_request(ws, "auth", json!({"user_name": user})).await;
    read_json(ws).await
}

/// Read frames until the server closes the connection.
async fn read_until_closed(ws: &mut WsStream) {
    timeout(TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await
    .expect("connection did not close");
}

// ── Test handlers ──

struct CountingStop {
    fired: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for CountingStop {
    async fn handle(&self, _ctx: &EventCtx) -> HookOutcome {
        let _ = self.fired.fetch_add(1, Ordering::SeqCst);
        HookOutcome::pass()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_auth_success() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    let resp = auth(&mut ws, "joe").await;
    assert_eq!(resp["type"], "response");
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["code"], codes::AUTH_SUCCESS);
    assert_eq!(resp["message"], "You are now logged in!");

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_auth_unknown_user_is_refused() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    let resp = auth(&mut ws, "nobody").await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["code"], codes::AUTH_USER_NOT_FOUND);

    // The refusal does not cost the connection.
    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_auth_without_user_name_is_syntax_error() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    send_request(&mut ws, "auth", json!({})).await;
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["code"], codes::AUTH_INVALID_SYNTAX);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_second_auth_is_rejected() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);
    let resp = auth(&mut ws, "amy").await;
    assert_eq!(resp["code"], codes::ALREADY_AUTHENTICATED);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_preauth_request_refused_but_connection_survives() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    send_request(&mut ws, "stop", json!({})).await;
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["code"], codes::USER_NOT_AUTHENTICATED);

    // Same socket can still authenticate afterwards.
    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);

    let _ = t.server.shutdown().request("test over");
}

// ─────────────────────────────────────────────────────────────────────────────
// Framing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_undecodable_frame_gets_bad_packet() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    ws.send(Message::text("not valid json")).await.unwrap();
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["status"], "error");
    assert_eq!(resp["code"], codes::BAD_PACKET);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_non_request_packets_are_ignored() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    let packet = json!({"type": "response", "status": "success", "code": "X"});
    ws.send(Message::text(packet.to_string())).await.unwrap();

    // The next reply belongs to the auth that follows, not the dropped packet.
    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_batched_frame_answers_in_order() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;

    let batch = json!([
        {"type": "request", "code": "auth", "user_name": "joe"},
        {"type": "request", "code": "nosuch"}
    ]);
    ws.send(Message::text(batch.to_string())).await.unwrap();

    assert_eq!(read_json(&mut ws).await["code"], codes::AUTH_SUCCESS);
    assert_eq!(
        read_json(&mut ws).await["code"],
        codes::REQUEST_CODE_NOT_FOUND
    );

    let _ = t.server.shutdown().request("test over");
}

// ─────────────────────────────────────────────────────────────────────────────
// Core commands
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_unclaimed_code_is_not_found() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;
    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);

    send_request(&mut ws, "frobnicate", json!({})).await;
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["code"], codes::REQUEST_CODE_NOT_FOUND);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_plain_user_cannot_stop() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;
    assert_eq!(auth(&mut ws, "amy").await["code"], codes::AUTH_SUCCESS);

    send_request(&mut ws, "stop", json!({})).await;
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["code"], codes::ACCESS_DENIED);
    assert!(!t.server.shutdown().is_shutting_down());

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_stop_reaches_every_client_then_closes() {
    let t = boot_server().await;
    let mut joe = connect(&t.url).await;
    let mut amy = connect(&t.url).await;
    assert_eq!(auth(&mut joe, "joe").await["code"], codes::AUTH_SUCCESS);
    assert_eq!(auth(&mut amy, "amy").await["code"], codes::AUTH_SUCCESS);

    send_request(&mut joe, "stop", json!({})).await;

    let stopping = read_json(&mut joe).await;
    assert_eq!(stopping["code"], codes::STOPPING);
    assert_eq!(stopping["status"], "info");
    assert_eq!(read_json(&mut amy).await["code"], codes::STOPPING);

    read_until_closed(&mut joe).await;
    read_until_closed(&mut amy).await;

    // With every session drained the accept loop stops too.
    timeout(TIMEOUT, t.handle)
        .await
        .expect("server did not stop")
        .unwrap();
}

#[tokio::test]
async fn e2e_repeated_stop_fires_hooks_once() {
    let fired = Arc::new(AtomicUsize::new(0));
    let t = {
        let fired = Arc::clone(&fired);
        boot_server_with(move |_, bus, _, _| {
            bus.register(EventKind::ServerStop, Arc::new(CountingStop { fired }));
        })
        .await
    };
    let mut first = connect(&t.url).await;
    let mut second = connect(&t.url).await;
    assert_eq!(auth(&mut first, "joe").await["code"], codes::AUTH_SUCCESS);
    assert_eq!(auth(&mut second, "joe").await["code"], codes::AUTH_SUCCESS);

    send_request(&mut first, "stop", json!({})).await;
    send_request(&mut second, "stop", json!({})).await;

    read_until_closed(&mut first).await;
    read_until_closed(&mut second).await;
    timeout(TIMEOUT, t.handle)
        .await
        .expect("server did not stop")
        .unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn e2e_reloadusers_kicks_removed_user() {
    let t = boot_server().await;
    let mut joe = connect(&t.url).await;
    let mut amy = connect(&t.url).await;
    assert_eq!(auth(&mut joe, "joe").await["code"], codes::AUTH_SUCCESS);
    assert_eq!(auth(&mut amy, "amy").await["code"], codes::AUTH_SUCCESS);

    // Drop amy from the table, then reload.
    std::fs::write(
        t.config.path().join("users.json"),
        r#"{"joe": {"permissions": "", "groups": "admins", "address": ""}}"#,
    )
    .unwrap();
    send_request(&mut joe, "reloadusers", json!({})).await;
    assert_eq!(read_json(&mut joe).await["code"], codes::RELOAD_USERS_OK);

    let kicked = read_json(&mut amy).await;
    assert_eq!(kicked["status"], "warning");
    assert_eq!(kicked["code"], codes::KICKED);
    assert_eq!(kicked["message"], "Your user was removed from the server.");
    read_until_closed(&mut amy).await;

    // The survivor's socket carried over.
    send_request(&mut joe, "nosuch", json!({})).await;
    assert_eq!(
        read_json(&mut joe).await["code"],
        codes::REQUEST_CODE_NOT_FOUND
    );

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_reload_composes_one_response() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;
    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);

    send_request(&mut ws, "reload", json!({})).await;
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["code"], codes::RELOAD_OK);

    // No per-step responses leak out; the next frame answers the next request.
    send_request(&mut ws, "nosuch", json!({})).await;
    assert_eq!(
        read_json(&mut ws).await["code"],
        codes::REQUEST_CODE_NOT_FOUND
    );

    let _ = t.server.shutdown().request("test over");
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plugin_route_answers_claimed_code() {
    let t = boot_server_with(|dir, bus, plugins, _| {
        plugins.register(bus, Arc::new(FooPlugin::new(dir)));
    })
    .await;
    let mut ws = connect(&t.url).await;
    assert_eq!(auth(&mut ws, "amy").await["code"], codes::AUTH_SUCCESS);

    send_request(&mut ws, "foo", json!({})).await;
    let resp = read_json(&mut ws).await;
    assert_eq!(resp["status"], "success");
    assert_eq!(resp["code"], "FOO_OK");
    assert_eq!(resp["message"], "bar");

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_sessions_plugin_welcomes_fresh_auth() {
    let t = boot_server_with(|dir, bus, plugins, _| {
        plugins.register(bus, Arc::new(SessionsPlugin::new(dir)));
    })
    .await;
    let mut ws = connect(&t.url).await;

    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);
    let welcome = read_json(&mut ws).await;
    assert_eq!(welcome["code"], SESSIONS_NEW);
    assert!(welcome["session_id"].is_string());

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_password_gate_refuses_then_admits() {
    let t = boot_server_with(|dir, bus, plugins, registry| {
        std::fs::create_dir_all(dir.join("plugins")).unwrap();
        std::fs::write(
            dir.join("plugins").join("passwords.json"),
            r#"{"required_groups": ["admins"], "passwords": {"joe": "hunter2"}}"#,
        )
        .unwrap();
        plugins.register(bus, Arc::new(PasswordsPlugin::new(dir, Arc::clone(registry))));
    })
    .await;
    let mut ws = connect(&t.url).await;

    send_request(
        &mut ws,
        "auth",
        json!({"user_name": "joe", "password": "wrong"}),
    )
    .await;
    assert_eq!(read_json(&mut ws).await["code"], codes::AUTH_FAILED);

    send_request(
        &mut ws,
        "auth",
        json!({"user_name": "joe", "password": "hunter2"}),
    )
    .await;
    assert_eq!(read_json(&mut ws).await["code"], codes::AUTH_SUCCESS);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_session_resume_skips_password_gate() {
    // Sessions registers first so its resumption annotation is visible to
    // the password gate.
    let t = boot_server_with(|dir, bus, plugins, registry| {
        std::fs::create_dir_all(dir.join("plugins")).unwrap();
        std::fs::write(
            dir.join("plugins").join("passwords.json"),
            r#"{"required_groups": ["admins"], "passwords": {"joe": "hunter2"}}"#,
        )
        .unwrap();
        plugins.register(bus, Arc::new(SessionsPlugin::new(dir)));
        plugins.register(bus, Arc::new(PasswordsPlugin::new(dir, Arc::clone(registry))));
    })
    .await;

    let mut first = connect(&t.url).await;
    send_request(
        &mut first,
        "auth",
        json!({"user_name": "joe", "password": "hunter2"}),
    )
    .await;
    assert_eq!(read_json(&mut first).await["code"], codes::AUTH_SUCCESS);
    let welcome = read_json(&mut first).await;
    assert_eq!(welcome["code"], SESSIONS_NEW);
    let session_id = welcome["session_id"].as_str().unwrap().to_string();
    drop(first);

    // Reconnect presenting the session id instead of the password.
    let mut second = connect(&t.url).await;
    send_request(
        &mut second,
        "auth",
        json!({"user_name": "joe", "session_id": session_id}),
    )
    .await;
    assert_eq!(read_json(&mut second).await["code"], codes::AUTH_SUCCESS);

    // A resumption mints no second session, so no welcome frame arrives;
    // the next frame answers the request that follows.
    send_request(&mut second, "nosuch", json!({})).await;
    assert_eq!(
        read_json(&mut second).await["code"],
        codes::REQUEST_CODE_NOT_FOUND
    );

    let _ = t.server.shutdown().request("test over");
}

// ─────────────────────────────────────────────────────────────────────────────
// Operational endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_health_reports_connections() {
    let t = boot_server().await;
    let mut ws = connect(&t.url).await;
    assert_eq!(auth(&mut ws, "joe").await["code"], codes::AUTH_SUCCESS);

    let body: Value = reqwest::get(format!("{}/health", t.http_base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["connected_users"], 1);

    let _ = t.server.shutdown().request("test over");
}

#[tokio::test]
async fn e2e_metrics_endpoint_serves_text() {
    let t = boot_server().await;

    let resp = reqwest::get(format!("{}/metrics", t.http_base)).await.unwrap();
    assert!(resp.status().is_success());

    let _ = t.server.shutdown().request("test over");
}
