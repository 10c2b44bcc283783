//! WebSocket session lifecycle, from upgrade through disconnect.
//!
//! One task runs per accepted socket. It owns the read half; a spawned
//! forwarder owns the write half and drains the connection's outbound
//! channel, so fan-out delivery from other sessions never blocks on this
//! peer. The session ends when the peer closes, the connection is kicked,
//! or the server shuts down; the cleanup block at the bottom runs on every
//! one of those paths, a handler fault included.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitStream;
use futures::{FutureExt, SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

use wssb_core::{
    CloseOrder, Connection, Envelope, Reply, Request, Response, codes, packet_type, parse_frame,
};
use wssb_events::{EventCtx, EventKind};

use crate::context::ServerContext;
use crate::metrics::{
    BAD_PACKETS_TOTAL, KICKS_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_CONNECTION_DURATION_SECONDS, WS_DISCONNECTIONS_TOTAL,
};
use crate::resolve;
use crate::router;

/// How long the forwarder gets to flush queued frames after the session ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Run one client session to completion.
#[instrument(skip_all, fields(conn))]
pub async fn run_ws_session(ws: WebSocket, ctx: Arc<ServerContext>) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.config.send_queue);
    let conn = Arc::new(Connection::new(send_tx));
    tracing::Span::current().record("conn", conn.id().as_str());

    let connection_start = std::time::Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder: exits on channel close, a kick, or server
    // shutdown. On the token paths it drains whatever is already queued
    // before sending the Close frame, so kick notices and the stopping
    // broadcast still reach the peer.
    let outbound_conn = Arc::clone(&conn);
    let shutdown_token = ctx.shutdown.token();
    let mut outbound = tokio::spawn(async move {
        let close_token = outbound_conn.close_token();
        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
                () = close_token.cancelled() => break,
                () = shutdown_token.cancelled() => break,
            }
        }
        while let Ok(text) = send_rx.try_recv() {
            if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    // A fault in a handler must not skip the cleanup below; catch it at the
    // task boundary and fall through.
    let session = AssertUnwindSafe(read_loop(&mut ws_rx, &conn, &ctx)).catch_unwind();
    if let Err(panic) = session.await {
        let fault = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown fault".to_owned());
        error!(%fault, "session handler fault, closing connection");
    }

    // Cleanup. Unregister before the disconnect hooks fire so their fan-outs
    // no longer see this socket.
    if let Some(user) = conn.user() {
        if ctx.registry.unregister_socket(&user, &conn) {
            let left = EventCtx::disconnect(&user, Arc::clone(&conn));
            let farewell = ctx.bus.trigger_notify(EventKind::UserDisconnect, &left).await;
            for envelope in &farewell {
                let _ = resolve::deliver(envelope, &conn, &ctx.registry);
            }
        }
    }
    conn.close();
    info!(user = ?conn.user(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
    if conn.drop_count() > 0 {
        warn!(dropped = conn.drop_count(), "frames dropped on full outbound queue");
    }
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut outbound).await.is_err() {
        warn!("forwarder did not flush in time, aborting");
        outbound.abort();
    }
}

/// Pump inbound frames until the peer leaves, the connection is kicked, or
/// the server shuts down.
async fn read_loop(
    ws_rx: &mut SplitStream<WebSocket>,
    conn: &Arc<Connection>,
    ctx: &Arc<ServerContext>,
) {
    let close_token = conn.close_token();
    let shutdown_token = ctx.shutdown.token();
    loop {
        tokio::select! {
            message = ws_rx.next() => {
                let Some(Ok(message)) = message else { break };
                match message {
                    Message::Text(text) => process_text(text.as_str(), conn, ctx).await,
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => process_text(text, conn, ctx).await,
                        Err(_) => bad_packet(conn, "non-UTF8 binary frame"),
                    },
                    Message::Close(_) => {
                        debug!(conn = %conn.id(), "client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            () = close_token.cancelled() => {
                debug!(conn = %conn.id(), "connection ordered closed");
                break;
            }
            () = shutdown_token.cancelled() => {
                debug!(conn = %conn.id(), "session ending for shutdown");
                break;
            }
        }
    }
}

/// Parse one frame body and route its request packets in order.
///
/// Each packet's replies are fully applied before the next packet starts,
/// so a client batching requests in one frame sees responses in request
/// order.
async fn process_text(body: &str, conn: &Arc<Connection>, ctx: &Arc<ServerContext>) {
    let packets = match parse_frame(body) {
        Ok(packets) => packets,
        Err(error) => {
            debug!(conn = %conn.id(), %error, "undecodable frame");
            bad_packet(conn, "frame failed to parse");
            return;
        }
    };

    for packet in packets {
        if packet_type(&packet) != Some("request") {
            trace!(conn = %conn.id(), kind = ?packet_type(&packet), "dropping non-request packet");
            continue;
        }
        let Some(request) = Request::from_value(&packet) else {
            bad_packet(conn, "request packet without a code");
            continue;
        };
        for reply in router::route(&request, conn, ctx).await {
            apply_reply(reply, conn, ctx).await;
        }
    }
}

fn bad_packet(conn: &Arc<Connection>, why: &str) {
    counter!(BAD_PACKETS_TOTAL).increment(1);
    debug!(conn = %conn.id(), why, "bad packet");
    let _ = conn.send_response(&Response::error(
        codes::BAD_PACKET,
        "The packet received could not be parsed.",
    ));
}

/// Apply one routed reply.
async fn apply_reply(reply: Reply, conn: &Arc<Connection>, ctx: &Arc<ServerContext>) {
    match reply {
        Reply::None => {}
        Reply::Auth { user, welcome } => {
            debug!(conn = %conn.id(), %user, welcomes = welcome.len(), "auth reply");
            let _ = conn.send_response(&Response::success(
                codes::AUTH_SUCCESS,
                "You are now logged in!",
            ));
            for envelope in welcome {
                apply_envelope(envelope, conn, ctx).await;
            }
        }
        Reply::Envelope(envelope) => apply_envelope(envelope, conn, ctx).await,
    }
}

/// Deliver an envelope's payload, then its side effects: forced closes
/// first, the shutdown flag last.
async fn apply_envelope(envelope: Envelope, conn: &Arc<Connection>, ctx: &Arc<ServerContext>) {
    let _ = resolve::deliver(&envelope, conn, &ctx.registry);

    for order in &envelope.close {
        kick(order);
    }

    // First resolution wins; later shutdown-flagged envelopes are no-ops.
    if envelope.shutdown && ctx.shutdown.request("stop command") {
        let stopping = EventCtx::server_stop();
        let farewell = ctx.bus.trigger_notify(EventKind::ServerStop, &stopping).await;
        for envelope in &farewell {
            let _ = resolve::deliver(envelope, conn, &ctx.registry);
        }
    }
}

/// Queue the kick notice and order the socket closed.
///
/// The notice goes into the outbound queue before the close token flips,
/// so the forwarder's drain pass still delivers it.
fn kick(order: &CloseOrder) {
    let _ = order
        .connection
        .send_response(&Response::warning(codes::KICKED, order.reason.clone()));
    order.connection.close();
    counter!(KICKS_TOTAL).increment(1);
    info!(conn = %order.connection.id(), reason = %order.reason, "connection kicked");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
