//! Target resolution: expanding a logical [`Target`] into live sockets.
//!
//! Resolution works over a point-in-time registry snapshot, so a fan-out
//! that spans suspension points cannot observe a concurrent reload or
//! disconnect halfway through. Delivery is sequential and best-effort: a
//! full or closed outbound channel drops the frame and counts it against
//! the connection.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use wssb_core::{Connection, ConnectionId, Envelope, Target, TargetMode, format_frame};
use wssb_users::{User, UserRegistry};

/// Expand a target into an ordered, deduplicated list of live sockets.
///
/// ALL yields every connected user's sockets in registry order. SOURCE
/// yields exactly the originating socket. ADDRESS yields the named users'
/// sockets first (in the given order), then the sockets of every user in
/// any named group (in group order); a socket already collected is skipped.
pub fn resolve(
    target: &Target,
    source: &Arc<Connection>,
    registry: &UserRegistry,
) -> Vec<Arc<Connection>> {
    match target.mode() {
        TargetMode::Source => vec![source.clone()],
        TargetMode::All => {
            let snapshot = registry.snapshot();
            let mut sink = SocketSink::new();
            for user in &snapshot {
                sink.extend(user);
            }
            sink.into_sockets()
        }
        TargetMode::Address => {
            let snapshot = registry.snapshot();
            let mut sink = SocketSink::new();
            for name in target.users() {
                match snapshot.iter().find(|user| user.name() == name) {
                    Some(user) => sink.extend(user),
                    None => warn!(user = %name, "target names an unknown user"),
                }
            }
            for group in target.groups() {
                for user in snapshot.iter().filter(|user| user.in_group(group)) {
                    sink.extend(user);
                }
            }
            sink.into_sockets()
        }
    }
}

/// Serialize an envelope's payload once and queue it on every resolved
/// socket. Returns how many sockets accepted the frame.
///
/// An envelope with an empty payload carries only side effects and is not
/// delivered anywhere.
pub fn deliver(envelope: &Envelope, source: &Arc<Connection>, registry: &UserRegistry) -> usize {
    if envelope.payload.is_empty() {
        return 0;
    }
    let frame = Arc::new(format_frame(&envelope.payload));
    let targets = resolve(&envelope.target, source, registry);
    let mut delivered = 0;
    for conn in &targets {
        if conn.send(frame.clone()) {
            delivered += 1;
        } else {
            warn!(conn = %conn.id(), "failed to queue frame for delivery");
        }
    }
    debug!(
        resolved = targets.len(),
        delivered, "fan-out delivery complete"
    );
    delivered
}

/// Order-preserving socket collector with identity dedup.
struct SocketSink {
    seen: HashSet<ConnectionId>,
    sockets: Vec<Arc<Connection>>,
}

impl SocketSink {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            sockets: Vec::new(),
        }
    }

    fn extend(&mut self, user: &User) {
        for socket in user.sockets() {
            if self.seen.insert(socket.id().clone()) {
                self.sockets.push(socket.clone());
            }
        }
    }

    fn into_sockets(self) -> Vec<Arc<Connection>> {
        self.sockets
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
