//! Request routing: the fixed core command table plus plugin fall-through.
//!
//! Every routed packet lands here. Pre-auth connections may only run `auth`;
//! authenticated ones are checked against the core table first (each entry
//! permission-gated), then against the plugin route tables. Handlers return
//! [`Reply`] values; applying them (delivery, kicks, shutdown) is the
//! session task's job.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, info, warn};

use wssb_core::{
    CloseOrder, Connection, Envelope, Permission, Reply, Request, Response, Status, Target, codes,
};
use wssb_events::{EventCtx, EventKind};
use wssb_settings::{load_server_settings, reload_identity_tables};

use crate::context::ServerContext;
use crate::metrics::{AUTH_FAILURES_TOTAL, AUTH_SUCCESSES_TOTAL, REQUESTS_TOTAL};

/// Permission guarding `reloadcfg`.
pub const PERM_RELOAD_CFG: &str = "wssb.reload.cfg";
/// Permission guarding `reloadusers`.
pub const PERM_RELOAD_USERS: &str = "wssb.reload.users";
/// Permission guarding `reloadplugins`.
pub const PERM_RELOAD_PLUGINS: &str = "wssb.reload.plugins";
/// Permission guarding the composite `reload`.
pub const PERM_RELOAD: &str = "wssb.reload";
/// Permission guarding `stop`.
pub const PERM_STOP: &str = "wssb.stop";

/// Route one request packet.
///
/// Returns the replies to apply, in order. Core commands produce exactly
/// one; a plugin-claimed code produces one per claiming plugin that chose
/// to answer.
pub async fn route(request: &Request, source: &Arc<Connection>, ctx: &ServerContext) -> Vec<Reply> {
    counter!(REQUESTS_TOTAL, "code" => request.code().to_owned()).increment(1);

    if !source.is_authenticated() {
        if request.code() == "auth" {
            return vec![view_auth(request, source, ctx).await];
        }
        debug!(conn = %source.id(), code = request.code(), "request before authentication");
        return vec![not_authenticated()];
    }

    if request.code() == "auth" {
        return vec![Reply::to_source(Response::error(
            codes::ALREADY_AUTHENTICATED,
            "You are already authenticated on the server.",
        ))];
    }

    // `bind_user` is one-way, so an authenticated connection always carries
    // a name; the guard keeps this panic-free regardless.
    let Some(user_name) = source.user() else {
        return vec![not_authenticated()];
    };

    let reply = match request.code() {
        "reloadcfg" => {
            if !authorized(ctx, &user_name, PERM_RELOAD_CFG) {
                return vec![access_denied(&user_name, request.code())];
            }
            view_reload_cfg(ctx)
        }
        "reloadusers" => {
            if !authorized(ctx, &user_name, PERM_RELOAD_USERS) {
                return vec![access_denied(&user_name, request.code())];
            }
            view_reload_users(ctx)
        }
        "reloadplugins" => {
            if !authorized(ctx, &user_name, PERM_RELOAD_PLUGINS) {
                return vec![access_denied(&user_name, request.code())];
            }
            view_reload_plugins(ctx).await
        }
        "reload" => {
            if !authorized(ctx, &user_name, PERM_RELOAD) {
                return vec![access_denied(&user_name, request.code())];
            }
            view_reload(ctx).await
        }
        "stop" => {
            if !authorized(ctx, &user_name, PERM_STOP) {
                return vec![access_denied(&user_name, request.code())];
            }
            view_stop(&user_name)
        }
        _ => return dispatch_plugins(request, &user_name, source, ctx).await,
    };
    vec![reply]
}

fn authorized(ctx: &ServerContext, user: &str, perm: &str) -> bool {
    ctx.registry.has_permission(user, &Permission::from(perm))
}

fn not_authenticated() -> Reply {
    Reply::to_source(Response::error(
        codes::USER_NOT_AUTHENTICATED,
        "You are not authenticated on the server.",
    ))
}

fn access_denied(user: &str, code: &str) -> Reply {
    warn!(user, code, "permission denied");
    Reply::to_source(Response::error(
        codes::ACCESS_DENIED,
        "You do not have permission to run this command.",
    ))
}

/// Authenticate the source connection as the named user.
///
/// The full transaction: syntax check, user lookup, the conditional
/// auth-attempt gate, socket registration, identity binding, then the
/// authenticated notification hooks whose envelopes become the welcome
/// sequence.
async fn view_auth(request: &Request, source: &Arc<Connection>, ctx: &ServerContext) -> Reply {
    let Some(user_name) = request.get_str("user_name") else {
        counter!(AUTH_FAILURES_TOTAL).increment(1);
        return Reply::to_source(Response::error(
            codes::AUTH_INVALID_SYNTAX,
            "Invalid packet syntax.",
        ));
    };

    if ctx.registry.find_user(user_name).is_none() {
        counter!(AUTH_FAILURES_TOTAL).increment(1);
        debug!(user = user_name, "auth for unknown user");
        return Reply::to_source(Response::error(
            codes::AUTH_USER_NOT_FOUND,
            "The user name specified does not exist on the server.",
        ));
    }

    let attempt = EventCtx::auth_attempt(user_name, request.clone(), Arc::clone(source));
    if !ctx
        .bus
        .trigger_conditional(EventKind::UserAuthAttempt, &attempt)
        .await
    {
        counter!(AUTH_FAILURES_TOTAL).increment(1);
        info!(user = user_name, conn = %source.id(), "auth attempt refused");
        return Reply::to_source(Response::error(
            codes::AUTH_FAILED,
            "The authentication attempt was refused by the server.",
        ));
    }

    // The user can vanish between the lookup above and this write if a
    // reload lands in between; registration is the authoritative step.
    if ctx
        .registry
        .register_socket(user_name, Arc::clone(source))
        .is_err()
    {
        counter!(AUTH_FAILURES_TOTAL).increment(1);
        return Reply::to_source(Response::error(
            codes::AUTH_USER_NOT_FOUND,
            "The user name specified does not exist on the server.",
        ));
    }
    source.bind_user(user_name);
    counter!(AUTH_SUCCESSES_TOTAL).increment(1);
    info!(user = user_name, conn = %source.id(), "user authenticated");

    let joined = EventCtx::authenticated(user_name, Arc::clone(source));
    let welcome = ctx.bus.trigger_notify(EventKind::UserAuthenticated, &joined).await;
    Reply::Auth {
        user: user_name.to_owned(),
        welcome,
    }
}

/// Re-read `server.json` and swap the live settings table.
///
/// The listener keeps its original bind; an address or port change takes
/// effect on the next start.
fn view_reload_cfg(ctx: &ServerContext) -> Reply {
    match load_server_settings(&ctx.config_dir) {
        Ok(settings) => {
            *ctx.settings.write() = settings;
            info!("server settings reloaded");
            Reply::to_source(Response::success(
                codes::RELOAD_CFG_OK,
                "Server configuration reloaded.",
            ))
        }
        Err(error) => {
            error!(%error, "server settings reload failed");
            Reply::to_source(Response::error(
                codes::RELOAD_CFG_FAILED,
                "The server configuration could not be reloaded.",
            ))
        }
    }
}

/// Re-read the identity tables and rebuild the registry.
///
/// Sockets whose user no longer exists come back as close orders on the
/// reply envelope; the session task kicks them after the response is sent.
fn view_reload_users(ctx: &ServerContext) -> Reply {
    match reload_identity_tables(&ctx.config_dir) {
        Ok(tables) => {
            let orphans = ctx.registry.reload(&tables);
            let mut envelope = Envelope::single(
                Response::success(codes::RELOAD_USERS_OK, "User and group tables reloaded."),
                Target::source(),
            );
            for conn in orphans {
                envelope.close.push(CloseOrder::new(
                    conn,
                    "Your user was removed from the server.",
                ));
            }
            Reply::Envelope(envelope)
        }
        Err(error) => {
            error!(%error, "identity table reload failed");
            Reply::to_source(Response::error(
                codes::RELOAD_USERS_FAILED,
                "The user and group tables could not be reloaded.",
            ))
        }
    }
}

/// Ask every plugin to re-read its config table.
async fn view_reload_plugins(ctx: &ServerContext) -> Reply {
    let failures = ctx.plugins.reload_all().await;
    if failures == 0 {
        Reply::to_source(Response::success(
            codes::RELOAD_PLUGINS_OK,
            "All plugin configurations reloaded.",
        ))
    } else {
        Reply::to_source(Response::error(
            codes::RELOAD_PLUGINS_FAILED,
            format!("{failures} plugin configuration(s) could not be reloaded."),
        ))
    }
}

/// Run all three reload steps and answer once.
///
/// Step payloads are discarded; their side effects (orphan close orders, a
/// shutdown flag) fold into the composite reply, and any failing step turns
/// the composite into an error.
async fn view_reload(ctx: &ServerContext) -> Reply {
    let steps = [
        view_reload_cfg(ctx),
        view_reload_users(ctx),
        view_reload_plugins(ctx).await,
    ];

    let mut failed = false;
    let mut composite = Envelope::empty();
    for step in steps {
        let Reply::Envelope(envelope) = step else {
            continue;
        };
        failed |= envelope
            .payload
            .iter()
            .any(|response| response.status() == Status::Error);
        composite.absorb_effects(&envelope);
    }

    composite.payload = vec![if failed {
        Response::error(codes::RELOAD_FAILED, "One or more reload steps failed.")
    } else {
        Response::success(codes::RELOAD_OK, "Full server reload complete.")
    }];
    Reply::Envelope(composite)
}

/// Broadcast the stopping notice and raise the shutdown flag.
fn view_stop(user: &str) -> Reply {
    info!(user, "stop command accepted");
    Reply::Envelope(
        Envelope::single(
            Response::info(codes::STOPPING, "The server is stopping."),
            Target::all(),
        )
        .with_shutdown(),
    )
}

/// Fall through to the plugin route tables.
async fn dispatch_plugins(
    request: &Request,
    user_name: &str,
    source: &Arc<Connection>,
    ctx: &ServerContext,
) -> Vec<Reply> {
    if !ctx.plugins.claims(request.code()) {
        debug!(user = user_name, code = request.code(), "unclaimed request code");
        return vec![Reply::to_source(Response::error(
            codes::REQUEST_CODE_NOT_FOUND,
            "The request code specified could not be found on the server.",
        ))];
    }

    // A reload can drop the user while this connection is still draining;
    // the socket is already on the orphan close list at that point.
    let Some(user) = ctx.registry.find_user(user_name) else {
        warn!(user = user_name, code = request.code(), "request from a removed user");
        return vec![not_authenticated()];
    };

    ctx.plugins.dispatch(request, &user, source).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
