//! # wssb-events
//!
//! The lifecycle event bus. Plugins register [`EventHandler`]s for the five
//! [`EventKind`]s; the server fires them at the matching points of the
//! connection and server lifecycle.
//!
//! Two trigger modes exist, chosen by the call site, not the handler:
//!
//! - **Conditional** ([`EventBus::trigger_conditional`]): every handler
//!   runs and votes; the result is the AND over all verdicts. Used where
//!   plugins may veto (server start, auth attempts).
//! - **Notify** ([`EventBus::trigger_notify`]): every handler runs; any
//!   reply envelopes they produce are collected in registration order. Used
//!   where plugins may each respond (welcomes on authentication).

#![deny(unsafe_code)]

pub mod bus;
pub mod ctx;
pub mod handler;

pub use bus::EventBus;
pub use ctx::{EventCtx, EventDetail, EventKind};
pub use handler::{EventHandler, HookOutcome};
