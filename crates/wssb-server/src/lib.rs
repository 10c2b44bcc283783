//! # wssb-server
//!
//! The WSSB server proper: one Axum WebSocket endpoint, one task per live
//! connection, a fixed core command table with plugin fall-through, and a
//! target resolver that fans responses out to the sockets a [`Target`]
//! describes.
//!
//! The flow for one inbound frame: the connection task parses it into
//! packets, the router resolves each `request` packet to a core command or a
//! plugin route, handlers return [`Reply`] values, and the connection task
//! applies them by delivering payloads through the resolver and executing
//! any close orders or shutdown flag they carry.
//!
//! [`Target`]: wssb_core::Target
//! [`Reply`]: wssb_core::Reply

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod health;
pub mod metrics;
pub mod resolve;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::ServerConfig;
pub use context::ServerContext;
pub use server::WssbServer;
pub use shutdown::ShutdownCoordinator;
