//! # wssb-core
//!
//! Foundation types for the WSSB message-routing server.
//!
//! This crate provides the shared vocabulary the other WSSB crates depend on:
//!
//! - **Packets**: frame parsing plus [`Request`](packet::Request) and
//!   [`Response`](packet::Response) wire shapes
//! - **Codes**: the `WSSB_*` protocol code constants
//! - **Permissions**: dot-segmented [`Permission`](perm::Permission) paths
//!   with segment-wise prefix matching
//! - **Targets**: [`Target`](target::Target) delivery descriptions
//! - **Replies**: the [`Reply`](reply::Reply) tagged union handlers return
//! - **Connections**: the live socket handle shared by registry and router

#![deny(unsafe_code)]

pub mod codes;
pub mod conn;
pub mod errors;
pub mod packet;
pub mod perm;
pub mod reply;
pub mod target;

pub use conn::{Connection, ConnectionId};
pub use errors::ProtocolError;
pub use packet::{Request, Response, Status, format_frame, packet_type, parse_frame};
pub use perm::Permission;
pub use reply::{CloseOrder, Envelope, Reply};
pub use target::{Target, TargetMode};
