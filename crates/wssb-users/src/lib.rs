//! # wssb-users
//!
//! The identity registry: users, groups, and the permission checks the
//! router gates every request on.
//!
//! The registry is built from the identity tables in `wssb-settings` and
//! rebuilt wholesale by the `reloadusers` command. Live socket handles are
//! attached to users as connections authenticate and must survive a reload,
//! so the rebuild carries each user's socket list onto the replacement entry
//! with the same name and hands back the sockets of users that no longer
//! exist.

#![deny(unsafe_code)]

pub mod errors;
pub mod registry;
pub mod types;

pub use errors::{RegistryError, Result};
pub use registry::UserRegistry;
pub use types::{Group, User};
