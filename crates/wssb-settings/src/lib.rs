//! # wssb-settings
//!
//! Configuration tables for the WSSB server.
//!
//! All configuration lives in JSON tables under a single config directory:
//!
//! - `server.json`: bind address and port ([`ServerSettings`])
//! - `groups.json`: group name to CSV permission list
//! - `users.json`: user name to CSV permissions, CSV groups, network address
//! - `plugins/<name>.json`: one private table per plugin
//!
//! Each table is loaded through a [`TableStore`], which layers three sources
//! (in priority order):
//! 1. **Compiled defaults**, passed to the store at construction
//! 2. **Table file**, deep-merged over defaults
//! 3. **Environment variables**, `WSSB_*` overrides (server table only)
//!
//! Missing table files are generated on first load so that a fresh install
//! leaves an editable skeleton on disk.

#![deny(unsafe_code)]

pub mod errors;
pub mod identity;
pub mod server;
pub mod store;

pub use errors::{Result, SettingsError};
pub use identity::{
    GroupEntry, IdentityTables, UserEntry, groups_table, load_identity_tables,
    reload_identity_tables, users_table,
};
pub use server::{ServerSettings, load_server_settings};
pub use store::{TableStore, deep_merge, plugin_table};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
