//! Identity tables (`groups.json`, `users.json`).
//!
//! Both files are flat JSON objects keyed by name. Permission and group
//! memberships are stored as CSV strings so the files stay terse and
//! hand-editable; splitting and trimming happens when the registry is
//! rebuilt, not here.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::{Result, SettingsError};
use crate::store::TableStore;

/// One group entry as stored in `groups.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupEntry {
    /// CSV list of permission paths granted to the group.
    pub permissions: String,
}

/// One user entry as stored in `users.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserEntry {
    /// CSV list of permission paths granted to the user directly.
    pub permissions: String,
    /// CSV list of group names the user belongs to.
    pub groups: String,
    /// Registered network address of the user.
    pub address: String,
}

/// Parsed identity tables, entries in table order.
#[derive(Clone, Debug, Default)]
pub struct IdentityTables {
    /// Group name → entry.
    pub groups: Vec<(String, GroupEntry)>,
    /// User name → entry.
    pub users: Vec<(String, UserEntry)>,
}

/// The store backing `groups.json` under `config_dir`.
#[must_use]
pub fn groups_table(config_dir: &Path) -> TableStore {
    TableStore::new(
        config_dir.join("groups.json"),
        Value::Object(serde_json::Map::new()),
    )
}

/// The store backing `users.json` under `config_dir`.
#[must_use]
pub fn users_table(config_dir: &Path) -> TableStore {
    TableStore::new(
        config_dir.join("users.json"),
        Value::Object(serde_json::Map::new()),
    )
}

/// Load both identity tables, generating missing files as empty tables.
pub fn load_identity_tables(config_dir: &Path) -> Result<IdentityTables> {
    Ok(IdentityTables {
        groups: parse_entries(groups_table(config_dir).load()?, "groups.json")?,
        users: parse_entries(users_table(config_dir).load()?, "users.json")?,
    })
}

/// Re-read both identity tables from disk without touching the files.
pub fn reload_identity_tables(config_dir: &Path) -> Result<IdentityTables> {
    Ok(IdentityTables {
        groups: parse_entries(groups_table(config_dir).reload()?, "groups.json")?,
        users: parse_entries(users_table(config_dir).reload()?, "users.json")?,
    })
}

/// Parse a name-keyed table into typed entries.
///
/// Malformed entries are logged and skipped so one bad record cannot take
/// the whole table (and every user in it) offline.
fn parse_entries<T: DeserializeOwned>(table: Value, file: &str) -> Result<Vec<(String, T)>> {
    let Value::Object(map) = table else {
        return Err(SettingsError::InvalidTable(format!(
            "{file} must contain a JSON object keyed by name"
        )));
    };

    let mut entries = Vec::with_capacity(map.len());
    for (name, raw) in map {
        match serde_json::from_value::<T>(raw) {
            Ok(entry) => entries.push((name, entry)),
            Err(err) => warn!(%file, entry = %name, %err, "skipping malformed table entry"),
        }
    }
    Ok(entries)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
