//! Server network settings (`server.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;
use crate::store::TableStore;

/// Server bind settings.
///
/// Field names match the keys of `server.json` so the file stays
/// hand-editable with the documented names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the listener binds to.
    pub server_address: String,
    /// Port the listener binds to.
    pub server_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            server_address: "localhost".to_string(),
            server_port: 8765,
        }
    }
}

impl ServerSettings {
    /// The store backing `server.json` under `config_dir`.
    #[must_use]
    pub fn table(config_dir: &Path) -> TableStore {
        let defaults = serde_json::to_value(Self::default())
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        TableStore::new(config_dir.join("server.json"), defaults)
    }
}

/// Load server settings from `<config_dir>/server.json` with env overrides.
///
/// Missing file is generated with defaults. `WSSB_SERVER_ADDRESS` and
/// `WSSB_SERVER_PORT` override the file (highest priority); invalid values
/// are logged and ignored.
pub fn load_server_settings(config_dir: &Path) -> Result<ServerSettings> {
    let table = ServerSettings::table(config_dir).load()?;
    let mut settings: ServerSettings = serde_json::from_value(table)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `WSSB_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut ServerSettings) {
    if let Some(v) = read_env_string("WSSB_SERVER_ADDRESS") {
        settings.server_address = v;
    }
    if let Some(v) = read_env_u16("WSSB_SERVER_PORT", 1, 65535) {
        settings.server_port = v;
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid port env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
