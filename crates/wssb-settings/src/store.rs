//! File-backed JSON configuration tables.
//!
//! A [`TableStore`] owns one table file plus its compiled defaults and
//! reproduces the layering used across the server:
//!
//! 1. Start from the compiled defaults passed at construction
//! 2. If the table file exists, deep-merge its values over the defaults
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// One JSON table file plus its compiled defaults.
///
/// The store never caches table content; every [`TableStore::load`] or
/// [`TableStore::reload`] re-reads the file, which is what lets the reload
/// commands pick up edits made while the server is running.
#[derive(Clone, Debug)]
pub struct TableStore {
    path: PathBuf,
    defaults: Value,
}

impl TableStore {
    /// Create a store for the table at `path` with the given defaults.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, defaults: Value) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file if absent and fill in any missing keys.
    ///
    /// A missing file is written out with the compiled defaults so a fresh
    /// install leaves an editable skeleton on disk. An existing file keeps
    /// every value it already has; only keys it lacks are added from the
    /// defaults. Returns `true` if the file was newly created.
    pub fn ensure(&self) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if !self.path.exists() {
            info!(path = ?self.path, "generating default config table");
            write_pretty(&self.path, &self.defaults)?;
            return Ok(true);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let existing: Value = serde_json::from_str(&content)?;
        let completed = deep_merge(self.defaults.clone(), existing);
        write_pretty(&self.path, &completed)?;
        Ok(false)
    }

    /// Load the table, generating the file first if it is missing.
    pub fn load(&self) -> Result<Value> {
        let _ = self.ensure()?;
        self.read_merged()
    }

    /// Re-read the table from disk without touching the file.
    ///
    /// If the file was deleted since the last load, falls back to the
    /// compiled defaults rather than failing the running server.
    pub fn reload(&self) -> Result<Value> {
        if !self.path.exists() {
            warn!(path = ?self.path, "config table missing on reload, using defaults");
            return Ok(self.defaults.clone());
        }
        self.read_merged()
    }

    /// Delete the backing file and regenerate it from the defaults.
    pub fn reset(&self) -> Result<Value> {
        if self.path.exists() {
            info!(path = ?self.path, "resetting config table");
            std::fs::remove_file(&self.path)?;
        }
        self.load()
    }

    fn read_merged(&self) -> Result<Value> {
        debug!(path = ?self.path, "loading config table");
        let content = std::fs::read_to_string(&self.path)?;
        let file: Value = serde_json::from_str(&content)?;
        Ok(deep_merge(self.defaults.clone(), file))
    }
}

/// Build the store for a plugin's private table (`plugins/<name>.json`).
#[must_use]
pub fn plugin_table(config_dir: &Path, plugin: &str, defaults: Value) -> TableStore {
    let path = config_dir.join("plugins").join(format!("{plugin}.json"));
    TableStore::new(path, defaults)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
#[must_use]
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn write_pretty(path: &Path, table: &Value) -> Result<()> {
    let mut body = serde_json::to_string_pretty(table)?;
    body.push('\n');
    std::fs::write(path, body)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;

    fn make_store(dir: &tempfile::TempDir) -> TableStore {
        TableStore::new(
            dir.path().join("table.json"),
            serde_json::json!({"alpha": 1, "beta": {"gamma": "x"}}),
        )
    }

    // ── ensure ──────────────────────────────────────────────────────

    #[test]
    fn ensure_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        assert!(store.ensure().unwrap());
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(written["alpha"], 1);
        assert_eq!(written["beta"]["gamma"], "x");
    }

    #[test]
    fn ensure_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(
            dir.path().join("plugins").join("deep.json"),
            serde_json::json!({}),
        );
        assert!(store.ensure().unwrap());
        assert!(store.path().exists());
    }

    #[test]
    fn ensure_fills_missing_keys_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        std::fs::write(store.path(), r#"{"alpha": 99}"#).unwrap();

        assert!(!store.ensure().unwrap());
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(written["alpha"], 99, "existing values survive");
        assert_eq!(written["beta"]["gamma"], "x", "missing keys filled in");
    }

    // ── load / reload ───────────────────────────────────────────────

    #[test]
    fn load_missing_file_yields_defaults_and_writes_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        let table = store.load().unwrap();
        assert_eq!(table["alpha"], 1);
        assert!(store.path().exists());
    }

    #[test]
    fn load_merges_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        std::fs::write(store.path(), r#"{"beta": {"gamma": "edited"}}"#).unwrap();

        let table = store.load().unwrap();
        assert_eq!(table["alpha"], 1);
        assert_eq!(table["beta"]["gamma"], "edited");
    }

    #[test]
    fn reload_sees_edits_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        let _ = store.load().unwrap();

        std::fs::write(store.path(), r#"{"alpha": 42}"#).unwrap();
        let table = store.reload().unwrap();
        assert_eq!(table["alpha"], 42);

        // reload must not restore the pruned keys on disk
        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(on_disk.get("beta").is_none());
    }

    #[test]
    fn reload_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        let table = store.reload().unwrap();
        assert_eq!(table["alpha"], 1);
        assert!(!store.path().exists());
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        std::fs::write(store.path(), "not valid json").unwrap();

        let result = store.load();
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    // ── reset ───────────────────────────────────────────────────────

    #[test]
    fn reset_discards_edits() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);
        std::fs::write(store.path(), r#"{"alpha": 1000}"#).unwrap();

        let table = store.reset().unwrap();
        assert_eq!(table["alpha"], 1);
    }

    #[test]
    fn reset_without_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(&dir);

        let table = store.reset().unwrap();
        assert_eq!(table["alpha"], 1);
        assert!(store.path().exists());
    }

    // ── plugin_table ────────────────────────────────────────────────

    #[test]
    fn plugin_table_path_is_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let store = plugin_table(dir.path(), "sessions", serde_json::json!({}));
        assert_eq!(
            store.path(),
            dir.path().join("plugins").join("sessions.json")
        );
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": 10});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 10);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8765, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_new_keys_added() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"b": 2});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }
}
