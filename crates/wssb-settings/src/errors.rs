//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or writing configuration tables.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write a table file on disk.
    #[error("failed to access config table: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in a table file.
    #[error("failed to parse config table JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A table had an unusable shape (e.g. top level is not an object).
    #[error("invalid config table: {0}")]
    InvalidTable(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
