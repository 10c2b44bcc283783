//! Registry error types.

use thiserror::Error;

/// Errors that can occur when mutating the identity registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The named user does not exist in the registry.
    #[error("unknown user: {0}")]
    UnknownUser(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
