//! Dot-segmented permission paths.
//!
//! A held permission satisfies a requested one iff its segments are a prefix
//! of the requested segments compared segment-wise. The comparison is never
//! done on raw characters: holding `a.bc` does not grant `a.b`.

use serde::{Deserialize, Serialize};

/// One permission path, e.g. `wssb.reload.cfg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Build from a raw token, trimming surrounding whitespace.
    ///
    /// Returns `None` for tokens that trim to nothing. CSV parsing yields
    /// empty tokens for trailing commas and they must be discarded, never
    /// stored as a permission that matches everything.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Parse a comma-separated permission list, discarding empty tokens.
    pub fn parse_csv(csv: &str) -> Vec<Self> {
        csv.split(',').filter_map(Self::new).collect()
    }

    /// The raw path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether holding `self` grants `requested`.
    ///
    /// True iff every segment of `self` equals the corresponding segment of
    /// `requested` and `self` has no segments beyond `requested`'s.
    pub fn allows(&self, requested: &Permission) -> bool {
        let mut held = self.0.split('.');
        let mut asked = requested.0.split('.');
        loop {
            match (held.next(), asked.next()) {
                (None, _) => return true,
                (Some(_), None) => return false,
                (Some(h), Some(a)) => {
                    if h != a {
                        return false;
                    }
                }
            }
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    /// Panic-free convenience for literals; empty input becomes a path that
    /// can never be produced by [`Permission::new`]. Prefer `new` for
    /// untrusted tokens.
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
