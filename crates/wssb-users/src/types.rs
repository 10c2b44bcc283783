//! User and group entities.

use std::sync::Arc;

use wssb_core::{Connection, Permission};
use wssb_settings::{GroupEntry, UserEntry};

/// Split a CSV field into trimmed, non-empty names.
fn parse_csv_names(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// A permission group.
#[derive(Clone, Debug)]
pub struct Group {
    name: String,
    permissions: Vec<Permission>,
}

impl Group {
    /// Build a group from its identity-table entry.
    #[must_use]
    pub fn from_entry(name: &str, entry: &GroupEntry) -> Self {
        Self {
            name: name.to_string(),
            permissions: Permission::parse_csv(&entry.permissions),
        }
    }

    /// Group name (unique key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permissions granted to every member of the group.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// True if any of the group's permissions satisfies `requested`.
    #[must_use]
    pub fn grants(&self, requested: &Permission) -> bool {
        self.permissions.iter().any(|held| held.allows(requested))
    }
}

/// A registered user.
///
/// Users are value objects rebuilt wholesale on registry reload; the socket
/// list is the one piece of live state, carried across reloads by name.
#[derive(Clone, Debug)]
pub struct User {
    name: String,
    address: String,
    groups: Vec<String>,
    permissions: Vec<Permission>,
    pub(crate) sockets: Vec<Arc<Connection>>,
}

impl User {
    /// Build a user from its identity-table entry, with no sockets attached.
    #[must_use]
    pub fn from_entry(name: &str, entry: &UserEntry) -> Self {
        Self {
            name: name.to_string(),
            address: entry.address.clone(),
            groups: parse_csv_names(&entry.groups),
            permissions: Permission::parse_csv(&entry.permissions),
            sockets: Vec::new(),
        }
    }

    /// User name (unique key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered network address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Names of the groups the user belongs to.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Permissions granted to the user directly.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Live sockets attached to the user, oldest first.
    #[must_use]
    pub fn sockets(&self) -> &[Arc<Connection>] {
        &self.sockets
    }

    /// True if the user has at least one attached socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.sockets.is_empty()
    }

    /// True if the user belongs to the named group.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// True if any of the user's own permissions satisfies `requested`.
    ///
    /// Group permissions are not consulted here; that union lives in
    /// [`crate::UserRegistry::has_permission`].
    #[must_use]
    pub fn holds(&self, requested: &Permission) -> bool {
        self.permissions.iter().any(|held| held.allows(requested))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
