//! The shared identity registry.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use wssb_core::{Connection, Permission};
use wssb_settings::IdentityTables;

use crate::errors::{RegistryError, Result};
use crate::types::{Group, User};

/// Registry of users and groups, shared across all connection tasks.
///
/// Reads vastly outnumber writes: every request checks permissions and every
/// fan-out snapshots the user list, while writes happen only on auth,
/// disconnect, and `reloadusers`. All methods take `&self`; the lock is an
/// internal detail so callers can hold the registry in a plain [`Arc`].
#[derive(Default)]
pub struct UserRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    groups: Vec<Group>,
    users: Vec<User>,
}

impl UserRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from freshly loaded identity tables.
    ///
    /// Groups are rebuilt first so the new users resolve against the new
    /// group set. Each new user inherits the live socket list of the prior
    /// user with the same name, so a reload never silently disconnects an
    /// authenticated client. Sockets belonging to users that no longer
    /// exist are returned for the caller to close.
    pub fn reload(&self, tables: &IdentityTables) -> Vec<Arc<Connection>> {
        let groups: Vec<Group> = tables
            .groups
            .iter()
            .map(|(name, entry)| Group::from_entry(name, entry))
            .collect();
        let mut users: Vec<User> = tables
            .users
            .iter()
            .map(|(name, entry)| User::from_entry(name, entry))
            .collect();

        let mut inner = self.inner.write();
        let mut orphans = Vec::new();
        for old in inner.users.drain(..) {
            if old.sockets.is_empty() {
                continue;
            }
            match users.iter_mut().find(|u| u.name() == old.name()) {
                Some(new) => new.sockets = old.sockets,
                None => orphans.extend(old.sockets),
            }
        }

        info!(
            users = users.len(),
            groups = groups.len(),
            orphaned_sockets = orphans.len(),
            "identity registry rebuilt"
        );
        inner.groups = groups;
        inner.users = users;
        orphans
    }

    /// Look up a user by exact name.
    #[must_use]
    pub fn find_user(&self, name: &str) -> Option<User> {
        self.inner
            .read()
            .users
            .iter()
            .find(|u| u.name() == name)
            .cloned()
    }

    /// Look up a group by exact name.
    #[must_use]
    pub fn find_group(&self, name: &str) -> Option<Group> {
        self.inner
            .read()
            .groups
            .iter()
            .find(|g| g.name() == name)
            .cloned()
    }

    /// True if the named user may perform an action guarded by `requested`.
    ///
    /// The user's own permissions and the permissions of every group the
    /// user belongs to are consulted; any one satisfying grant is enough.
    /// Unknown users and unknown group references grant nothing.
    #[must_use]
    pub fn has_permission(&self, user: &str, requested: &Permission) -> bool {
        let inner = self.inner.read();
        let Some(user) = inner.users.iter().find(|u| u.name() == user) else {
            return false;
        };
        if user.holds(requested) {
            return true;
        }
        user.groups().iter().any(|name| {
            inner
                .groups
                .iter()
                .find(|g| g.name() == name)
                .is_some_and(|g| g.grants(requested))
        })
    }

    /// Attach a live socket to the named user.
    ///
    /// Attaching a socket that is already present is a no-op, so a retried
    /// registration cannot double-deliver fan-outs.
    pub fn register_socket(&self, name: &str, conn: Arc<Connection>) -> Result<()> {
        let mut inner = self.inner.write();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.name() == name)
            .ok_or_else(|| RegistryError::UnknownUser(name.to_string()))?;
        if user.sockets.iter().any(|s| s.id() == conn.id()) {
            debug!(user = name, conn = %conn.id(), "socket already registered");
            return Ok(());
        }
        debug!(user = name, conn = %conn.id(), "socket registered");
        user.sockets.push(conn);
        Ok(())
    }

    /// Detach a socket from the named user.
    ///
    /// Detaching a socket that is not attached (or from an unknown user) is
    /// logged and ignored; disconnect cleanup must never fail. Returns
    /// whether a socket was actually removed.
    pub fn unregister_socket(&self, name: &str, conn: &Connection) -> bool {
        let mut inner = self.inner.write();
        let Some(user) = inner.users.iter_mut().find(|u| u.name() == name) else {
            warn!(user = name, conn = %conn.id(), "unregister for unknown user");
            return false;
        };
        let before = user.sockets.len();
        user.sockets.retain(|s| s.id() != conn.id());
        if user.sockets.len() == before {
            warn!(user = name, conn = %conn.id(), "unregister for socket not attached");
            return false;
        }
        debug!(user = name, conn = %conn.id(), "socket unregistered");
        true
    }

    /// Users with at least one attached socket, in registry order.
    #[must_use]
    pub fn connected_users(&self) -> Vec<User> {
        self.inner
            .read()
            .users
            .iter()
            .filter(|u| u.is_connected())
            .cloned()
            .collect()
    }

    /// Point-in-time copy of every user, in registry order.
    ///
    /// Fan-out delivery spans suspension points, so it must work against a
    /// copy rather than the live registry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<User> {
        self.inner.read().users.clone()
    }

    /// Number of registered users.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    /// Number of registered groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.inner.read().groups.len()
    }
}

impl std::fmt::Debug for UserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("UserRegistry")
            .field("users", &inner.users.len())
            .field("groups", &inner.groups.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
