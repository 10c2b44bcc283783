//! Delivery target descriptions.
//!
//! A target says which live connections a response should reach. It is an
//! immutable value built per response; resolution into sockets happens in the
//! server against a registry snapshot.

/// Delivery mode tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// Every connected user's sockets.
    All,
    /// Exactly the originating socket.
    Source,
    /// The named users' sockets, then the named groups' members' sockets.
    Address,
}

/// A logical delivery target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    mode: TargetMode,
    users: Vec<String>,
    groups: Vec<String>,
}

impl Default for Target {
    /// Replies default to answering their source.
    fn default() -> Self {
        Self::source()
    }
}

impl Target {
    /// Target every connected user.
    #[must_use]
    pub fn all() -> Self {
        Self {
            mode: TargetMode::All,
            users: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Target the request's source socket.
    #[must_use]
    pub fn source() -> Self {
        Self {
            mode: TargetMode::Source,
            users: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Target one named user.
    #[must_use]
    pub fn user(name: &str) -> Self {
        Self::address(vec![name.to_owned()], Vec::new())
    }

    /// Target every connected member of one named group.
    #[must_use]
    pub fn group(name: &str) -> Self {
        Self::address(Vec::new(), vec![name.to_owned()])
    }

    /// Target a set of named users and groups, in the given order.
    #[must_use]
    pub fn address(users: Vec<String>, groups: Vec<String>) -> Self {
        Self {
            mode: TargetMode::Address,
            users,
            groups,
        }
    }

    /// The delivery mode.
    pub fn mode(&self) -> TargetMode {
        self.mode
    }

    /// Named users (`Address` mode only; empty otherwise).
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Named groups (`Address` mode only; empty otherwise).
    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}
