//! Process-wide session state for the current browser user.
//!
//! DESIGN
//! ======
//! The session lives in a `tokio::sync::watch` channel. [`SessionStore`]
//! holds the only sender and is owned by the auth session monitor; every
//! other component reads through a [`SessionReader`], which hands out
//! immutable snapshots and wakes on change. Writers outside this crate do
//! not exist: the mutation methods are crate-private.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tokio::sync::watch;

// =============================================================================
// IDENTITY
// =============================================================================

/// Opaque account identifier issued by the authentication provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Privilege level of the current session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Guest,
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is not one of `guest`, `user`, `admin`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Self::Guest),
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Authentication and authorization state of the current user.
///
/// `loaded` turns true only once the first account snapshot for `user_id`
/// has been applied. `auth_resolved` turns true once the authentication
/// provider has reported its first state, which separates "still checking"
/// from "signed out".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<UserId>,
    pub role: Role,
    pub blocked: bool,
    pub loaded: bool,
    pub auth_resolved: bool,
}

impl Session {
    /// Session for a user whose account snapshot has not arrived yet.
    #[must_use]
    pub fn pending(user_id: UserId) -> Self {
        Self { user_id: Some(user_id), role: Role::Guest, blocked: false, loaded: false, auth_resolved: true }
    }

    /// Session after the provider reported no user.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { user_id: None, role: Role::Guest, blocked: false, loaded: false, auth_resolved: true }
    }

    /// Session after a blocked user was signed out. Keeps `blocked` so guards
    /// still send the user to the blocked page, until the next sign-in.
    #[must_use]
    pub fn evicted() -> Self {
        Self { user_id: None, role: Role::Guest, blocked: true, loaded: true, auth_resolved: true }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Single writer for the process-wide session.
#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Session>,
}

impl SessionStore {
    /// Create a store holding the initial, unresolved session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { tx }
    }

    /// Read-only view onto this store.
    #[must_use]
    pub fn reader(&self) -> SessionReader {
        SessionReader { rx: self.tx.subscribe() }
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Replace the whole session. Readers are only woken on an actual change.
    pub(crate) fn replace(&self, next: Session) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Apply an in-place edit. Readers are only woken on an actual change.
    pub(crate) fn update(&self, edit: impl FnOnce(&mut Session)) {
        self.tx.send_if_modified(|current| {
            let before = current.clone();
            edit(current);
            *current != before
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle onto the session: snapshots plus change notification.
#[derive(Clone, Debug)]
pub struct SessionReader {
    rx: watch::Receiver<Session>,
}

impl SessionReader {
    /// Current session value. Marks it as seen for [`SessionReader::changed`].
    #[must_use]
    pub fn snapshot(&mut self) -> Session {
        self.rx.borrow_and_update().clone()
    }

    /// Current session value without touching change tracking.
    #[must_use]
    pub fn peek(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Wait for the next session change. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
