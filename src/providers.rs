//! Contracts for the external collaborators the session core consumes.
//!
//! SYSTEM CONTEXT
//! ==============
//! The authentication provider, the realtime account store, the notification
//! surface, and the navigation surface all live outside this crate. The
//! monitor and guards only see these traits; `crate::memory` implements them
//! in-process for tests and the replay binary.
//!
//! Callbacks only enqueue work. They may fire from inside a registration call
//! (the initial delivery), so implementations of the monitor side must never
//! block or re-enter the provider from a callback.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::session::UserId;

/// Cancels a registration. Called at most once.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Authentication state reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthChange {
    UserPresent(UserId),
    UserAbsent,
}

pub type AuthCallback = Box<dyn Fn(AuthChange) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignOutError {
    #[error("sign-out request failed: {0}")]
    Request(String),
    #[error("authentication provider unreachable")]
    Unreachable,
}

#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register for auth changes. The callback fires once immediately with
    /// the current state and again on every change.
    fn on_auth_state_changed(&self, callback: AuthCallback) -> Unsubscribe;

    /// Clear the session server-side. Resolves when that is done.
    ///
    /// # Errors
    ///
    /// Returns [`SignOutError`] when the provider rejects or cannot be reached.
    async fn sign_out(&self) -> Result<(), SignOutError>;
}

// =============================================================================
// ACCOUNT STORE
// =============================================================================

/// One observed state of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    pub exists: bool,
    pub data: Value,
}

impl DocumentSnapshot {
    #[must_use]
    pub fn found(data: Value) -> Self {
        Self { exists: true, data }
    }

    #[must_use]
    pub fn missing() -> Self {
        Self { exists: false, data: Value::Null }
    }
}

/// Fields of an account record the session core cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub role: Option<String>,
}

impl AccountRecord {
    /// Decode the record out of a snapshot's `data`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Malformed`] when `data` is not an object or a
    /// field has the wrong type.
    pub fn from_data(data: &Value) -> Result<Self, WatchError> {
        serde_json::from_value(data.clone()).map_err(|e| WatchError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    #[error("permission denied watching {collection}/{id}")]
    PermissionDenied { collection: String, id: String },
    #[error("account store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed account record: {0}")]
    Malformed(String),
    #[error("account store does not support one-shot fetches")]
    FetchUnsupported,
}

pub type SnapshotCallback = Box<dyn Fn(Result<DocumentSnapshot, WatchError>) + Send + Sync>;

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Watch one document. Delivers the current snapshot and every change.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] when the watch cannot be registered.
    fn watch_document(&self, collection: &str, id: &UserId, callback: SnapshotCallback)
    -> Result<Unsubscribe, WatchError>;

    /// Whether `watch_document` delivers the current state right after
    /// registering. When it does not, subscribers fetch it explicitly.
    fn delivers_initial_snapshot(&self) -> bool {
        true
    }

    /// One-shot read of a document.
    ///
    /// # Errors
    ///
    /// [`WatchError::FetchUnsupported`] unless the store overrides this.
    async fn fetch_document(&self, _collection: &str, _id: &UserId) -> Result<DocumentSnapshot, WatchError> {
        Err(WatchError::FetchUnsupported)
    }
}

// =============================================================================
// UI SURFACES
// =============================================================================

pub trait Notifier: Send + Sync {
    /// Fire-and-forget error toast.
    fn notify_error(&self, message: &str, duration: Duration);
}

pub trait Navigator: Send + Sync {
    /// Replace the current client location.
    fn navigate_to(&self, path: &str);
}

// =============================================================================
// BUNDLE
// =============================================================================

/// Every external collaborator the session core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthProvider>,
    pub accounts: Arc<dyn AccountStore>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}
