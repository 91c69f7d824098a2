//! In-process implementations of the external collaborators.
//!
//! DESIGN
//! ======
//! Each fake keeps its state behind a `Mutex` and invokes callbacks only
//! after releasing the lock, so a callback that re-enters the fake (or
//! enqueues work that does) cannot deadlock. They back the crate's tests and
//! the replay binary; counters such as [`MemoryAccountStore::active_watches`]
//! exist so tests can check resource invariants from the outside.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use crate::providers::{
    AccountStore, AuthCallback, AuthChange, AuthProvider, DocumentSnapshot, Navigator, Notifier, SignOutError,
    SnapshotCallback, Unsubscribe, WatchError,
};
use crate::session::UserId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// AUTH PROVIDER
// =============================================================================

type SharedAuthCallback = Arc<dyn Fn(AuthChange) + Send + Sync>;

#[derive(Default)]
struct AuthInner {
    current: Option<UserId>,
    listeners: HashMap<u64, SharedAuthCallback>,
    next_listener: u64,
    sign_out_calls: usize,
    sign_out_failures: VecDeque<SignOutError>,
}

/// Auth provider holding at most one signed-in user.
#[derive(Clone, Default)]
pub struct MemoryAuth {
    inner: Arc<Mutex<AuthInner>>,
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `id` in and notify every listener.
    pub fn sign_in(&self, id: impl Into<UserId>) {
        self.set_current(Some(id.into()));
    }

    /// Drop the current user, as if the token expired or another tab logged out.
    pub fn sign_out_locally(&self) {
        self.set_current(None);
    }

    /// Make the next `count` sign-out requests fail with `error`.
    pub fn fail_next_sign_outs(&self, count: usize, error: SignOutError) {
        let mut inner = lock(&self.inner);
        inner.sign_out_failures.extend(std::iter::repeat_n(error, count));
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        lock(&self.inner).current.clone()
    }

    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        lock(&self.inner).sign_out_calls
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    fn set_current(&self, user: Option<UserId>) {
        let listeners: Vec<SharedAuthCallback> = {
            let mut inner = lock(&self.inner);
            inner.current = user.clone();
            inner.listeners.values().cloned().collect()
        };
        let change = user.map_or(AuthChange::UserAbsent, AuthChange::UserPresent);
        for listener in listeners {
            listener(change.clone());
        }
    }
}

#[async_trait::async_trait]
impl AuthProvider for MemoryAuth {
    fn on_auth_state_changed(&self, callback: AuthCallback) -> Unsubscribe {
        let callback: SharedAuthCallback = Arc::from(callback);
        let (id, current) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_listener;
            inner.next_listener += 1;
            inner.listeners.insert(id, callback.clone());
            (id, inner.current.clone())
        };
        callback(current.map_or(AuthChange::UserAbsent, AuthChange::UserPresent));

        let inner = Arc::clone(&self.inner);
        Box::new(move || {
            lock(&inner).listeners.remove(&id);
        })
    }

    async fn sign_out(&self) -> Result<(), SignOutError> {
        {
            let mut inner = lock(&self.inner);
            inner.sign_out_calls += 1;
            if let Some(err) = inner.sign_out_failures.pop_front() {
                return Err(err);
            }
        }
        self.set_current(None);
        Ok(())
    }
}

// =============================================================================
// ACCOUNT STORE
// =============================================================================

type SharedSnapshotCallback = Arc<dyn Fn(Result<DocumentSnapshot, WatchError>) + Send + Sync>;
type DocKey = (String, UserId);

struct Watcher {
    key: DocKey,
    callback: SharedSnapshotCallback,
}

#[derive(Default)]
struct StoreInner {
    documents: HashMap<DocKey, Value>,
    watchers: HashMap<u64, Watcher>,
    next_watcher: u64,
    watch_attempts: usize,
    watch_failure: Option<WatchError>,
}

impl StoreInner {
    fn snapshot(&self, key: &DocKey) -> DocumentSnapshot {
        self.documents
            .get(key)
            .map_or_else(DocumentSnapshot::missing, |data| DocumentSnapshot::found(data.clone()))
    }

    fn watchers_of(&self, key: &DocKey) -> Vec<SharedSnapshotCallback> {
        self.watchers
            .values()
            .filter(|w| &w.key == key)
            .map(|w| w.callback.clone())
            .collect()
    }
}

/// Realtime document store keyed by collection and id.
#[derive(Clone)]
pub struct MemoryAccountStore {
    inner: Arc<Mutex<StoreInner>>,
    initial_snapshot: bool,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    /// Store that delivers the current snapshot on registration.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::default(), initial_snapshot: true }
    }

    /// Store whose watches only report changes; subscribers must fetch.
    #[must_use]
    pub fn without_initial_snapshot() -> Self {
        Self { inner: Arc::default(), initial_snapshot: false }
    }

    /// Write a document and deliver it to its watchers.
    pub fn put(&self, collection: &str, id: impl Into<UserId>, data: Value) {
        let key = (collection.to_owned(), id.into());
        let (watchers, snapshot) = {
            let mut inner = lock(&self.inner);
            inner.documents.insert(key.clone(), data);
            (inner.watchers_of(&key), inner.snapshot(&key))
        };
        for watcher in watchers {
            watcher(Ok(snapshot.clone()));
        }
    }

    /// Delete a document and deliver the `exists = false` snapshot.
    pub fn delete(&self, collection: &str, id: impl Into<UserId>) {
        let key = (collection.to_owned(), id.into());
        let watchers = {
            let mut inner = lock(&self.inner);
            inner.documents.remove(&key);
            inner.watchers_of(&key)
        };
        for watcher in watchers {
            watcher(Ok(DocumentSnapshot::missing()));
        }
    }

    /// Push a delivery error to the watchers of one document.
    pub fn fail_delivery(&self, collection: &str, id: impl Into<UserId>, error: WatchError) {
        let key = (collection.to_owned(), id.into());
        let watchers = lock(&self.inner).watchers_of(&key);
        for watcher in watchers {
            watcher(Err(error.clone()));
        }
    }

    /// Make every later `watch_document` call fail with `error` (`None` heals).
    pub fn set_watch_failure(&self, error: Option<WatchError>) {
        lock(&self.inner).watch_failure = error;
    }

    #[must_use]
    pub fn active_watches(&self) -> usize {
        lock(&self.inner).watchers.len()
    }

    #[must_use]
    pub fn watched_ids(&self) -> Vec<UserId> {
        lock(&self.inner).watchers.values().map(|w| w.key.1.clone()).collect()
    }

    #[must_use]
    pub fn watch_attempts(&self) -> usize {
        lock(&self.inner).watch_attempts
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryAccountStore {
    fn watch_document(
        &self,
        collection: &str,
        id: &UserId,
        callback: SnapshotCallback,
    ) -> Result<Unsubscribe, WatchError> {
        let callback: SharedSnapshotCallback = Arc::from(callback);
        let key = (collection.to_owned(), id.clone());
        let (watcher_id, initial) = {
            let mut inner = lock(&self.inner);
            inner.watch_attempts += 1;
            if let Some(err) = inner.watch_failure.clone() {
                return Err(err);
            }
            let watcher_id = inner.next_watcher;
            inner.next_watcher += 1;
            let initial = self.initial_snapshot.then(|| inner.snapshot(&key));
            inner.watchers.insert(watcher_id, Watcher { key, callback: callback.clone() });
            (watcher_id, initial)
        };
        if let Some(snapshot) = initial {
            callback(Ok(snapshot));
        }

        let inner = Arc::clone(&self.inner);
        Ok(Box::new(move || {
            lock(&inner).watchers.remove(&watcher_id);
        }))
    }

    fn delivers_initial_snapshot(&self) -> bool {
        self.initial_snapshot
    }

    async fn fetch_document(&self, collection: &str, id: &UserId) -> Result<DocumentSnapshot, WatchError> {
        let inner = lock(&self.inner);
        match inner.watch_failure.clone() {
            Some(err) => Err(err),
            None => Ok(inner.snapshot(&(collection.to_owned(), id.clone()))),
        }
    }
}

// =============================================================================
// UI SURFACES
// =============================================================================

/// One user-visible effect, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEffect {
    Notice { message: String, duration: Duration },
    Navigate(String),
}

/// Notification + navigation surface that records what it was asked to do.
#[derive(Clone, Default)]
pub struct MemoryUi {
    effects: Arc<Mutex<Vec<UiEffect>>>,
}

impl MemoryUi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn effects(&self) -> Vec<UiEffect> {
        lock(&self.effects).clone()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        lock(&self.effects)
            .iter()
            .filter_map(|e| match e {
                UiEffect::Notice { message, .. } => Some(message.clone()),
                UiEffect::Navigate(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.effects)
            .iter()
            .filter_map(|e| match e {
                UiEffect::Navigate(path) => Some(path.clone()),
                UiEffect::Notice { .. } => None,
            })
            .collect()
    }

    /// Drain recorded effects.
    #[must_use]
    pub fn take(&self) -> Vec<UiEffect> {
        std::mem::take(&mut *lock(&self.effects))
    }
}

impl Notifier for MemoryUi {
    fn notify_error(&self, message: &str, duration: Duration) {
        lock(&self.effects).push(UiEffect::Notice { message: message.to_owned(), duration });
    }
}

impl Navigator for MemoryUi {
    fn navigate_to(&self, path: &str) {
        lock(&self.effects).push(UiEffect::Navigate(path.to_owned()));
    }
}
