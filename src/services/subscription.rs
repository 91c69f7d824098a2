//! Realtime watch on one account record.
//!
//! DESIGN
//! ======
//! A `SessionSubscription` wraps the store's unsubscribe function together
//! with a generation number and a shared `closed` flag. Every delivery is
//! forwarded tagged with the generation, so the receiver can drop deliveries
//! that belong to an older handle. The flag stops the callback from
//! forwarding anything once `close` has returned, even if the store still
//! fires it.
//!
//! Stores that do not push the current state on registration get an
//! explicit fetch right after the watch is in place. The fetched snapshot is
//! forwarded only when no live delivery beat it, so it can never overwrite a
//! newer change.

#[cfg(test)]
#[path = "subscription_test.rs"]
mod subscription_test;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::providers::{AccountStore, DocumentSnapshot, SnapshotCallback, Unsubscribe, WatchError};
use crate::session::UserId;

/// One delivery from the account store, tagged with its handle generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub generation: u64,
    pub result: Result<DocumentSnapshot, WatchError>,
}

/// Receiver of deliveries. Must not block: it runs inside store callbacks.
pub type DeliverySink = Arc<dyn Fn(Delivery) + Send + Sync>;

pub struct SessionSubscription {
    user_id: UserId,
    generation: u64,
    closed: Arc<AtomicBool>,
    unsubscribe: Option<Unsubscribe>,
}

impl SessionSubscription {
    /// Register a watch on `collection/user_id` and forward every delivery,
    /// starting with the current state, to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the store's [`WatchError`] when the watch cannot be
    /// registered, or when the explicit initial fetch fails.
    pub async fn open(
        store: &dyn AccountStore,
        collection: &str,
        user_id: UserId,
        generation: u64,
        sink: DeliverySink,
    ) -> Result<Self, WatchError> {
        let closed = Arc::new(AtomicBool::new(false));
        let delivered = Arc::new(AtomicBool::new(false));

        let callback: SnapshotCallback = {
            let closed = Arc::clone(&closed);
            let delivered = Arc::clone(&delivered);
            let sink = Arc::clone(&sink);
            Box::new(move |result| {
                if closed.load(Ordering::Acquire) {
                    return;
                }
                delivered.store(true, Ordering::Release);
                sink(Delivery { generation, result });
            })
        };

        let unsubscribe = store.watch_document(collection, &user_id, callback)?;
        let mut subscription = Self { user_id, generation, closed, unsubscribe: Some(unsubscribe) };
        debug!(user_id = %subscription.user_id, generation, "account watch registered");

        if !store.delivers_initial_snapshot() {
            match store.fetch_document(collection, &subscription.user_id).await {
                Ok(snapshot) => {
                    if subscription.is_open() && !delivered.swap(true, Ordering::AcqRel) {
                        sink(Delivery { generation, result: Ok(snapshot) });
                    }
                }
                Err(e) => {
                    subscription.close();
                    return Err(e);
                }
            }
        }

        Ok(subscription)
    }

    /// Unregister the watch. Safe to call any number of times.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
            debug!(user_id = %self.user_id, generation = self.generation, "account watch closed");
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a delivery tagged `generation` belongs to this open handle.
    #[must_use]
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_open() && self.generation == generation
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SessionSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSubscription")
            .field("user_id", &self.user_id)
            .field("generation", &self.generation)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
