use std::sync::Mutex;

use serde_json::json;

use super::*;
use crate::memory::MemoryAccountStore;

fn collecting_sink() -> (DeliverySink, Arc<Mutex<Vec<Delivery>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: DeliverySink = Arc::new(move |d| sink_seen.lock().unwrap().push(d));
    (sink, seen)
}

/// Store that keeps firing callbacks after unsubscribe, like a late network
/// delivery racing the close.
#[derive(Default)]
struct LeakyStore {
    callbacks: Mutex<Vec<SnapshotCallback>>,
}

impl LeakyStore {
    fn fire(&self, snapshot: DocumentSnapshot) {
        for cb in self.callbacks.lock().unwrap().iter() {
            cb(Ok(snapshot.clone()));
        }
    }
}

#[async_trait::async_trait]
impl AccountStore for LeakyStore {
    fn watch_document(
        &self,
        _collection: &str,
        _id: &UserId,
        callback: SnapshotCallback,
    ) -> Result<Unsubscribe, WatchError> {
        self.callbacks.lock().unwrap().push(callback);
        Ok(Box::new(|| {}))
    }
}

// =============================================================================
// open
// =============================================================================

#[tokio::test]
async fn open_delivers_initial_snapshot() {
    let store = MemoryAccountStore::new();
    store.put("users", "u1", json!({"isBlocked": false, "role": "user"}));
    let (sink, seen) = collecting_sink();

    let sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 7, sink).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].generation, 7);
    assert_eq!(seen[0].result, Ok(DocumentSnapshot::found(json!({"isBlocked": false, "role": "user"}))));
    assert!(sub.is_open());
    assert_eq!(sub.user_id(), &UserId::from("u1"));
}

#[tokio::test]
async fn open_forwards_later_changes() {
    let store = MemoryAccountStore::new();
    let (sink, seen) = collecting_sink();
    let _sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap();

    store.put("users", "u1", json!({"isBlocked": true}));
    store.delete("users", "u1");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].result, Ok(DocumentSnapshot::missing()));
    assert_eq!(seen[1].result, Ok(DocumentSnapshot::found(json!({"isBlocked": true}))));
    assert_eq!(seen[2].result, Ok(DocumentSnapshot::missing()));
}

#[tokio::test]
async fn open_ignores_other_documents() {
    let store = MemoryAccountStore::new();
    let (sink, seen) = collecting_sink();
    let _sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap();

    store.put("users", "u2", json!({"isBlocked": true}));
    store.put("orders", "u1", json!({"isBlocked": true}));

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn open_surfaces_registration_failure() {
    let store = MemoryAccountStore::new();
    store.set_watch_failure(Some(WatchError::PermissionDenied { collection: "users".into(), id: "u1".into() }));
    let (sink, seen) = collecting_sink();

    let err = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap_err();

    assert!(matches!(err, WatchError::PermissionDenied { .. }));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(store.active_watches(), 0);
}

#[tokio::test]
async fn open_fetches_when_store_skips_initial_snapshot() {
    let store = MemoryAccountStore::without_initial_snapshot();
    store.put("users", "u1", json!({"isBlocked": true}));
    let (sink, seen) = collecting_sink();

    let _sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 3, sink).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].generation, 3);
    assert_eq!(seen[0].result, Ok(DocumentSnapshot::found(json!({"isBlocked": true}))));
}

// =============================================================================
// close
// =============================================================================

#[tokio::test]
async fn close_unregisters_the_watch() {
    let store = MemoryAccountStore::new();
    let (sink, seen) = collecting_sink();
    let mut sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap();
    assert_eq!(store.active_watches(), 1);

    sub.close();

    assert_eq!(store.active_watches(), 0);
    assert!(!sub.is_open());
    store.put("users", "u1", json!({"isBlocked": true}));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn close_twice_is_a_no_op() {
    let store = MemoryAccountStore::new();
    let (sink, _seen) = collecting_sink();
    let mut sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap();

    sub.close();
    sub.close();

    assert_eq!(store.active_watches(), 0);
    assert!(!sub.is_open());
}

#[tokio::test]
async fn drop_closes_the_watch() {
    let store = MemoryAccountStore::new();
    let (sink, _seen) = collecting_sink();
    let sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap();
    drop(sub);
    assert_eq!(store.active_watches(), 0);
}

#[tokio::test]
async fn late_callback_after_close_is_discarded() {
    let store = LeakyStore::default();
    let (sink, seen) = collecting_sink();
    let mut sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 1, sink).await.unwrap();

    store.fire(DocumentSnapshot::found(json!({"isBlocked": false})));
    sub.close();
    store.fire(DocumentSnapshot::found(json!({"isBlocked": true})));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].result, Ok(DocumentSnapshot::found(json!({"isBlocked": false}))));
}

#[tokio::test]
async fn accepts_only_own_generation_while_open() {
    let store = MemoryAccountStore::new();
    let (sink, _seen) = collecting_sink();
    let mut sub = SessionSubscription::open(&store, "users", UserId::from("u1"), 4, sink).await.unwrap();

    assert!(sub.accepts(4));
    assert!(!sub.accepts(3));
    sub.close();
    assert!(!sub.accepts(4));
}
