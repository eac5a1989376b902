//! The replicated key/value store.

use crate::delta::compute_delta;
use crate::subscriptions::{ChangeBus, SubscriptionHandle, SubscriptionId};
use crate::types::{Delta, Snapshot};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Mutable state guarded by the store lock.
#[derive(Default)]
struct StoreState {
    snapshot: Snapshot,
    /// True while a remote merge is being applied.
    applying_remote_merge: bool,
}

impl StoreState {
    /// Write one entry and return the delta to publish, if any.
    ///
    /// Empty values remove the key. Nothing is returned while a remote merge
    /// is in progress: the merge publishes one aggregate delta at the end.
    fn write(&mut self, key: &str, value: Vec<u8>) -> Option<Delta> {
        if self.applying_remote_merge {
            self.snapshot.insert(key, value);
            return None;
        }

        // Only `key` can differ, so diffing its before/after entries yields
        // the same delta as diffing the whole map.
        let before = self.entry(key);
        self.snapshot.insert(key, value);
        let after = self.entry(key);
        let delta = compute_delta(&before, &after);

        if delta.is_empty() {
            None
        } else {
            Some(delta)
        }
    }

    /// Single-entry snapshot holding the current value of `key`, if any.
    fn entry(&self, key: &str) -> Snapshot {
        self.snapshot
            .get(key)
            .map(|value| (key, value.to_vec()))
            .into_iter()
            .collect()
    }
}

/// The authoritative in-memory key/value map.
///
/// Local writes are reduced to minimal deltas and published to every
/// subscriber. Remote deltas are merged as a single change and published to
/// every subscriber except the one they arrived through, so a transport
/// never sees its own input echoed back.
///
/// The snapshot lives only as long as the store. Concurrent local writes and
/// remote merges are serialized by the store lock and resolve
/// last-writer-wins in whatever order they acquire it.
pub struct Store {
    state: Mutex<StoreState>,
    bus: ChangeBus,
}

static SHARED: OnceLock<Arc<Store>> = OnceLock::new();

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            bus: ChangeBus::new(),
        }
    }

    /// The process-wide store, created on first use.
    ///
    /// Prefer constructing a store and passing it to collaborators. This
    /// instance lives until the process exits.
    pub fn shared() -> Arc<Store> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Store::new())))
    }

    // --- Reads ---

    /// Current bytes for `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().snapshot.get(key).map(<[u8]>::to_vec)
    }

    /// Whether the current bytes for `key` equal `bytes`, without copying.
    pub(crate) fn value_matches(&self, key: &str, bytes: &[u8]) -> bool {
        self.state.lock().snapshot.get(key) == Some(bytes)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().snapshot.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().snapshot.is_empty()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot.clone()
    }

    // --- Writes ---

    /// Set `key` to `value`. An empty value removes the key.
    ///
    /// Publishes the resulting delta unless nothing changed.
    pub fn set(&self, key: &str, value: Vec<u8>) {
        let mut state = self.state.lock();
        if let Some(delta) = state.write(key, value) {
            trace!(%key, "local write");
            self.bus.publish(delta);
        }
    }

    /// Remove `key`, publishing a tombstone if it was present.
    pub fn remove(&self, key: &str) {
        self.set(key, Vec::new());
    }

    /// Merge a remote delta, notifying every subscriber.
    pub fn merge(&self, incoming: Delta) {
        self.merge_inner(incoming, None);
    }

    /// Merge a remote delta that arrived through subscription `origin`.
    ///
    /// The resulting change is published to every subscriber except
    /// `origin`.
    pub fn merge_from(&self, origin: SubscriptionId, incoming: Delta) {
        self.merge_inner(incoming, Some(origin));
    }

    fn merge_inner(&self, incoming: Delta, origin: Option<SubscriptionId>) {
        let mut state = self.state.lock();
        let previous = state.snapshot.clone();

        state.applying_remote_merge = true;
        for (key, value) in incoming {
            state.write(&key, value);
        }
        state.applying_remote_merge = false;

        let delta = compute_delta(&previous, &state.snapshot);
        if delta.is_empty() {
            trace!("remote merge changed nothing");
            return;
        }

        debug!(keys = delta.len(), origin = ?origin, "applied remote merge");
        match origin {
            Some(origin) => self.bus.publish_except(delta, origin),
            None => self.bus.publish(delta),
        }
    }

    // --- Subscriptions ---

    /// Subscribe to the deltas this store publishes.
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    pub fn subscription_count(&self) -> usize {
        self.bus.subscription_count()
    }

    /// Terminate every subscription. Dropping the store does the same.
    pub fn shutdown(&self) {
        self.bus.shutdown();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::TryRecvError;

    fn delta(entries: &[(&str, &str)]) -> Delta {
        entries.iter().map(|(k, v)| (*k, v.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_set_and_get() {
        let store = Store::new();
        assert_eq!(store.get("a"), None);

        store.set("a", b"1".to_vec());
        assert_eq!(store.get("a"), Some(b"1".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_publishes_minimal_delta() {
        let store = Store::new();
        store.set("a", b"1".to_vec());

        let handle = store.subscribe();
        store.set("b", b"2".to_vec());

        let published = handle.try_recv().unwrap();
        assert_eq!(published, delta(&[("b", "2")]));
    }

    #[test]
    fn test_unchanged_set_is_not_published() {
        let store = Store::new();
        store.set("a", b"1".to_vec());
        let handle = store.subscribe();

        store.set("a", b"1".to_vec());

        assert!(matches!(handle.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_remove_publishes_tombstone() {
        let store = Store::new();
        store.set("a", b"1".to_vec());
        let handle = store.subscribe();

        store.remove("a");
        assert!(!store.contains_key("a"));
        assert!(handle.try_recv().unwrap().is_tombstone("a"));

        // Removing an absent key is not a change
        store.remove("a");
        assert!(matches!(handle.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_merge_publishes_once() {
        let store = Store::new();
        let handle = store.subscribe();

        store.merge(delta(&[("x", "1"), ("y", "2")]));

        assert_eq!(handle.try_recv().unwrap(), delta(&[("x", "1"), ("y", "2")]));
        assert!(matches!(handle.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_merge_from_skips_origin() {
        let store = Store::new();
        let transport = store.subscribe();
        let ui = store.subscribe();

        store.merge_from(transport.id, delta(&[("x", "1")]));

        assert_eq!(store.get("x"), Some(b"1".to_vec()));
        assert!(matches!(transport.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(ui.try_recv().unwrap(), delta(&[("x", "1")]));
    }

    #[test]
    fn test_merge_of_current_state_is_silent() {
        let store = Store::new();
        store.set("x", b"1".to_vec());
        let handle = store.subscribe();

        store.merge(delta(&[("x", "1"), ("gone", "")]));

        assert!(matches!(handle.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_local_write_after_merge_is_published() {
        let store = Store::new();
        let handle = store.subscribe();

        store.merge(delta(&[("x", "1")]));
        store.set("x", b"2".to_vec());

        assert_eq!(handle.try_recv().unwrap(), delta(&[("x", "1")]));
        assert_eq!(handle.try_recv().unwrap(), delta(&[("x", "2")]));
    }

    #[test]
    fn test_drop_terminates_subscriptions() {
        let store = Store::new();
        let handle = store.subscribe();

        drop(store);

        assert!(handle.recv().is_err());
    }

    #[test]
    fn test_shared_is_one_instance() {
        let a = Store::shared();
        let b = Store::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
