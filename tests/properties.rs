//! Property-based tests for delta computation and store publication.
//!
//! - Minimality: a delta holds exactly the keys whose values differ
//! - Reconstruction: applying `compute_delta(a, b)` to `a` yields `b`
//! - Publication: replaying published deltas rebuilds the store

use keysync::{compute_delta, Delta, Snapshot, Store};
use proptest::prelude::*;
use std::collections::HashMap;

fn snapshot_strategy() -> impl Strategy<Value = HashMap<String, Vec<u8>>> {
    prop::collection::hash_map("[a-e]{1,2}", prop::collection::vec(any::<u8>(), 1..4), 0..12)
}

fn to_snapshot(map: &HashMap<String, Vec<u8>>) -> Snapshot {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// A write is a key and an optional value (None removes).
fn writes_strategy() -> impl Strategy<Value = Vec<(String, Option<Vec<u8>>)>> {
    prop::collection::vec(
        (
            "[a-d]",
            prop::option::of(prop::collection::vec(any::<u8>(), 1..3)),
        ),
        0..40,
    )
}

proptest! {
    #[test]
    fn delta_is_minimal(a in snapshot_strategy(), b in snapshot_strategy()) {
        let delta = compute_delta(&to_snapshot(&a), &to_snapshot(&b));

        let mut expected: Vec<&String> = a.keys().chain(b.keys())
            .filter(|k| a.get(*k) != b.get(*k))
            .collect();
        expected.sort();
        expected.dedup();

        let keys: Vec<&str> = delta.keys().collect();
        prop_assert_eq!(keys, expected.iter().map(|k| k.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn delta_reconstructs_target(a in snapshot_strategy(), b in snapshot_strategy()) {
        let previous = to_snapshot(&a);
        let current = to_snapshot(&b);

        let mut rebuilt = previous.clone();
        compute_delta(&previous, &current).apply_to(&mut rebuilt);

        prop_assert_eq!(rebuilt, current);
    }

    #[test]
    fn delta_of_identical_snapshots_is_empty(a in snapshot_strategy()) {
        let snapshot = to_snapshot(&a);
        prop_assert!(compute_delta(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn published_deltas_replay_to_store_state(writes in writes_strategy()) {
        let store = Store::new();
        let handle = store.subscribe();

        for (key, value) in &writes {
            match value {
                Some(bytes) => store.set(key, bytes.clone()),
                None => store.remove(key),
            }
        }

        let mut replica = Snapshot::new();
        while let Ok(delta) = handle.try_recv() {
            prop_assert!(!delta.is_empty());
            delta.apply_to(&mut replica);
        }

        prop_assert_eq!(replica, store.snapshot());
    }

    #[test]
    fn merging_published_deltas_converges(writes in writes_strategy()) {
        let source = Store::new();
        let mirror = Store::new();
        let handle = source.subscribe();

        for (key, value) in &writes {
            source.set(key, value.clone().unwrap_or_default());
        }

        let deltas: Vec<Delta> = std::iter::from_fn(|| handle.try_recv().ok()).collect();
        for delta in deltas {
            mirror.merge(delta);
        }

        prop_assert_eq!(mirror.snapshot(), source.snapshot());
    }
}
