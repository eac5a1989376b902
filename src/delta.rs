//! Minimal change-set computation between snapshots.

use crate::types::{Delta, Snapshot, TOMBSTONE};

/// Compute the smallest delta that turns `previous` into `current`.
///
/// Keys that are new or whose bytes differ carry their current value, keys
/// that disappeared carry [`TOMBSTONE`], unchanged keys are left out.
/// Comparison is exact byte equality.
pub fn compute_delta(previous: &Snapshot, current: &Snapshot) -> Delta {
    let mut delta = Delta::new();

    for (key, value) in current.iter() {
        if previous.get(key) != Some(value.as_slice()) {
            delta.set(key.clone(), value.clone());
        }
    }

    for key in previous.keys() {
        if !current.contains_key(key) {
            delta.set(key, TOMBSTONE.to_vec());
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> Snapshot {
        entries.iter().map(|(k, v)| (*k, v.as_bytes().to_vec())).collect()
    }

    #[test]
    fn test_identical_snapshots_produce_empty_delta() {
        let a = snapshot(&[("x", "1"), ("y", "2")]);
        assert!(compute_delta(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_added_changed_and_removed_keys() {
        let previous = snapshot(&[("keep", "same"), ("change", "old"), ("drop", "gone")]);
        let current = snapshot(&[("keep", "same"), ("change", "new"), ("add", "fresh")]);

        let delta = compute_delta(&previous, &current);

        assert_eq!(delta.len(), 3);
        assert!(!delta.contains_key("keep"));
        assert_eq!(delta.get("change"), Some(&b"new"[..]));
        assert_eq!(delta.get("add"), Some(&b"fresh"[..]));
        assert!(delta.is_tombstone("drop"));
    }

    #[test]
    fn test_delta_reproduces_current() {
        let previous = snapshot(&[("a", "1"), ("b", "2")]);
        let current = snapshot(&[("b", "3"), ("c", "4")]);

        let mut rebuilt = previous.clone();
        compute_delta(&previous, &current).apply_to(&mut rebuilt);

        assert_eq!(rebuilt, current);
    }

    #[test]
    fn test_from_empty_and_to_empty() {
        let full = snapshot(&[("a", "1")]);
        let empty = Snapshot::new();

        let up = compute_delta(&empty, &full);
        assert_eq!(up.get("a"), Some(&b"1"[..]));

        let down = compute_delta(&full, &empty);
        assert!(down.is_tombstone("a"));
    }
}
