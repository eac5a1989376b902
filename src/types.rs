//! Core types for the replicated store.

use serde::{Deserialize, Serialize};
use std::collections::{btree_map, hash_map, BTreeMap, HashMap};
use std::fmt;

/// The value carried by a delta entry for a removed key.
pub const TOMBSTONE: &[u8] = &[];

/// The complete key/value state held by a store.
///
/// A key that is present never maps to empty bytes: inserting an empty value
/// removes the key, so "unset" is always represented by absence.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Snapshot(HashMap<String, Vec<u8>>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set `key` to `value`, removing it when `value` is empty.
    ///
    /// Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Vec<u8>) -> Option<Vec<u8>> {
        let key = key.into();
        if value.is_empty() {
            self.0.remove(&key)
        } else {
            self.0.insert(key, value)
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<u8>> {
        self.0.iter()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.0.keys().collect();
        keys.sort();
        f.debug_struct("Snapshot")
            .field("len", &self.0.len())
            .field("keys", &keys)
            .finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<u8>)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, Vec<u8>)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

/// A set of key changes between two snapshots.
///
/// Entries iterate in key order. An entry holding [`TOMBSTONE`] means the
/// key was removed. Collecting entries where a key repeats keeps the last.
///
/// Serialized as a map of key to raw bytes.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta(#[serde(with = "byte_values")] BTreeMap<String, Vec<u8>>);

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as set to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.0.insert(key.into(), value);
    }

    /// Record `key` as removed.
    pub fn remove(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), TOMBSTONE.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// True when the delta records `key` as removed.
    pub fn is_tombstone(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<u8>> {
        self.0.iter()
    }

    /// Apply this delta to a snapshot: tombstones remove, values set.
    pub fn apply_to(&self, snapshot: &mut Snapshot) {
        for (key, value) in &self.0 {
            if value.is_empty() {
                snapshot.remove(key);
            } else {
                snapshot.insert(key.clone(), value.clone());
            }
        }
    }
}

impl fmt::Debug for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if value.is_empty() {
                map.entry(key, &"<tombstone>");
            } else {
                map.entry(key, &format_args!("{} bytes", value.len()));
            }
        }
        map.finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<u8>)> for Delta {
    fn from_iter<I: IntoIterator<Item = (K, Vec<u8>)>>(iter: I) -> Self {
        Delta(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for Delta {
    type Item = (String, Vec<u8>);
    type IntoIter = btree_map::IntoIter<String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Delta {
    type Item = (&'a String, &'a Vec<u8>);
    type IntoIter = btree_map::Iter<'a, String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Map values encoded as byte strings instead of integer sequences.
mod byte_values {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_bytes::{ByteBuf, Bytes};
    use std::collections::BTreeMap;

    pub fn serialize<S>(entries: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, Bytes::new(value))?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<String, ByteBuf>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|(key, value)| (key, value.into_vec()))
            .collect())
    }
}
