//! Per-key typed binding with a decode cache.

use super::codec::{Codec, JsonCodec};
use crate::store::Store;
use crate::types::Delta;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Last bytes seen for the key and the value they decoded to.
struct CacheEntry<T> {
    bytes: Vec<u8>,
    value: T,
}

/// Typed view of one store key.
///
/// Failed decodes fall back to the default value and are retried on every
/// read; failed encodes leave the store untouched. Neither is reported, so a
/// consumer cannot tell them apart from an absent key.
pub struct Binding<T, C = JsonCodec> {
    store: Arc<Store>,
    key: String,
    default: T,
    codec: C,
    cache: Mutex<Option<CacheEntry<T>>>,
}

impl<T> Binding<T, JsonCodec>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Bind `key` using the JSON codec.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn new(store: Arc<Store>, key: impl Into<String>, default: T) -> Self {
        Self::with_codec(store, key, default, JsonCodec)
    }
}

impl<T, C> Binding<T, C>
where
    T: Clone,
    C: Codec<T>,
{
    /// Bind `key` using a custom codec.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn with_codec(store: Arc<Store>, key: impl Into<String>, default: T, codec: C) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "binding key must not be empty");

        Self {
            store,
            key,
            default,
            codec,
            cache: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Whether `delta` touches this binding's key.
    pub fn is_changed_by(&self, delta: &Delta) -> bool {
        delta.contains_key(&self.key)
    }

    /// Current value, decoding only when the stored bytes changed.
    pub fn read(&self) -> T {
        let mut cache = self.cache.lock();

        if let Some(entry) = cache.as_ref() {
            if self.store.value_matches(&self.key, &entry.bytes) {
                return entry.value.clone();
            }
        }

        let Some(bytes) = self.store.get(&self.key) else {
            return self.default.clone();
        };

        match self.codec.decode(&bytes) {
            Ok(value) => {
                *cache = Some(CacheEntry {
                    bytes,
                    value: value.clone(),
                });
                value
            }
            Err(e) => {
                debug!(key = %self.key, error = %e, "decode failed, using default");
                self.default.clone()
            }
        }
    }

    /// Encode `value` and store it under the key.
    pub fn write(&self, value: T) {
        let bytes = match self.codec.encode(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(key = %self.key, error = %e, "encode failed, write dropped");
                return;
            }
        };

        let mut cache = self.cache.lock();
        self.store.set(&self.key, bytes.clone());
        *cache = Some(CacheEntry { bytes, value });
    }
}

impl<T, C> fmt::Debug for Binding<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("cached", &self.cache.lock().is_some())
            .finish()
    }
}
