//! Typed, cached access to one settings key.

use super::storage::SettingsStore;
use crate::error::Result;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A typed setting stored as a JSON string.
///
/// The first successful read or any write fills the cache; later reads are
/// served from it without touching storage.
pub struct Setting<T> {
    settings: Arc<SettingsStore>,
    key: String,
    default: T,
    cache: Mutex<Option<T>>,
}

impl<T> Setting<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn new(settings: Arc<SettingsStore>, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "setting key must not be empty");

        Self {
            settings,
            key,
            default,
            cache: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cached value, else the decoded stored value, else the default.
    pub fn get(&self) -> T {
        let mut cache = self.cache.lock();
        if let Some(value) = cache.as_ref() {
            return value.clone();
        }

        let Some(json) = self.settings.get(&self.key) else {
            return self.default.clone();
        };

        match serde_json::from_str::<T>(&json) {
            Ok(value) => {
                *cache = Some(value.clone());
                value
            }
            Err(e) => {
                debug!(key = %self.key, error = %e, "stored setting is malformed, using default");
                self.default.clone()
            }
        }
    }

    /// Cache `value` and persist it.
    ///
    /// A value that cannot be encoded is still cached but the stored value
    /// is left as it was.
    pub fn set(&self, value: T) -> Result<()> {
        let encoded = serde_json::to_string(&value);
        *self.cache.lock() = Some(value);

        match encoded {
            Ok(json) => self.settings.set(&self.key, json),
            Err(e) => {
                debug!(key = %self.key, error = %e, "setting not encodable, not persisted");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsConfig;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Window {
        width: u32,
        height: u32,
    }

    fn open(dir: &TempDir) -> Arc<SettingsStore> {
        Arc::new(
            SettingsStore::open(SettingsConfig {
                path: dir.path().to_path_buf(),
                create_if_missing: true,
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_default_when_unset() {
        let dir = TempDir::new().unwrap();
        let setting = Setting::new(open(&dir), "zoom", 1.5f64);
        assert_eq!(setting.get(), 1.5);
    }

    #[test]
    fn test_set_persists_json() {
        let dir = TempDir::new().unwrap();
        let settings = open(&dir);
        let setting = Setting::new(Arc::clone(&settings), "window", Window { width: 0, height: 0 });

        setting
            .set(Window {
                width: 800,
                height: 600,
            })
            .unwrap();

        assert_eq!(setting.get().width, 800);
        assert_eq!(
            settings.get("window").as_deref(),
            Some(r#"{"width":800,"height":600}"#)
        );
    }

    #[test]
    fn test_reads_value_written_by_earlier_process() {
        let dir = TempDir::new().unwrap();
        {
            let settings = open(&dir);
            Setting::new(settings, "count", 0u32).set(3).unwrap();
        }

        let setting = Setting::new(open(&dir), "count", 0u32);
        assert_eq!(setting.get(), 3);
    }

    #[test]
    fn test_malformed_stored_value_uses_default() {
        let dir = TempDir::new().unwrap();
        let settings = open(&dir);
        settings.set("count", "three").unwrap();

        let setting = Setting::new(Arc::clone(&settings), "count", 7u32);
        assert_eq!(setting.get(), 7);

        settings.set("count", "4").unwrap();
        assert_eq!(setting.get(), 4);
    }
}
