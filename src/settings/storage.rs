//! File-backed settings storage.

use crate::error::{Result, SyncError};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for the settings file.
const SETTINGS_MAGIC: &[u8; 4] = b"KSS\0";

/// Current settings format version.
const SETTINGS_VERSION: u8 = 1;

/// Magic, version, checksum and payload length.
const HEADER_LEN: u64 = 4 + 1 + 4 + 8;

const SETTINGS_FILE: &str = "settings.bin";
const LOCK_FILE: &str = "LOCK";

/// Settings configuration.
#[derive(Clone, Debug)]
pub struct SettingsConfig {
    /// Directory holding the settings file.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./settings"),
            create_if_missing: true,
        }
    }
}

/// String settings persisted on every write.
///
/// The directory is locked for the lifetime of the value; a second open
/// fails with [`SyncError::Locked`].
pub struct SettingsStore {
    /// Path of the settings file.
    file_path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    entries: RwLock<HashMap<String, String>>,

    /// Serializes read-modify-persist cycles.
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Open the settings directory, loading any existing values.
    pub fn open(config: SettingsConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(SyncError::NotInitialized(config.path.display().to_string()));
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;

        let file_path = config.path.join(SETTINGS_FILE);
        let entries = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            HashMap::new()
        };

        debug!(path = %file_path.display(), count = entries.len(), "opened settings");

        Ok(Self {
            file_path,
            _lock_file: lock_file,
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Set and persist a value. On failure the previous values are kept.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    /// Remove and persist. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        if !self.contains_key(key) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _lock = self.write_lock.lock();

        let mut next = self.entries.read().clone();
        f(&mut next);
        Self::save(&self.file_path, &next)?;

        *self.entries.write() = next;
        Ok(())
    }

    /// Write the settings file atomically (temp file + rename).
    fn save(path: &Path, entries: &HashMap<String, String>) -> Result<()> {
        let encoded = rmp_serde::to_vec(entries)?;
        let checksum = crc32fast::hash(&encoded);

        let tmp_path = path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_all(SETTINGS_MAGIC)?;
        file.write_all(&[SETTINGS_VERSION])?;
        file.write_all(&checksum.to_le_bytes())?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.sync_all()?;

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn load_from_file(path: &Path) -> Result<HashMap<String, String>> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != SETTINGS_MAGIC {
            return Err(SyncError::InvalidFormat("Invalid settings magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != SETTINGS_VERSION {
            return Err(SyncError::InvalidFormat(format!(
                "Unsupported settings version: {}",
                version[0]
            )));
        }

        let mut checksum = [0u8; 4];
        file.read_exact(&mut checksum)?;
        let expected = u32::from_le_bytes(checksum);

        let mut len = [0u8; 8];
        file.read_exact(&mut len)?;
        let len = u64::from_le_bytes(len);

        // The checksum does not cover the header, so bound the length by the file
        let remaining = file.metadata()?.len().saturating_sub(HEADER_LEN);
        if len > remaining {
            return Err(SyncError::InvalidFormat(format!(
                "Settings payload length {} exceeds the {} bytes in the file",
                len, remaining
            )));
        }

        let mut encoded = vec![0u8; len as usize];
        file.read_exact(&mut encoded)?;

        let got = crc32fast::hash(&encoded);
        if got != expected {
            return Err(SyncError::ChecksumMismatch { expected, got });
        }

        Ok(rmp_serde::from_slice(&encoded)?)
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| SyncError::Locked)?;

        Ok(lock_file)
    }
}
