//! Per-device settings persisted to disk.
//!
//! Settings are plain string values keyed by name, stored in a single file
//! under a locked directory. They are local to one process and never
//! replicated. [`Setting`] layers a typed, cached value over one key.

mod setting;
mod storage;

pub use setting::Setting;
pub use storage::{SettingsConfig, SettingsStore};
