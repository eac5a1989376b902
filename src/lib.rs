//! # keysync
//!
//! A small replicated key/value store for keeping shared state in step
//! across in-process observers and remote peers.
//!
//! ## Core Concepts
//!
//! - **Store**: the authoritative map of string keys to bytes
//! - **Deltas**: minimal change-sets, with tombstones for removed keys
//! - **Subscriptions**: independent, ordered streams of published deltas
//! - **Bindings**: typed, decode-cached views of single keys
//! - **Sessions**: forward local deltas to peers and merge theirs back in
//!   without echo
//!
//! Conflicts resolve last-writer-wins in the order writes reach the store;
//! there is no cross-peer tie-break.
//!
//! ## Example
//!
//! ```ignore
//! use keysync::{Binding, Store};
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::new());
//! let changes = store.subscribe();
//!
//! let count = Binding::new(Arc::clone(&store), "count", 0i64);
//! count.write(1);
//!
//! let delta = changes.recv()?;
//! assert!(count.is_changed_by(&delta));
//! assert_eq!(count.read(), 1);
//! ```

pub mod binding;
pub mod delta;
pub mod error;
pub mod session;
pub mod settings;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use binding::{Binding, Codec, JsonCodec, MsgPackCodec};
pub use delta::compute_delta;
pub use error::{Result, SyncError};
pub use session::{decode_delta, encode_delta, MemoryTransport, SessionConfig, SyncSession, Transport};
pub use settings::{Setting, SettingsConfig, SettingsStore};
pub use store::Store;
pub use subscriptions::{ChangeBus, SubscriptionHandle, SubscriptionId};
pub use types::{Delta, Snapshot, TOMBSTONE};
