//! Transport adapter connecting a store to remote peers.
//!
//! A [`SyncSession`] subscribes to a store and forwards every delta it
//! observes to a [`Transport`] on a background thread. Deltas arriving from
//! peers are handed to [`SyncSession::receive`], which merges them without
//! echoing them back through the same session.
//!
//! Delivery is fire-and-forget: a failed send is logged and dropped, never
//! retried.

use crate::error::{Result, SyncError};
use crate::store::Store;
use crate::subscriptions::{SubscriptionHandle, SubscriptionId};
use crate::types::Delta;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Moves encoded deltas to remote peers.
pub trait Transport: Send + Sync + 'static {
    /// Deliver one encoded delta to every peer.
    fn send(&self, payload: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, payload: &[u8]) -> Result<()> {
        (**self).send(payload)
    }
}

/// Encode a delta for the wire: a MessagePack map of key to `bin` value.
pub fn encode_delta(delta: &Delta) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(delta)?)
}

/// Decode a delta received from the wire.
///
/// A key that appears more than once keeps its last value.
pub fn decode_delta(payload: &[u8]) -> Result<Delta> {
    Ok(rmp_serde::from_slice(payload)?)
}

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Human-readable session title, used in log output.
    pub title: Option<String>,

    /// Name of the forwarding thread.
    pub thread_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            title: None,
            thread_name: "keysync-session".to_string(),
        }
    }
}

/// A store joined to a group of remote peers through one transport.
pub struct SyncSession {
    store: Arc<Store>,
    subscription: SubscriptionId,
    title: Option<String>,
    forwarder: Option<JoinHandle<()>>,
    active: bool,
}

impl SyncSession {
    /// Join `store` to the peers behind `transport`.
    ///
    /// Only deltas published after joining are forwarded.
    pub fn join<T: Transport>(store: Arc<Store>, transport: T, config: SessionConfig) -> Result<Self> {
        let handle = store.subscribe();
        let subscription = handle.id;
        let title = config.title.clone();

        let forwarder = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || forward(handle, transport, config.title));

        let forwarder = match forwarder {
            Ok(forwarder) => forwarder,
            Err(e) => {
                store.unsubscribe(subscription);
                return Err(e.into());
            }
        };

        debug!(session = ?title, %subscription, "joined session");

        Ok(Self {
            store,
            subscription,
            title,
            forwarder: Some(forwarder),
            active: true,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The store subscription this session forwards from.
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Merge an encoded delta received from a peer.
    ///
    /// Malformed payloads are rejected without touching the store.
    pub fn receive(&self, payload: &[u8]) -> Result<()> {
        if !self.active {
            return Err(SyncError::SessionClosed);
        }
        let delta = decode_delta(payload)?;
        trace!(session = ?self.title, keys = delta.len(), "received delta");
        self.store.merge_from(self.subscription, delta);
        Ok(())
    }

    /// Stop forwarding and wait for the forwarding thread to exit.
    ///
    /// Deltas still queued for the transport are discarded.
    pub fn leave(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.store.unsubscribe(self.subscription);

        if let Some(forwarder) = self.forwarder.take() {
            if forwarder.join().is_err() {
                warn!(session = ?self.title, "forwarding thread panicked");
            }
        }
        debug!(session = ?self.title, "left session");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.leave();
    }
}

/// Forwarding loop: runs until the subscription ends.
fn forward<T: Transport>(handle: SubscriptionHandle, transport: T, title: Option<String>) {
    for delta in handle.iter() {
        let payload = match encode_delta(&delta) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session = ?title, error = %e, "failed to encode delta");
                continue;
            }
        };

        match transport.send(&payload) {
            Ok(()) => trace!(session = ?title, keys = delta.len(), bytes = payload.len(), "sent delta"),
            Err(e) => warn!(session = ?title, error = %e, "failed to send delta"),
        }
    }
    trace!(session = ?title, "forwarder stopped");
}

/// In-process transport backed by a channel.
///
/// Every payload sent is readable from the paired receiver, which makes it
/// easy to relay deltas between stores in one process.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    sender: Sender<Vec<u8>>,
}

impl MemoryTransport {
    /// Create a transport and the receiver its payloads arrive on.
    pub fn channel() -> (Self, Receiver<Vec<u8>>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, payload: &[u8]) -> Result<()> {
        self.sender
            .send(payload.to_vec())
            .map_err(|_| SyncError::Transport("receiver disconnected".into()))
    }
}
