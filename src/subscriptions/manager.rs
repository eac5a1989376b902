//! Subscription table and delta fan-out.

use crate::types::Delta;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::types::{SubscriptionHandle, SubscriptionId};

/// Internal subscription state.
struct Subscription {
    sender: Sender<Delta>,
    /// Shared with the handle so cancellation is visible before the queue drains.
    closed: Arc<AtomicBool>,
}

impl Subscription {
    /// Queue a delta. Returns false if the handle has been dropped.
    fn send(&self, delta: Delta) -> bool {
        self.sender.send(delta).is_ok()
    }

    /// Mark closed. Dropping the sender afterwards wakes blocked receivers.
    fn close(self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Fans out published deltas to every active subscription.
pub struct ChangeBus {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Set once by `shutdown`; later subscriptions start out terminated.
    shut_down: AtomicBool,
}

impl ChangeBus {
    /// Create a new bus with no subscriptions.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Create a new subscription with an empty queue.
    pub fn subscribe(&self) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let handle = SubscriptionHandle::new(id, receiver, Arc::clone(&closed));

        let subscription = Subscription { sender, closed };

        let mut subs = self.subscriptions.write();
        if self.shut_down.load(Ordering::Acquire) {
            subscription.close();
            debug!(%id, "subscribed after shutdown, terminated immediately");
        } else {
            subs.insert(id, subscription);
            trace!(%id, "subscribed");
        }

        handle
    }

    /// Cancel a subscription. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.subscriptions.write().remove(&id);
        if let Some(sub) = removed {
            sub.close();
            trace!(%id, "unsubscribed");
        }
    }

    /// Terminate every subscription and clear the table.
    pub fn shutdown(&self) {
        let drained: Vec<Subscription> = {
            let mut subs = self.subscriptions.write();
            self.shut_down.store(true, Ordering::Release);
            subs.drain().map(|(_, sub)| sub).collect()
        };

        if !drained.is_empty() {
            debug!(count = drained.len(), "change bus shut down");
        }
        for sub in drained {
            sub.close();
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Publish a delta to every subscription.
    pub fn publish(&self, delta: Delta) {
        self.broadcast(None, delta);
    }

    /// Publish a delta to every subscription except `origin`.
    pub fn publish_except(&self, delta: Delta, origin: SubscriptionId) {
        self.broadcast(Some(origin), delta);
    }

    /// Internal broadcast helper. Prunes subscriptions whose handle is gone.
    fn broadcast(&self, skip: Option<SubscriptionId>, delta: Delta) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            trace!(keys = delta.len(), subscribers = subs.len(), "publishing delta");
            for (id, sub) in subs.iter() {
                if Some(*id) == skip {
                    continue;
                }
                if !sub.send(delta.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    sub.close();
                    debug!(%id, "pruned subscription with dropped handle");
                }
            }
        }
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChangeBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}
