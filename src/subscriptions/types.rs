//! Subscription handle types.

use crate::types::Delta;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A consumer's handle to an ordered stream of deltas.
///
/// Deltas queue up without limit until received. Once the subscription is
/// cancelled (unsubscribe or bus shutdown) every receive reports
/// end-of-stream, including receives already blocked and deltas that were
/// queued before cancellation. Dropping the handle tears the subscription
/// down on the next publish.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    receiver: Receiver<Delta>,
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, receiver: Receiver<Delta>, closed: Arc<AtomicBool>) -> Self {
        Self {
            id,
            receiver,
            closed,
        }
    }

    /// Whether the subscription has been cancelled.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of deltas waiting to be received.
    pub fn pending(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.receiver.len()
        }
    }

    /// Receive the next delta (blocking). `Err` means end-of-stream.
    pub fn recv(&self) -> Result<Delta, RecvError> {
        if self.is_closed() {
            return Err(RecvError);
        }
        let delta = self.receiver.recv()?;
        if self.is_closed() {
            return Err(RecvError);
        }
        Ok(delta)
    }

    /// Try to receive a delta (non-blocking).
    pub fn try_recv(&self) -> Result<Delta, TryRecvError> {
        if self.is_closed() {
            return Err(TryRecvError::Disconnected);
        }
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Delta, RecvTimeoutError> {
        if self.is_closed() {
            return Err(RecvTimeoutError::Disconnected);
        }
        let delta = self.receiver.recv_timeout(timeout)?;
        if self.is_closed() {
            return Err(RecvTimeoutError::Disconnected);
        }
        Ok(delta)
    }

    /// Blocking iterator over deltas, ending at end-of-stream.
    pub fn iter(&self) -> Iter<'_> {
        Iter { handle: self }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Iterator returned by [`SubscriptionHandle::iter`].
pub struct Iter<'a> {
    handle: &'a SubscriptionHandle,
}

impl Iterator for Iter<'_> {
    type Item = Delta;

    fn next(&mut self) -> Option<Delta> {
        self.handle.recv().ok()
    }
}

impl<'a> IntoIterator for &'a SubscriptionHandle {
    type Item = Delta;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
