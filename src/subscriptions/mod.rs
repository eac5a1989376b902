//! Change bus: multicast delivery of deltas to in-process subscribers.
//!
//! Every published delta is appended to the queue of each active
//! subscription. Subscriptions are independent: a consumer that never
//! receives only grows its own queue and never blocks the publisher.
//!
//! # Example
//!
//! ```ignore
//! let bus = ChangeBus::new();
//! let handle = bus.subscribe();
//!
//! bus.publish(delta);
//!
//! for delta in handle.iter() {
//!     println!("changed: {:?}", delta);
//! }
//! ```

mod manager;
mod types;

pub use manager::ChangeBus;
pub use types::{Iter, SubscriptionHandle, SubscriptionId};
