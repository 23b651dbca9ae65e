//! Subscription Module
//!
//! Per-key publish/subscribe notifications.
//!
//! ## Responsibilities
//! - Bounded, idempotent subscriber sets stored inside each key node
//! - Fan-out of `(key, value)` / `(key, DELETED)` notifications
//! - Lazy pruning of sinks whose channel has gone away
//!
//! Subscriber sets are edited and traversed only while the owning bucket's
//! batch lock is held, so subscription changes linearize with the writes and
//! deletes that trigger notifications.

mod notification;
mod set;
mod sink;

pub use notification::{Notification, DELETED_MARKER};
pub use set::{SubscribeOutcome, SubscriberSet, UnsubscribeOutcome};
pub use sink::{NotificationSink, QueueSink, SinkId};
