//! Notification sinks
//!
//! A sink is the opaque handle a subscriber set uses to reach one client
//! session.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::error::{KvsError, Result};
use super::Notification;

/// Identity of a sink; one per client session
pub type SinkId = u64;

/// Something a notification can be delivered to
///
/// `deliver` must not block on the remote peer: it runs while the store holds
/// the key's value lock.
pub trait NotificationSink: Send + Sync {
    /// Stable identity used for idempotent subscribe/unsubscribe
    fn id(&self) -> SinkId;

    /// Hand a notification over for delivery
    ///
    /// An error means the sink is gone for good and should be pruned.
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Sink backed by a bounded crossbeam channel
///
/// The receiving half is drained by whoever owns the actual transport
/// (a session's notifier thread, or a test).
#[derive(Debug, Clone)]
pub struct QueueSink {
    id: SinkId,
    sender: Sender<Notification>,
}

impl QueueSink {
    /// Create a sink and the receiver that drains it
    pub fn bounded(id: SinkId, capacity: usize) -> (Self, Receiver<Notification>) {
        let (sender, receiver) = channel::bounded(capacity);
        (Self { id, sender }, receiver)
    }
}

impl NotificationSink for QueueSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn deliver(&self, notification: &Notification) -> Result<()> {
        match self.sender.try_send(notification.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                // Slow reader: drop this one rather than stall the writer.
                tracing::warn!(
                    "Notification queue of sink {} is full, dropping {}",
                    self.id, dropped
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(KvsError::ChannelClosed(format!(
                "notification sink {} is closed",
                self.id
            ))),
        }
    }
}
