//! Key node: one key's value, value lock, and subscribers

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::subscription::{
    Notification, NotificationSink, SinkId, SubscribeOutcome, SubscriberSet,
};

/// Record for a single stored key
///
/// Lock order inside a node is always `value` before `subscribers`.
pub(crate) struct KeyNode {
    key: String,
    value: RwLock<String>,
    subscribers: Mutex<SubscriberSet>,
}

impl KeyNode {
    pub(crate) fn new(key: &str, value: &str, subscriber_limit: usize) -> Self {
        Self {
            key: key.to_string(),
            value: RwLock::new(value.to_string()),
            subscribers: Mutex::new(SubscriberSet::new(subscriber_limit)),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the current value (shared lock)
    pub(crate) fn value(&self) -> String {
        self.value.read().clone()
    }

    /// Overwrite the value and notify subscribers while the value lock is held
    pub(crate) fn replace(&self, value: &str) -> usize {
        let mut current = self.value.write();
        *current = value.to_string();
        let notification = Notification::updated(self.key.as_str(), current.as_str());
        self.subscribers.lock().broadcast(&notification)
    }

    /// Send the final DELETED notification and drop every subscriber
    pub(crate) fn retire(&self) -> usize {
        let _value = self.value.write();
        self.subscribers
            .lock()
            .close_with(&Notification::deleted(self.key.as_str()))
    }

    pub(crate) fn subscribe(&self, sink: Arc<dyn NotificationSink>) -> SubscribeOutcome {
        self.subscribers.lock().insert(sink)
    }

    pub(crate) fn unsubscribe(&self, id: SinkId) -> bool {
        self.subscribers.lock().remove(id)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
