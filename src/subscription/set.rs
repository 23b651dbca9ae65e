//! Bounded subscriber set

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{Notification, NotificationSink, SinkId};

/// Result of a subscribe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
    KeyNotFound,
    LimitReached,
}

/// Result of an unsubscribe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotSubscribed,
    KeyNotFound,
}

/// Set of sinks subscribed to one key, capped at `limit` members
pub struct SubscriberSet {
    limit: usize,
    sinks: BTreeMap<SinkId, Arc<dyn NotificationSink>>,
}

impl SubscriberSet {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            sinks: BTreeMap::new(),
        }
    }

    /// Add a sink; duplicates are a no-op
    ///
    /// Never returns `KeyNotFound`, that is decided by the store.
    pub fn insert(&mut self, sink: Arc<dyn NotificationSink>) -> SubscribeOutcome {
        let id = sink.id();
        if self.sinks.contains_key(&id) {
            return SubscribeOutcome::AlreadySubscribed;
        }
        if self.sinks.len() >= self.limit {
            return SubscribeOutcome::LimitReached;
        }
        self.sinks.insert(id, sink);
        SubscribeOutcome::Subscribed
    }

    /// Remove a sink, returning whether it was present
    pub fn remove(&mut self, id: SinkId) -> bool {
        self.sinks.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to every member, pruning the ones that fail
    ///
    /// Returns the number of successful deliveries.
    pub fn broadcast(&mut self, notification: &Notification) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;

        for (id, sink) in &self.sinks {
            match sink.deliver(notification) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        "Dropping subscriber {} of key {:?}: {}",
                        id,
                        notification.key(),
                        e
                    );
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.sinks.remove(&id);
        }
        delivered
    }

    /// Deliver a final notification to every member, then empty the set
    pub fn close_with(&mut self, notification: &Notification) -> usize {
        let delivered = self.broadcast(notification);
        self.sinks.clear();
        delivered
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("limit", &self.limit)
            .field("members", &self.sinks.keys().collect::<Vec<_>>())
            .finish()
    }
}
