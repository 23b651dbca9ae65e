//! Store Module
//!
//! The bucketed, concurrently mutable key-value table.
//!
//! ## Responsibilities
//! - Own every key/value pair and its subscriber set
//! - Multi-key write/read/delete batches framed by `LockCoordinator`
//! - Consistent whole-store snapshots for SHOW and BACKUP
//!
//! ## Locking
//! ```text
//!   bucket gate (batch lock)  ->  bucket node list (structural)  ->  node value
//! ```
//! Batches take gates in ascending bucket order. The structural lock is only
//! held for a lookup or a splice, never while notifications fan out.

mod bucket;
mod coordinator;
mod key;
mod node;

use std::sync::Arc;

use crate::error::KvsError;
use crate::subscription::{NotificationSink, SinkId, SubscribeOutcome, UnsubscribeOutcome};

use bucket::Bucket;
use node::KeyNode;

pub use coordinator::{lock_order, BatchGuard, LockCoordinator, LockMode};
pub use key::{bucket_index, validate_key, validate_value, BUCKET_COUNT, MAX_STRING_SIZE};

/// An item of a batch that was refused
#[derive(Debug)]
pub struct Rejected {
    pub key: String,
    pub error: KvsError,
}

/// Bucketed hash table with per-key locks
pub struct KeyedStore {
    buckets: Vec<Bucket>,
    subscriber_limit: usize,
}

impl KeyedStore {
    /// Create an empty store
    pub fn new(subscriber_limit: usize) -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| Bucket::new()).collect(),
            subscriber_limit,
        }
    }

    /// Coordinator over this store's buckets
    pub fn coordinator(&self) -> LockCoordinator<'_> {
        LockCoordinator::new(&self.buckets)
    }

    /// Write a batch of pairs
    ///
    /// Existing keys are overwritten and their subscribers notified. Invalid
    /// pairs are returned; the rest of the batch is still applied.
    pub fn write(&self, pairs: &[(String, String)]) -> Vec<Rejected> {
        let mut rejected = Vec::new();
        let mut accepted = Vec::with_capacity(pairs.len());

        for (key, value) in pairs {
            match validate_key(key).and_then(|index| validate_value(key, value).map(|_| index)) {
                Ok(index) => accepted.push((index, key.as_str(), value.as_str())),
                Err(error) => {
                    tracing::debug!("Rejecting write of {:?}: {}", key, error);
                    rejected.push(Rejected {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }

        let order = coordinator::sorted_unique(accepted.iter().map(|(index, _, _)| *index));
        let _guard = self.coordinator().acquire(&order, LockMode::Exclusive);

        for (index, key, value) in accepted {
            let bucket = &self.buckets[index];
            match bucket.find(key) {
                Some(node) => {
                    let delivered = node.replace(value);
                    tracing::trace!("Overwrote {:?}, notified {} subscribers", key, delivered);
                }
                None => bucket.insert(Arc::new(KeyNode::new(key, value, self.subscriber_limit))),
            }
        }

        rejected
    }

    /// Read a batch of keys, in request order
    ///
    /// Missing and invalid keys map to `None`.
    pub fn read(&self, keys: &[String]) -> Vec<(String, Option<String>)> {
        let _guard = self
            .coordinator()
            .acquire_keys(keys.iter().map(String::as_str), LockMode::Shared);

        keys.iter()
            .map(|key| {
                let value = bucket_index(key)
                    .and_then(|index| self.buckets[index].find(key))
                    .map(|node| node.value());
                (key.clone(), value)
            })
            .collect()
    }

    /// Delete a batch of keys, returning the ones that were not found
    ///
    /// Subscribers of each deleted key get a final DELETED notification
    /// before the node is unlinked.
    pub fn delete(&self, keys: &[String]) -> Vec<String> {
        let _guard = self
            .coordinator()
            .acquire_keys(keys.iter().map(String::as_str), LockMode::Exclusive);

        let mut missing = Vec::new();
        for key in keys {
            let found = bucket_index(key).and_then(|index| {
                let bucket = &self.buckets[index];
                bucket.find(key).map(|node| (bucket, node))
            });

            match found {
                Some((bucket, node)) => {
                    let delivered = node.retire();
                    bucket.unlink(&node);
                    tracing::trace!("Deleted {:?}, notified {} subscribers", key, delivered);
                }
                None => missing.push(key.clone()),
            }
        }
        missing
    }

    /// Point-in-time copy of every pair, grouped by bucket in insertion order
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let _guard = self.coordinator().acquire_all(LockMode::Shared);

        self.buckets
            .iter()
            .flat_map(|bucket| bucket.nodes())
            .map(|node| (node.key().to_string(), node.value()))
            .collect()
    }

    /// Attach a sink to an existing key
    pub fn subscribe(&self, key: &str, sink: Arc<dyn NotificationSink>) -> SubscribeOutcome {
        let Some(index) = bucket_index(key) else {
            return SubscribeOutcome::KeyNotFound;
        };
        let _guard = self.coordinator().acquire(&[index], LockMode::Shared);

        match self.buckets[index].find(key) {
            Some(node) => node.subscribe(sink),
            None => SubscribeOutcome::KeyNotFound,
        }
    }

    /// Detach a sink from a key
    pub fn unsubscribe(&self, key: &str, sink: SinkId) -> UnsubscribeOutcome {
        let Some(index) = bucket_index(key) else {
            return UnsubscribeOutcome::KeyNotFound;
        };
        let _guard = self.coordinator().acquire(&[index], LockMode::Shared);

        match self.buckets[index].find(key) {
            Some(node) if node.unsubscribe(sink) => UnsubscribeOutcome::Removed,
            Some(_) => UnsubscribeOutcome::NotSubscribed,
            None => UnsubscribeOutcome::KeyNotFound,
        }
    }

    /// Detach a sink from every key it is subscribed to
    ///
    /// Returns the number of subscriptions removed.
    pub fn unsubscribe_all(&self, sink: SinkId) -> usize {
        let _guard = self.coordinator().acquire_all(LockMode::Shared);

        self.buckets
            .iter()
            .flat_map(|bucket| bucket.nodes())
            .filter(|node| node.unsubscribe(sink))
            .count()
    }

    /// Number of subscribers attached to `key` (0 if absent)
    pub fn subscriber_count(&self, key: &str) -> usize {
        let Some(index) = bucket_index(key) else {
            return 0;
        };
        let _guard = self.coordinator().acquire(&[index], LockMode::Shared);
        self.buckets[index]
            .find(key)
            .map(|node| node.subscriber_count())
            .unwrap_or(0)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        let _guard = self.coordinator().acquire_all(LockMode::Shared);
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_limit(&self) -> usize {
        self.subscriber_limit
    }
}

impl Default for KeyedStore {
    fn default() -> Self {
        Self::new(100)
    }
}
