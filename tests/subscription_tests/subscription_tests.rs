//! Tests for per-key subscriptions
//!
//! These tests verify:
//! - Subscribe/unsubscribe outcomes and idempotence
//! - Notifications on overwrite and deletion
//! - The per-key subscriber limit
//! - Pruning of sinks whose receiver is gone
//! - Slow subscribers never block writers

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use pipekv::error::{KvsError, Result};
use pipekv::store::KeyedStore;
use pipekv::subscription::{
    Notification, NotificationSink, QueueSink, SinkId, SubscribeOutcome, SubscriberSet,
    UnsubscribeOutcome,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn sink(id: SinkId) -> (Arc<QueueSink>, Receiver<Notification>) {
    let (sink, rx) = QueueSink::bounded(id, 16);
    (Arc::new(sink), rx)
}

fn store_with(items: &[(&str, &str)]) -> KeyedStore {
    let store = KeyedStore::new(4);
    let pairs: Vec<_> = items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    store.write(&pairs);
    store
}

fn write(store: &KeyedStore, key: &str, value: &str) {
    assert!(store.write(&[(key.to_string(), value.to_string())]).is_empty());
}

/// Sink whose transport is always broken
struct BrokenSink(SinkId);

impl NotificationSink for BrokenSink {
    fn id(&self) -> SinkId {
        self.0
    }

    fn deliver(&self, _notification: &Notification) -> Result<()> {
        Err(KvsError::ChannelClosed("broken".to_string()))
    }
}

// =============================================================================
// Subscribe / Unsubscribe Tests
// =============================================================================

#[test]
fn test_subscribe_existing_key() {
    let store = store_with(&[("a", "1")]);
    let (s, _rx) = sink(1);

    assert_eq!(store.subscribe("a", s), SubscribeOutcome::Subscribed);
    assert_eq!(store.subscriber_count("a"), 1);
}

#[test]
fn test_subscribe_missing_key() {
    let store = store_with(&[]);
    let (s, _rx) = sink(1);

    assert_eq!(store.subscribe("ghost", s.clone()), SubscribeOutcome::KeyNotFound);
    assert_eq!(store.subscribe("#bad", s), SubscribeOutcome::KeyNotFound);
}

#[test]
fn test_subscribe_is_idempotent() {
    let store = store_with(&[("a", "1")]);
    let (s, rx) = sink(1);

    assert_eq!(store.subscribe("a", s.clone()), SubscribeOutcome::Subscribed);
    assert_eq!(store.subscribe("a", s), SubscribeOutcome::AlreadySubscribed);
    assert_eq!(store.subscriber_count("a"), 1);

    write(&store, "a", "2");
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn test_unsubscribe_outcomes() {
    let store = store_with(&[("a", "1")]);
    let (s, rx) = sink(7);
    store.subscribe("a", s);

    assert_eq!(store.unsubscribe("a", 7), UnsubscribeOutcome::Removed);
    assert_eq!(store.unsubscribe("a", 7), UnsubscribeOutcome::NotSubscribed);
    assert_eq!(store.unsubscribe("zzz", 7), UnsubscribeOutcome::KeyNotFound);

    write(&store, "a", "2");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_unsubscribe_all_releases_every_key() {
    let store = store_with(&[("a", "1"), ("b", "2"), ("7", "3")]);
    let (s, _rx) = sink(3);
    let (other, _other_rx) = sink(4);
    for key in ["a", "b", "7"] {
        store.subscribe(key, s.clone());
    }
    store.subscribe("a", other);

    assert_eq!(store.unsubscribe_all(3), 3);
    assert_eq!(store.subscriber_count("a"), 1);
    assert_eq!(store.subscriber_count("b"), 0);
    assert_eq!(store.unsubscribe_all(3), 0);
}

#[test]
fn test_subscriber_limit() {
    let store = store_with(&[("a", "1")]);
    let sinks: Vec<_> = (1..=5).map(sink).collect();

    for (s, _) in &sinks[..4] {
        assert_eq!(store.subscribe("a", s.clone()), SubscribeOutcome::Subscribed);
    }
    assert_eq!(store.subscribe("a", sinks[4].0.clone()), SubscribeOutcome::LimitReached);

    // Freeing a slot lets the next one in.
    store.unsubscribe("a", 1);
    assert_eq!(store.subscribe("a", sinks[4].0.clone()), SubscribeOutcome::Subscribed);
}

// =============================================================================
// Notification Tests
// =============================================================================

#[test]
fn test_overwrite_notifies_new_value() {
    let store = store_with(&[("a", "1")]);
    let (s, rx) = sink(1);
    store.subscribe("a", s);

    write(&store, "a", "9");

    let notification = rx.try_recv().unwrap();
    assert_eq!(notification, Notification::updated("a", "9"));
    assert_eq!(notification.to_string(), "(a, 9)");
}

#[test]
fn test_notifications_arrive_in_write_order() {
    let store = store_with(&[("k", "0")]);
    let (s, rx) = sink(1);
    store.subscribe("k", s);

    for v in ["1", "2", "3"] {
        write(&store, "k", v);
    }

    let values: Vec<_> = rx
        .try_iter()
        .map(|n| match n {
            Notification::Updated { value, .. } => value,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(values, vec!["1", "2", "3"]);
}

#[test]
fn test_only_subscribed_keys_notify() {
    let store = store_with(&[("a", "1"), ("b", "1")]);
    let (s, rx) = sink(1);
    store.subscribe("a", s);

    write(&store, "b", "2");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_delete_sends_exactly_one_deleted() {
    let store = store_with(&[("a", "1")]);
    let (s, rx) = sink(1);
    store.subscribe("a", s);

    assert!(store.delete(&["a".to_string()]).is_empty());

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received, vec![Notification::deleted("a")]);
    assert_eq!(received[0].to_string(), "(a, DELETED)");

    // Recreating the key does not resurrect the subscription.
    write(&store, "a", "2");
    assert!(rx.try_recv().is_err());
    assert_eq!(store.subscriber_count("a"), 0);
}

#[test]
fn test_dropped_receiver_is_pruned() {
    let store = store_with(&[("a", "1")]);
    let (s, rx) = sink(1);
    store.subscribe("a", s);
    drop(rx);

    write(&store, "a", "2");
    assert_eq!(store.subscriber_count("a"), 0);
}

#[test]
fn test_broken_sink_does_not_affect_others() {
    let store = store_with(&[("a", "1")]);
    let (good, rx) = sink(1);
    store.subscribe("a", good);
    store.subscribe("a", Arc::new(BrokenSink(2)));

    write(&store, "a", "2");

    assert_eq!(rx.try_recv().unwrap(), Notification::updated("a", "2"));
    assert_eq!(store.subscriber_count("a"), 1);
}

#[test]
fn test_full_queue_drops_without_blocking() {
    let store = store_with(&[("a", "0")]);
    let (s, rx) = QueueSink::bounded(1, 2);
    store.subscribe("a", Arc::new(s));

    for i in 1..=10 {
        write(&store, "a", &i.to_string());
    }

    // The subscription survives; only the overflow is lost.
    assert_eq!(rx.try_iter().count(), 2);
    assert_eq!(store.subscriber_count("a"), 1);
    assert_eq!(store.read(&["a".to_string()])[0].1.as_deref(), Some("10"));
}

// =============================================================================
// SubscriberSet Tests
// =============================================================================

#[test]
fn test_subscriber_set_close_clears_members() {
    let mut set = SubscriberSet::new(2);
    let (s, rx) = sink(1);
    set.insert(s);

    let delivered = set.close_with(&Notification::deleted("k"));

    assert_eq!(delivered, 1);
    assert!(set.is_empty());
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Notification::deleted("k"));
}
