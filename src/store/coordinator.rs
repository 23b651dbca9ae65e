//! Lock Coordinator
//!
//! Deadlock-free locking for multi-key batches.
//!
//! Every batch locks the distinct buckets it touches in ascending index
//! order, whatever order its keys arrive in. Two batches that overlap on any
//! subset of buckets therefore always contend in the same global order and
//! can never wait on each other in a cycle.
//!
//! ```text
//!   batch A: keys [z1, a1, m1]  ->  lock 0, 12, 25
//!   batch B: keys [m2, z2]      ->  lock 12, 25
//!   batch C: keys [b1, 7x]      ->  lock 1, 33      (disjoint, runs in parallel)
//! ```

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::bucket::Bucket;
use super::key::bucket_index;

/// How the buckets of a batch are held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers of the same bucket proceed together
    Shared,
    /// Writes and deletes
    Exclusive,
}

/// Sorted, deduplicated bucket indices for a batch of keys
///
/// Keys that don't classify are skipped; they never reach the store.
pub fn lock_order<'k, I>(keys: I) -> Vec<usize>
where
    I: IntoIterator<Item = &'k str>,
{
    sorted_unique(keys.into_iter().filter_map(bucket_index))
}

pub(crate) fn sorted_unique(indices: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut order: Vec<usize> = indices.into_iter().collect();
    order.sort_unstable();
    order.dedup();
    order
}

enum BucketGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

/// Locks held for one batch; released in reverse acquisition order on drop
pub struct BatchGuard<'a> {
    guards: Vec<BucketGuard<'a>>,
    buckets: Vec<usize>,
    mode: LockMode,
}

impl BatchGuard<'_> {
    /// Bucket indices held, in acquisition order
    pub fn locked_buckets(&self) -> &[usize] {
        &self.buckets
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

/// Acquires bucket batch locks as a unit
pub struct LockCoordinator<'a> {
    buckets: &'a [Bucket],
}

impl<'a> LockCoordinator<'a> {
    pub(crate) fn new(buckets: &'a [Bucket]) -> Self {
        Self { buckets }
    }

    /// Lock the given buckets; `order` must come from `lock_order`/`sorted_unique`
    pub fn acquire(&self, order: &[usize], mode: LockMode) -> BatchGuard<'a> {
        debug_assert!(order.windows(2).all(|w| w[0] < w[1]));

        let mut guards = Vec::with_capacity(order.len());
        for &index in order {
            let gate = &self.buckets[index].gate;
            guards.push(match mode {
                LockMode::Shared => BucketGuard::Shared(gate.read()),
                LockMode::Exclusive => BucketGuard::Exclusive(gate.write()),
            });
        }

        BatchGuard {
            guards,
            buckets: order.to_vec(),
            mode,
        }
    }

    /// Lock every bucket, 0 through B-1
    pub fn acquire_all(&self, mode: LockMode) -> BatchGuard<'a> {
        let order: Vec<usize> = (0..self.buckets.len()).collect();
        self.acquire(&order, mode)
    }

    /// Lock the buckets touched by `keys`
    pub fn acquire_keys<'k, I>(&self, keys: I, mode: LockMode) -> BatchGuard<'a>
    where
        I: IntoIterator<Item = &'k str>,
    {
        self.acquire(&lock_order(keys), mode)
    }
}
