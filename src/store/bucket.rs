//! Bucket: one partition of the key space

use std::sync::Arc;

use parking_lot::RwLock;

use super::node::KeyNode;

/// A bucket carries two locks:
/// - `gate`: the batch lock acquired by `LockCoordinator` for a whole batch
/// - `nodes`: the structural lock, held only to look up or splice the list
pub(crate) struct Bucket {
    pub(crate) gate: RwLock<()>,
    nodes: RwLock<Vec<Arc<KeyNode>>>,
}

impl Bucket {
    pub(crate) fn new() -> Self {
        Self {
            gate: RwLock::new(()),
            nodes: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn find(&self, key: &str) -> Option<Arc<KeyNode>> {
        self.nodes
            .read()
            .iter()
            .find(|node| node.key() == key)
            .cloned()
    }

    /// Append a node; caller guarantees the key is absent
    pub(crate) fn insert(&self, node: Arc<KeyNode>) {
        self.nodes.write().push(node);
    }

    /// Remove exactly this node, returning whether it was linked
    pub(crate) fn unlink(&self, node: &Arc<KeyNode>) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.iter().position(|n| Arc::ptr_eq(n, node)) {
            Some(pos) => {
                nodes.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Insertion-ordered handles to every node
    pub(crate) fn nodes(&self) -> Vec<Arc<KeyNode>> {
        self.nodes.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.read().len()
    }
}
