//! A placeholder B+ tree: scaffolding carried over from the original design, unused by the core.
//!
//! This mirrors the original's "B+ tree" closely enough to keep faith with the on-disk
//! `agi_root` field's intent, while being honest that it is a sorted linked list of fixed-size
//! nodes, not a real balanced tree. Nothing in the allocator, inode table, or file I/O path calls
//! into this module.

/// The maximum number of key/value slots held by one node.
const NODE_CAPACITY: usize = 10;

struct Node<V> {
    keys: Vec<u64>,
    values: Vec<V>,
    next: Option<Box<Node<V>>>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            keys: Vec::with_capacity(NODE_CAPACITY),
            values: Vec::with_capacity(NODE_CAPACITY),
            next: None,
        }
    }
}

/// A sorted, append-only key/value index, chained across fixed-capacity nodes.
pub struct BTree<V> {
    root: Node<V>,
}

impl<V> Default for BTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> BTree<V> {
    /// Creates an empty tree with a single, empty leaf node.
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Inserts `key`/`value`, walking the node chain for the first one with spare capacity.
    pub fn insert(&mut self, key: u64, value: V) {
        let mut current = &mut self.root;
        loop {
            if current.keys.len() < NODE_CAPACITY {
                let pos = current.keys.partition_point(|&k| k < key);
                current.keys.insert(pos, key);
                current.values.insert(pos, value);
                return;
            }
            if current.next.is_none() {
                current.next = Some(Box::new(Node::new()));
            }
            current = current.next.as_mut().unwrap();
        }
    }

    /// Looks up the value stored under `key`, if present.
    pub fn lookup(&self, key: u64) -> Option<&V> {
        let mut current = Some(&self.root);
        while let Some(node) = current {
            if let Ok(idx) = node.keys.binary_search(&key) {
                return Some(&node.values[idx]);
            }
            current = node.next.as_deref();
        }
        None
    }
}
