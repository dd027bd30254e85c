//! Inserter role: insert, split on overflow, and parent promotion.

use arbor_common::NodeId;
use tracing::debug;

use crate::event::TreeEvent;
use crate::ordering::lower_bound;

use super::BTree;

impl<K: Ord + Clone> BTree<K> {
    /// Inserts `key`, rejecting duplicates: inserting a key already present
    /// anywhere in the tree is a silent no-op.
    pub fn insert(&mut self, key: K) {
        if self.find(&key).is_some() {
            return;
        }

        if self.root_id().is_none() {
            let root_id = self.allocate_node();
            if let Some(node) = self.node_mut(root_id) {
                node.keys.push(key.clone());
            }
            self.emit(TreeEvent::KeyInserted {
                node: root_id,
                key,
                index: 0,
            });
            self.emit(TreeEvent::RootCreated { node: root_id });
            debug!(root = %root_id, "created root");
            self.root = Some(root_id);
            return;
        }

        let Some(leaf_id) = self.find_owning_leaf(&key) else {
            return;
        };
        self.node_insert(leaf_id, key, None);

        let overfull = self
            .node(leaf_id)
            .is_some_and(|node| node.keys.len() > self.config.max_keys());
        if overfull {
            self.split_and_promote(leaf_id);
        }
    }

    /// Places `key` (and the child to its right, if any) at its sorted
    /// position in the node.
    pub(crate) fn node_insert(&mut self, node_id: NodeId, key: K, child: Option<NodeId>) {
        if let Some(child_id) = child {
            self.set_parent(child_id, Some(node_id));
        }
        let Some(node) = self.node_mut(node_id) else {
            return;
        };
        let index = lower_bound(&node.keys, &key);
        node.keys.insert(index, key.clone());
        if let Some(child_id) = child {
            node.children.insert(index + 1, child_id);
        }
        self.emit(TreeEvent::KeyInserted {
            node: node_id,
            key,
            index,
        });
    }

    /// Splits an overfull node: the upper half moves to a new right sibling
    /// and the node's new rightmost key moves up to the parent. Promotion
    /// removes the key from the node itself rather than copying it.
    pub(crate) fn split_and_promote(&mut self, node_id: NodeId) {
        let right_id = self.allocate_node();
        let level = self.node_level(node_id);
        self.emit(TreeEvent::NodeSplit {
            left: node_id,
            right: right_id,
            level,
        });

        let middle = self.config.fanout.div_ceil(2);
        let mut moved_keys: Vec<K> = Vec::new();
        let mut moved_children: Vec<NodeId> = Vec::new();
        if let Some((left, right)) = self.node_pair_mut(node_id, right_id) {
            if middle < left.keys.len() {
                right.keys = left.keys.split_off(middle);
                if middle < left.children.len() {
                    right.children = left.children.split_off(middle);
                }
                moved_keys = right.keys.clone();
                moved_children = right.children.clone();
            }
        }
        debug!(left = %node_id, right = %right_id, level, entries = moved_keys.len(), "node split");

        for child in moved_children {
            self.set_parent(child, Some(right_id));
        }
        for (index, key) in moved_keys.into_iter().enumerate() {
            self.emit(TreeEvent::KeyDeleted {
                node: node_id,
                key: key.clone(),
            });
            self.emit(TreeEvent::KeyInserted {
                node: right_id,
                key,
                index,
            });
        }

        self.insert_parent(node_id, right_id);
    }

    /// Promotes the left node's rightmost key into the parent as the
    /// separator between `node_id` and its new right sibling, creating a new
    /// root or recursively splitting the parent as needed.
    fn insert_parent(&mut self, node_id: NodeId, new_id: NodeId) {
        let Some(promoted) = self.node(node_id).and_then(|node| node.keys.last().cloned()) else {
            return;
        };

        if self.root_id() == Some(node_id) {
            let root_id = self.allocate_node();
            self.emit(TreeEvent::RootCreated { node: root_id });
            self.pop_rightmost_key(node_id);
            if let Some(root) = self.node_mut(root_id) {
                root.keys.push(promoted.clone());
                root.children.push(node_id);
                root.children.push(new_id);
            }
            self.emit(TreeEvent::KeyInserted {
                node: root_id,
                key: promoted,
                index: 0,
            });
            self.set_parent(node_id, Some(root_id));
            self.set_parent(new_id, Some(root_id));
            self.root = Some(root_id);
            debug!(root = %root_id, "promoted new root");
            return;
        }

        let Some(parent_id) = self.node(node_id).and_then(|node| node.parent) else {
            return;
        };
        self.pop_rightmost_key(node_id);
        self.node_insert(parent_id, promoted, Some(new_id));

        let overfull = self
            .node(parent_id)
            .is_some_and(|node| node.keys.len() > self.config.max_keys());
        if overfull {
            self.split_and_promote(parent_id);
        }
    }

    fn pop_rightmost_key(&mut self, node_id: NodeId) {
        let Some(node) = self.node_mut(node_id) else {
            return;
        };
        let Some(key) = node.keys.pop() else {
            return;
        };
        self.emit(TreeEvent::KeyDeleted { node: node_id, key });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::{TreeConfig, TreeStatistics};

    fn tree(fanout: usize) -> BTree<i32> {
        BTree::new(TreeConfig::with_fanout(fanout)).unwrap()
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut tree = tree(4);
        tree.insert(10);
        tree.insert(10);

        let root = tree.root_id().unwrap();
        assert_eq!(tree.node_keys(root), Some(&[10][..]));
        assert_eq!(tree.statistics().node_count, 1);
    }

    #[test]
    fn test_split_moves_middle_key_up() {
        let mut tree = tree(4);
        for key in 1..=4 {
            tree.insert(key);
        }

        // The promoted key leaves the leaf: 2 exists only in the root.
        let root = tree.root_id().unwrap();
        assert_eq!(tree.node_keys(root), Some(&[2][..]));
        let children = tree.node_children(root).unwrap().to_vec();
        assert_eq!(tree.node_keys(children[0]), Some(&[1][..]));
        assert_eq!(tree.node_keys(children[1]), Some(&[3, 4][..]));
    }

    #[test]
    fn test_sequential_inserts_shape() {
        let mut tree = tree(4);
        for key in 1..=7 {
            tree.insert(key);
        }

        let root = tree.root_id().unwrap();
        assert_eq!(tree.node_keys(root), Some(&[2, 4][..]));
        let children = tree.node_children(root).unwrap().to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(tree.node_keys(children[0]), Some(&[1][..]));
        assert_eq!(tree.node_keys(children[1]), Some(&[3][..]));
        assert_eq!(tree.node_keys(children[2]), Some(&[5, 6, 7][..]));
        assert_eq!(
            tree.statistics(),
            TreeStatistics {
                height: 2,
                node_count: 4
            }
        );
    }

    #[test]
    fn test_recursive_split_grows_two_levels() {
        let mut tree = tree(3);
        for key in 1..=7 {
            tree.insert(key);
        }

        // Fanout 3 overflows quickly enough to split an internal node.
        let stats = tree.statistics();
        assert_eq!(stats.height, 3);
        let root = tree.root_id().unwrap();
        assert_eq!(tree.node_children(root).unwrap().len(), 2);
        for key in 1..=7 {
            assert!(tree.find(&key).is_some(), "key {key}");
        }
    }

    #[test]
    fn test_descending_inserts() {
        let mut tree = tree(4);
        for key in (1..=8).rev() {
            tree.insert(key);
        }
        for key in 1..=8 {
            assert!(tree.find(&key).is_some(), "key {key}");
        }
        assert!(tree.find(&0).is_none());
    }
}
