//! Searcher role: descent and point lookup.

use arbor_common::NodeId;

use crate::event::TreeEvent;
use crate::ordering::{exact_position, upper_bound};

use super::BTree;

impl<K: Ord + Clone> BTree<K> {
    /// Returns the node holding `key`, or `None` if the key is absent.
    ///
    /// Unlike the B+-tree, a match may sit in an internal node. Emits
    /// [`TreeEvent::NodeVisited`] for every node on the descent path.
    pub fn find(&mut self, key: &K) -> Option<NodeId> {
        let mut current = self.root_id();
        while let Some(id) = current {
            self.emit(TreeEvent::NodeVisited { node: id });
            let node = self.node(id)?;
            if exact_position(&node.keys, key).is_some() {
                return Some(id);
            }
            if node.is_leaf() {
                return None;
            }
            let index = upper_bound(&node.keys, key);
            current = node.children.get(index).copied();
        }
        None
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Descends to the leaf that would own `key`, whether or not the key is
    /// present, using the same fence-post rule as the lookup path.
    pub fn find_owning_leaf(&mut self, key: &K) -> Option<NodeId> {
        let mut current = self.root_id()?;
        loop {
            self.emit(TreeEvent::NodeVisited { node: current });
            let node = self.node(current)?;
            if node.is_leaf() {
                return Some(current);
            }
            let index = upper_bound(&node.keys, key);
            current = node
                .children
                .get(index)
                .or_else(|| node.children.last())
                .copied()?;
        }
    }
}
