//! Deleter role: recursive delete with pre-emptive underflow repair.
//!
//! Internal keys are real, so deleting one replaces it with a predecessor or
//! successor pulled from a leaf and recurses into the donor subtree. Before
//! descending into a child at minimum occupancy the child is filled first —
//! borrowing from a sibling with spare capacity or merging — so repair never
//! propagates back up the descent path.

use arbor_common::NodeId;
use tracing::debug;

use crate::event::TreeEvent;
use crate::ordering::{exact_position, upper_bound};

use super::BTree;

impl<K: Ord + Clone> BTree<K> {
    /// Removes `key` from the tree; a no-op if the key is absent.
    pub fn remove(&mut self, key: &K) {
        let Some(root_id) = self.root_id() else {
            return;
        };
        self.delete_recursive(root_id, key);

        // Root collapse: an emptied leaf root ends the tree, an emptied
        // internal root hands the tree to its sole surviving child.
        let Some(root_id) = self.root_id() else {
            return;
        };
        let Some(root) = self.node(root_id) else {
            return;
        };
        if !root.keys.is_empty() {
            return;
        }
        let replacement = root.children.first().copied();
        self.emit(TreeEvent::RootDeleted { node: root_id });
        self.release_node(root_id);
        match replacement {
            Some(child) => {
                self.set_parent(child, None);
                self.root = Some(child);
                debug!(old = %root_id, new = %child, "root collapsed");
            }
            None => {
                self.root = None;
                debug!(old = %root_id, "tree emptied");
            }
        }
    }

    fn delete_recursive(&mut self, node_id: NodeId, key: &K) {
        let Some(node) = self.node(node_id) else {
            return;
        };

        if let Some(index) = exact_position(&node.keys, key) {
            if node.is_leaf() {
                self.leaf_delete(node_id, index);
                return;
            }

            let (Some(&left_id), Some(&right_id)) =
                (node.children.get(index), node.children.get(index + 1))
            else {
                return;
            };
            let spare = self.min_keys() + 1;
            let left_len = self.node(left_id).map_or(0, |child| child.keys.len());
            let right_len = self.node(right_id).map_or(0, |child| child.keys.len());

            if left_len >= spare {
                let Some(predecessor) = self.predecessor(left_id) else {
                    return;
                };
                self.replace_key_at(node_id, index, predecessor.clone());
                self.delete_recursive(left_id, &predecessor);
            } else if right_len >= spare {
                let Some(successor) = self.successor(right_id) else {
                    return;
                };
                self.replace_key_at(node_id, index, successor.clone());
                self.delete_recursive(right_id, &successor);
            } else {
                // Neither child can donate: sink the key into the merged
                // child and continue there.
                self.merge_children(node_id, index);
                self.delete_recursive(left_id, key);
            }
            return;
        }

        if node.is_leaf() {
            return;
        }

        let index = upper_bound(&node.keys, key);
        let Some(&child_id) = node.children.get(index) else {
            return;
        };
        let at_minimum = self
            .node(child_id)
            .is_some_and(|child| child.keys.len() <= self.min_keys());
        if at_minimum {
            self.fill(node_id, index);
        }

        // The child, or its position, may have moved during the fill.
        let Some(node) = self.node(node_id) else {
            return;
        };
        let index = upper_bound(&node.keys, key);
        let Some(&child_id) = node.children.get(index) else {
            return;
        };
        self.delete_recursive(child_id, key);
    }

    fn leaf_delete(&mut self, node_id: NodeId, index: usize) {
        let Some(node) = self.node_mut(node_id) else {
            return;
        };
        if index >= node.keys.len() {
            return;
        }
        let key = node.keys.remove(index);
        self.emit(TreeEvent::KeyDeleted { node: node_id, key });
    }

    /// Rightmost key of the subtree's rightmost leaf.
    fn predecessor(&self, node_id: NodeId) -> Option<K> {
        let mut current = node_id;
        loop {
            let node = self.node(current)?;
            if node.is_leaf() {
                return node.keys.last().cloned();
            }
            current = *node.children.last()?;
        }
    }

    /// Leftmost key of the subtree's leftmost leaf.
    fn successor(&self, node_id: NodeId) -> Option<K> {
        let mut current = node_id;
        loop {
            let node = self.node(current)?;
            if node.is_leaf() {
                return node.keys.first().cloned();
            }
            current = *node.children.first()?;
        }
    }

    /// Restores spare capacity in the child at `index` before descent:
    /// borrow from an adjacent sibling with keys to spare, else merge with
    /// one.
    fn fill(&mut self, parent_id: NodeId, index: usize) {
        let min = self.min_keys();
        let Some(parent) = self.node(parent_id) else {
            return;
        };
        let child_count = parent.children.len();
        let left_spare = index > 0
            && parent
                .children
                .get(index - 1)
                .and_then(|&sibling| self.node(sibling))
                .is_some_and(|sibling| sibling.keys.len() > min);
        let right_spare = parent
            .children
            .get(index + 1)
            .and_then(|&sibling| self.node(sibling))
            .is_some_and(|sibling| sibling.keys.len() > min);

        if left_spare {
            self.borrow_from_prev(parent_id, index);
        } else if right_spare {
            self.borrow_from_next(parent_id, index);
        } else if index + 1 < child_count {
            self.merge_children(parent_id, index);
        } else if index > 0 {
            self.merge_children(parent_id, index - 1);
        }
    }

    /// Rotates one entry rightward through the parent: the separator sinks
    /// to the front of the child and the left sibling's rightmost key takes
    /// its place in the parent.
    fn borrow_from_prev(&mut self, parent_id: NodeId, index: usize) {
        let Some(parent) = self.node(parent_id) else {
            return;
        };
        let (Some(&child_id), Some(&sibling_id)) =
            (parent.children.get(index), parent.children.get(index - 1))
        else {
            return;
        };
        let Some(separator) = parent.keys.get(index - 1).cloned() else {
            return;
        };
        debug!(child = %child_id, sibling = %sibling_id, "borrowing from left sibling");

        if let Some(child) = self.node_mut(child_id) {
            child.keys.insert(0, separator.clone());
        }
        self.emit(TreeEvent::KeyInserted {
            node: child_id,
            key: separator,
            index: 0,
        });

        let Some(sibling_key) = self
            .node(sibling_id)
            .and_then(|sibling| sibling.keys.last().cloned())
        else {
            return;
        };
        self.replace_key_at(parent_id, index - 1, sibling_key);

        let child_is_leaf = self.node(child_id).is_some_and(|child| child.is_leaf());
        if !child_is_leaf {
            let moved = self
                .node_mut(sibling_id)
                .and_then(|sibling| sibling.children.pop());
            if let Some(moved_id) = moved {
                if let Some(child) = self.node_mut(child_id) {
                    child.children.insert(0, moved_id);
                }
                self.set_parent(moved_id, Some(child_id));
            }
        }

        let removed = self
            .node_mut(sibling_id)
            .and_then(|sibling| sibling.keys.pop());
        if let Some(key) = removed {
            self.emit(TreeEvent::KeyDeleted {
                node: sibling_id,
                key,
            });
        }
    }

    /// Mirror of [`Self::borrow_from_prev`]: the separator sinks to the back
    /// of the child and the right sibling's leftmost key takes its place.
    fn borrow_from_next(&mut self, parent_id: NodeId, index: usize) {
        let Some(parent) = self.node(parent_id) else {
            return;
        };
        let (Some(&child_id), Some(&sibling_id)) =
            (parent.children.get(index), parent.children.get(index + 1))
        else {
            return;
        };
        let Some(separator) = parent.keys.get(index).cloned() else {
            return;
        };
        debug!(child = %child_id, sibling = %sibling_id, "borrowing from right sibling");

        let insert_index = self.node(child_id).map_or(0, |child| child.keys.len());
        if let Some(child) = self.node_mut(child_id) {
            child.keys.push(separator.clone());
        }
        self.emit(TreeEvent::KeyInserted {
            node: child_id,
            key: separator,
            index: insert_index,
        });

        let Some(sibling_key) = self
            .node(sibling_id)
            .and_then(|sibling| sibling.keys.first().cloned())
        else {
            return;
        };
        self.replace_key_at(parent_id, index, sibling_key);

        let child_is_leaf = self.node(child_id).is_some_and(|child| child.is_leaf());
        if !child_is_leaf {
            let moved = self.node_mut(sibling_id).and_then(|sibling| {
                if sibling.children.is_empty() {
                    None
                } else {
                    Some(sibling.children.remove(0))
                }
            });
            if let Some(moved_id) = moved {
                if let Some(child) = self.node_mut(child_id) {
                    child.children.push(moved_id);
                }
                self.set_parent(moved_id, Some(child_id));
            }
        }

        let removed = self.node_mut(sibling_id).and_then(|sibling| {
            if sibling.keys.is_empty() {
                None
            } else {
                Some(sibling.keys.remove(0))
            }
        });
        if let Some(key) = removed {
            self.emit(TreeEvent::KeyDeleted {
                node: sibling_id,
                key,
            });
        }
    }

    /// Merges the children either side of the separator at `index`: the
    /// separator sinks into the left child, which absorbs the right child's
    /// keys and children, and the right child is destroyed.
    pub(crate) fn merge_children(&mut self, parent_id: NodeId, index: usize) {
        let Some(parent) = self.node(parent_id) else {
            return;
        };
        let (Some(&left_id), Some(&right_id)) =
            (parent.children.get(index), parent.children.get(index + 1))
        else {
            return;
        };
        let Some(separator) = parent.keys.get(index).cloned() else {
            return;
        };
        let level = self.node_level(right_id);

        let mut inserted: Vec<(K, usize)> = Vec::new();
        let mut moved_children: Vec<NodeId> = Vec::new();
        if let Some((left, right)) = self.node_pair_mut(left_id, right_id) {
            inserted.push((separator.clone(), left.keys.len()));
            left.keys.push(separator.clone());
            for key in right.keys.drain(..) {
                inserted.push((key.clone(), left.keys.len()));
                left.keys.push(key);
            }
            moved_children = right.children.drain(..).collect();
            left.children.extend(moved_children.iter().copied());
        }
        debug!(left = %left_id, right = %right_id, level, "merged children");

        for child in moved_children {
            self.set_parent(child, Some(left_id));
        }
        for (key, key_index) in inserted {
            self.emit(TreeEvent::KeyInserted {
                node: left_id,
                key,
                index: key_index,
            });
        }

        // Drop the sunk separator and the absorbed child from the parent.
        let removed = self.node_mut(parent_id).and_then(|parent| {
            if index < parent.keys.len() {
                let key = parent.keys.remove(index);
                if index + 1 < parent.children.len() {
                    parent.children.remove(index + 1);
                }
                Some(key)
            } else {
                None
            }
        });
        if let Some(key) = removed {
            self.emit(TreeEvent::KeyDeleted {
                node: parent_id,
                key,
            });
        }

        self.emit(TreeEvent::NodeDeleted {
            node: right_id,
            level,
        });
        self.release_node(right_id);
    }
}
