//! B+-tree engine.
//!
//! Internal nodes hold copies of leaf keys and route descent; all payloads
//! live in leaves, which form a singly linked chain in key order. Insertion
//! splits overfull nodes and copies the right sibling's first key up (leaf
//! split) or moves the middle key up (internal split). Deletion repairs
//! underflow after the fact: the owning leaf is mutated first, then merges or
//! single-entry redistributions restore occupancy, propagating toward the
//! root. Ancestor separators track the smallest key of the leaf they route
//! to, so leaf deletes rewrite the stale copy in place.

mod node;

use arbor_common::{
    Connection, ConnectionKind, DuplicatePolicy, NodeId, Result, TreeConfig, TreeStatistics,
};
use tracing::debug;

use crate::arena::NodeArena;
use crate::event::{CreateNodeFn, Listener, NodeRole, Publisher, TreeEvent};
use crate::ordering::{exact_position, lower_bound, upper_bound};
use node::{BPlusNode, NodeKind};

/// A B+-tree over ordered keys with per-key payloads.
///
/// Single-threaded and non-reentrant: every public call runs all structural
/// repair to completion before returning. Expected misuse (removing an absent
/// key, inserting a duplicate under [`DuplicatePolicy::Reject`]) is a silent
/// no-op.
pub struct BPlusTree<K, V> {
    config: TreeConfig,
    arena: NodeArena<BPlusNode<K, V>>,
    root: Option<NodeId>,
    publisher: Publisher<K>,
    create_node_fn: Option<CreateNodeFn>,
}

impl<K, V> std::fmt::Debug for BPlusTree<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BPlusTree")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Creates an empty tree, validating the configuration.
    pub fn new(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            arena: NodeArena::new(),
            root: None,
            publisher: Publisher::new(),
            create_node_fn: None,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Registers a listener on the change-notification channel.
    pub fn subscribe(&mut self, listener: Listener<K>) {
        self.publisher.subscribe(listener);
    }

    /// Installs a hook invoked for each node allocation in place of the
    /// default [`TreeEvent::NodeAllocated`] emission.
    pub fn set_create_node_fn(&mut self, hook: CreateNodeFn) {
        self.create_node_fn = Some(hook);
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the leaf holding `key`, or `None` if the key is absent.
    ///
    /// Emits [`TreeEvent::NodeVisited`] for every node on the descent path.
    pub fn find(&mut self, key: &K) -> Option<NodeId> {
        let leaf_id = self.find_owning_leaf(key)?;
        let node = self.arena.get(leaf_id)?;
        exact_position(&node.keys, key).map(|_| leaf_id)
    }

    /// Returns the payload stored under `key`.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let leaf_id = self.find_owning_leaf(key)?;
        let node = self.arena.get(leaf_id)?;
        let index = exact_position(&node.keys, key)?;
        match &node.kind {
            NodeKind::Leaf { values, .. } => values.get(index),
            NodeKind::Internal { .. } => None,
        }
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Descends to the leaf that owns `key`: at each internal node the child
    /// immediately preceding the first key strictly greater than `key`.
    fn find_owning_leaf(&mut self, key: &K) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            self.emit(TreeEvent::NodeVisited { node: current });
            let node = self.arena.get(current)?;
            match &node.kind {
                NodeKind::Leaf { .. } => return Some(current),
                NodeKind::Internal { children } => {
                    let index = upper_bound(&node.keys, key);
                    current = children.get(index).or_else(|| children.last()).copied()?;
                }
            }
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts `key` with its payload.
    ///
    /// Under [`DuplicatePolicy::Reject`] inserting a key its owning leaf
    /// already holds is a no-op; under [`DuplicatePolicy::Allow`] equal keys
    /// coexist in the leaf chain.
    pub fn insert(&mut self, key: K, value: V) {
        let leaf_id = match self.root {
            None => {
                let id = self.allocate(BPlusNode::new_leaf());
                self.root = Some(id);
                self.emit(TreeEvent::RootCreated { node: id });
                debug!(root = %id, "created leaf root");
                id
            }
            Some(_) => match self.find_owning_leaf(&key) {
                Some(id) => id,
                None => return,
            },
        };

        if self.config.duplicate_policy == DuplicatePolicy::Reject {
            let duplicate = self
                .arena
                .get(leaf_id)
                .is_some_and(|node| exact_position(&node.keys, &key).is_some());
            if duplicate {
                return;
            }
        }

        self.leaf_insert(leaf_id, key, value);

        let overfull = self
            .arena
            .get(leaf_id)
            .is_some_and(|node| node.keys.len() > self.config.max_keys());
        if overfull {
            self.split_leaf(leaf_id);
        }
    }

    fn leaf_insert(&mut self, leaf_id: NodeId, key: K, value: V) {
        let Some(node) = self.arena.get_mut(leaf_id) else {
            return;
        };
        let BPlusNode { keys, kind, .. } = node;
        let NodeKind::Leaf { values, .. } = kind else {
            return;
        };
        let index = lower_bound(keys, &key);
        keys.insert(index, key.clone());
        values.insert(index, value);
        self.emit(TreeEvent::KeyInserted {
            node: leaf_id,
            key,
            index,
        });
    }

    /// Splits an overfull leaf, moving the upper half of its entries into a
    /// new right sibling and copying the sibling's first key up.
    fn split_leaf(&mut self, leaf_id: NodeId) {
        let right_id = self.allocate(BPlusNode::new_leaf());
        let level = self.node_level(leaf_id);
        self.emit(TreeEvent::NodeSplit {
            left: leaf_id,
            right: right_id,
            level,
        });

        let middle = self.config.fanout.div_ceil(2);
        let mut moved: Vec<K> = Vec::new();
        let mut separator: Option<K> = None;
        if let Some((left, right)) = self.arena.get_pair_mut(leaf_id, right_id) {
            let BPlusNode {
                keys: left_keys,
                kind: left_kind,
                ..
            } = left;
            let BPlusNode {
                keys: right_keys,
                kind: right_kind,
                ..
            } = right;
            if let (
                NodeKind::Leaf {
                    values: left_values,
                    next: left_next,
                },
                NodeKind::Leaf {
                    values: right_values,
                    next: right_next,
                },
            ) = (left_kind, right_kind)
            {
                if middle < left_keys.len() {
                    *right_keys = left_keys.split_off(middle);
                    *right_values = left_values.split_off(middle);
                    *right_next = left_next.take();
                    *left_next = Some(right_id);
                    moved = right_keys.clone();
                    separator = right_keys.first().cloned();
                }
            }
        }
        debug!(left = %leaf_id, right = %right_id, level, entries = moved.len(), "leaf split");

        for (index, key) in moved.iter().enumerate() {
            self.emit(TreeEvent::KeyInserted {
                node: right_id,
                key: key.clone(),
                index,
            });
        }
        for key in moved.into_iter().rev() {
            self.emit(TreeEvent::KeyDeleted { node: leaf_id, key });
        }

        let Some(separator) = separator else {
            return;
        };
        self.insert_parent(leaf_id, separator, right_id);
    }

    /// Hangs `new_id` to the right of `node_id` under their shared parent,
    /// creating a new root when `node_id` was the root and splitting the
    /// parent recursively when it overflows.
    fn insert_parent(&mut self, node_id: NodeId, key: K, new_id: NodeId) {
        if self.root == Some(node_id) {
            let root_id = self.allocate(BPlusNode::new_internal());
            self.emit(TreeEvent::RootCreated { node: root_id });
            debug!(root = %root_id, "promoted new internal root");
            if let Some(root) = self.arena.get_mut(root_id) {
                if let NodeKind::Internal { children } = &mut root.kind {
                    children.push(node_id);
                }
            }
            self.set_parent(node_id, Some(root_id));
            self.root = Some(root_id);
            self.internal_insert(root_id, key, new_id);
            return;
        }

        let Some(parent_id) = self.arena.get(node_id).and_then(|node| node.parent) else {
            return;
        };
        self.internal_insert(parent_id, key, new_id);

        let overfull = self
            .arena
            .get(parent_id)
            .is_some_and(|node| node.keys.len() > self.config.max_keys());
        if overfull {
            self.split_internal(parent_id);
        }
    }

    fn internal_insert(&mut self, node_id: NodeId, key: K, child_id: NodeId) {
        self.set_parent(child_id, Some(node_id));
        let Some(node) = self.arena.get_mut(node_id) else {
            return;
        };
        let BPlusNode { keys, kind, .. } = node;
        let NodeKind::Internal { children } = kind else {
            return;
        };
        let index = upper_bound(keys, &key);
        keys.insert(index, key.clone());
        children.insert(index + 1, child_id);
        self.emit(TreeEvent::KeyInserted {
            node: node_id,
            key,
            index,
        });
    }

    /// Splits an overfull internal node. Unlike the leaf case the middle key
    /// moves up: it is promoted and removed from both halves.
    fn split_internal(&mut self, node_id: NodeId) {
        let right_id = self.allocate(BPlusNode::new_internal());
        let level = self.node_level(node_id);
        self.emit(TreeEvent::NodeSplit {
            left: node_id,
            right: right_id,
            level,
        });

        let mut moved_keys: Vec<K> = Vec::new();
        let mut moved_children: Vec<NodeId> = Vec::new();
        let mut promoted: Option<K> = None;
        if let Some((left, right)) = self.arena.get_pair_mut(node_id, right_id) {
            let BPlusNode {
                keys: left_keys,
                kind: left_kind,
                ..
            } = left;
            let BPlusNode {
                keys: right_keys,
                kind: right_kind,
                ..
            } = right;
            if let (
                NodeKind::Internal {
                    children: left_children,
                },
                NodeKind::Internal {
                    children: right_children,
                },
            ) = (left_kind, right_kind)
            {
                let middle = left_keys.len() / 2;
                if left_keys.len() >= 2 {
                    *right_keys = left_keys.split_off(middle + 1);
                    *right_children = left_children.split_off(middle + 1);
                    promoted = left_keys.pop();
                    moved_keys = right_keys.clone();
                    moved_children = right_children.clone();
                }
            }
        }
        debug!(left = %node_id, right = %right_id, level, "internal split");

        for child in moved_children {
            self.set_parent(child, Some(right_id));
        }
        for (index, key) in moved_keys.iter().enumerate() {
            self.emit(TreeEvent::KeyInserted {
                node: right_id,
                key: key.clone(),
                index,
            });
        }
        for key in moved_keys.into_iter().rev() {
            self.emit(TreeEvent::KeyDeleted { node: node_id, key });
        }
        let Some(promoted) = promoted else {
            return;
        };
        self.emit(TreeEvent::KeyDeleted {
            node: node_id,
            key: promoted.clone(),
        });
        self.insert_parent(node_id, promoted, right_id);
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Removes `key` from the tree.
    ///
    /// Removing an absent key is a no-op, with one exception: a key absent
    /// from its owning non-empty leaf may survive as a stale separator copy
    /// in an ancestor, which is corrected to the leaf's current smallest key.
    pub fn remove(&mut self, key: &K) {
        let Some(leaf_id) = self.find_owning_leaf(key) else {
            return;
        };
        let Some(leaf) = self.arena.get(leaf_id) else {
            return;
        };
        if exact_position(&leaf.keys, key).is_none() {
            if let Some(smallest) = leaf.keys.first().cloned() {
                self.replace_separator(key, smallest);
            }
            return;
        }
        self.delete_entry(key, leaf_id);
    }

    fn delete_entry(&mut self, key: &K, node_id: NodeId) {
        self.node_delete(node_id, key);

        // Ancestors route by leaf keys, so removing a leaf's key must rewrite
        // the separator copy to the leaf's new smallest key.
        let new_smallest = self.arena.get(node_id).and_then(|node| {
            (node.is_leaf() && !node.keys.is_empty()).then(|| node.keys[0].clone())
        });
        if let Some(smallest) = new_smallest {
            self.replace_separator(key, smallest);
        }

        if self.handle_root_underflow(node_id) {
            return;
        }

        let underflowing = self
            .arena
            .get(node_id)
            .is_some_and(|node| node.keys.len() < node.min_keys(self.config.fanout));
        if underflowing {
            self.handle_underflow(node_id);
        }
    }

    /// Removes `key` from the node only if it sits at the exact computed
    /// position; a leaf drops the paired payload, an internal node drops the
    /// child to the key's right.
    fn node_delete(&mut self, node_id: NodeId, key: &K) {
        let Some(node) = self.arena.get_mut(node_id) else {
            return;
        };
        let Some(index) = exact_position(&node.keys, key) else {
            return;
        };
        let removed = node.keys.remove(index);
        match &mut node.kind {
            NodeKind::Leaf { values, .. } => {
                if index < values.len() {
                    values.remove(index);
                }
            }
            NodeKind::Internal { children } => {
                if index + 1 < children.len() {
                    children.remove(index + 1);
                }
            }
        }
        self.emit(TreeEvent::KeyDeleted {
            node: node_id,
            key: removed,
        });
    }

    /// Rewrites the separator copy of `old` in the nearest ancestor holding
    /// one, walking `old`'s descent path from the root.
    fn replace_separator(&mut self, old: &K, new: K) {
        let Some(mut current) = self.root else {
            return;
        };
        loop {
            let Some(node) = self.arena.get(current) else {
                return;
            };
            let NodeKind::Internal { children } = &node.kind else {
                return;
            };
            if let Some(index) = exact_position(&node.keys, old) {
                self.replace_key_at(current, index, new);
                return;
            }
            let index = upper_bound(&node.keys, old);
            current = match children.get(index) {
                Some(&child) => child,
                None => return,
            };
        }
    }

    fn replace_key_at(&mut self, node_id: NodeId, index: usize, new_key: K) {
        let Some(node) = self.arena.get_mut(node_id) else {
            return;
        };
        let Some(slot) = node.keys.get_mut(index) else {
            return;
        };
        let old_key = std::mem::replace(slot, new_key.clone());
        self.emit(TreeEvent::KeyReplaced {
            node: node_id,
            old_key,
            new_key,
        });
    }

    /// Collapses the root when deletion empties it: an empty leaf root ends
    /// the tree, an internal root left with a single child loses a level.
    fn handle_root_underflow(&mut self, node_id: NodeId) -> bool {
        if self.root != Some(node_id) {
            return false;
        }
        let Some(node) = self.arena.get(node_id) else {
            return false;
        };
        let replacement = match &node.kind {
            NodeKind::Leaf { .. } if node.keys.is_empty() => Some(None),
            NodeKind::Internal { children } if children.len() == 1 => Some(Some(children[0])),
            _ => None,
        };
        let Some(new_root) = replacement else {
            return false;
        };

        self.emit(TreeEvent::RootDeleted { node: node_id });
        self.arena.release(node_id);
        self.root = new_root;
        if let Some(child) = new_root {
            self.set_parent(child, None);
            debug!(old = %node_id, new = %child, "root collapsed");
        } else {
            debug!(old = %node_id, "tree emptied");
        }
        true
    }

    /// Resolves underflow by merging with the adjacent sibling when the union
    /// fits in one node, or by rotating a single entry across the separator
    /// boundary otherwise. Prefers the left sibling; the first child pairs
    /// with its right sibling.
    fn handle_underflow(&mut self, node_id: NodeId) {
        let Some(parent_id) = self.arena.get(node_id).and_then(|node| node.parent) else {
            return;
        };
        let Some(parent) = self.arena.get(parent_id) else {
            return;
        };
        let NodeKind::Internal { children } = &parent.kind else {
            return;
        };
        let Some(index) = children.iter().position(|&child| child == node_id) else {
            return;
        };

        let (left_id, right_id, separator_index) = if index > 0 {
            (children[index - 1], node_id, index - 1)
        } else {
            let Some(&right) = children.get(index + 1) else {
                return;
            };
            (node_id, right, index)
        };

        let Some(left) = self.arena.get(left_id) else {
            return;
        };
        let Some(right) = self.arena.get(right_id) else {
            return;
        };
        let total = left.keys.len() + right.keys.len() + usize::from(!left.is_leaf());

        if total <= self.config.max_keys() {
            self.merge_siblings(parent_id, left_id, right_id, separator_index);
        } else {
            self.redistribute(node_id, parent_id, left_id, right_id, separator_index);
        }
    }

    /// Absorbs the right sibling into the left one. Internal merges sink the
    /// parent separator between the halves; leaf merges discard it (the
    /// routing copy is no longer needed). The separator is then deleted from
    /// the parent recursively, which is how underflow propagates upward.
    fn merge_siblings(
        &mut self,
        parent_id: NodeId,
        left_id: NodeId,
        right_id: NodeId,
        separator_index: usize,
    ) {
        let Some(separator) = self
            .arena
            .get(parent_id)
            .and_then(|parent| parent.keys.get(separator_index).cloned())
        else {
            return;
        };
        let level = self.node_level(right_id);

        let mut inserted: Vec<(K, usize)> = Vec::new();
        let mut moved_children: Vec<NodeId> = Vec::new();
        {
            let Some((left, right)) = self.arena.get_pair_mut(left_id, right_id) else {
                return;
            };
            let BPlusNode {
                keys: left_keys,
                kind: left_kind,
                ..
            } = left;
            let BPlusNode {
                keys: right_keys,
                kind: right_kind,
                ..
            } = right;
            match (left_kind, right_kind) {
                (
                    NodeKind::Leaf {
                        values: left_values,
                        next: left_next,
                    },
                    NodeKind::Leaf {
                        values: right_values,
                        next: right_next,
                    },
                ) => {
                    for key in right_keys.drain(..) {
                        inserted.push((key.clone(), left_keys.len()));
                        left_keys.push(key);
                    }
                    left_values.append(right_values);
                    *left_next = right_next.take();
                }
                (
                    NodeKind::Internal {
                        children: left_children,
                    },
                    NodeKind::Internal {
                        children: right_children,
                    },
                ) => {
                    inserted.push((separator.clone(), left_keys.len()));
                    left_keys.push(separator.clone());
                    for key in right_keys.drain(..) {
                        inserted.push((key.clone(), left_keys.len()));
                        left_keys.push(key);
                    }
                    moved_children = right_children.drain(..).collect();
                    left_children.extend(moved_children.iter().copied());
                }
                // Siblings always share a role.
                _ => return,
            }
        }
        debug!(left = %left_id, right = %right_id, level, "merged siblings");

        for child in moved_children {
            self.set_parent(child, Some(left_id));
        }
        for (key, index) in inserted {
            self.emit(TreeEvent::KeyInserted {
                node: left_id,
                key,
                index,
            });
        }
        self.emit(TreeEvent::NodeDeleted {
            node: right_id,
            level,
        });
        self.arena.release(right_id);

        self.delete_entry(&separator, parent_id);
    }

    /// Rotates exactly one entry across the separator boundary and rewrites
    /// the parent separator to the new boundary. Leaves move a key/payload
    /// pair directly; internal nodes sink the separator and promote the
    /// sibling's boundary key in its place.
    fn redistribute(
        &mut self,
        node_id: NodeId,
        parent_id: NodeId,
        left_id: NodeId,
        right_id: NodeId,
        separator_index: usize,
    ) {
        let Some(separator) = self
            .arena
            .get(parent_id)
            .and_then(|parent| parent.keys.get(separator_index).cloned())
        else {
            return;
        };
        let borrow_from_left = node_id == right_id;
        let sibling_id = if borrow_from_left { left_id } else { right_id };

        let mut pre_events: Vec<TreeEvent<K>> = Vec::new();
        let mut post_events: Vec<TreeEvent<K>> = Vec::new();
        let mut new_separator: Option<K> = None;
        let mut moved_child: Option<NodeId> = None;
        {
            let Some((sibling, node)) = self.arena.get_pair_mut(sibling_id, node_id) else {
                return;
            };
            let BPlusNode {
                keys: sibling_keys,
                kind: sibling_kind,
                ..
            } = sibling;
            let BPlusNode {
                keys: node_keys,
                kind: node_kind,
                ..
            } = node;
            match (sibling_kind, node_kind) {
                (
                    NodeKind::Leaf {
                        values: sibling_values,
                        ..
                    },
                    NodeKind::Leaf {
                        values: node_values,
                        ..
                    },
                ) => {
                    if borrow_from_left {
                        let (Some(key), Some(value)) = (sibling_keys.pop(), sibling_values.pop())
                        else {
                            return;
                        };
                        node_keys.insert(0, key.clone());
                        node_values.insert(0, value);
                        pre_events.push(TreeEvent::KeyDeleted {
                            node: sibling_id,
                            key: key.clone(),
                        });
                        pre_events.push(TreeEvent::KeyInserted {
                            node: node_id,
                            key: key.clone(),
                            index: 0,
                        });
                        new_separator = Some(key);
                    } else {
                        if sibling_keys.is_empty() || sibling_values.is_empty() {
                            return;
                        }
                        let key = sibling_keys.remove(0);
                        let value = sibling_values.remove(0);
                        let index = node_keys.len();
                        node_keys.push(key.clone());
                        node_values.push(value);
                        pre_events.push(TreeEvent::KeyDeleted {
                            node: sibling_id,
                            key: key.clone(),
                        });
                        pre_events.push(TreeEvent::KeyInserted {
                            node: node_id,
                            key,
                            index,
                        });
                        new_separator = sibling_keys.first().cloned();
                    }
                }
                (
                    NodeKind::Internal {
                        children: sibling_children,
                    },
                    NodeKind::Internal {
                        children: node_children,
                    },
                ) => {
                    if borrow_from_left {
                        let (Some(sibling_key), Some(child)) =
                            (sibling_keys.pop(), sibling_children.pop())
                        else {
                            return;
                        };
                        node_keys.insert(0, separator.clone());
                        node_children.insert(0, child);
                        moved_child = Some(child);
                        pre_events.push(TreeEvent::KeyInserted {
                            node: node_id,
                            key: separator.clone(),
                            index: 0,
                        });
                        post_events.push(TreeEvent::KeyDeleted {
                            node: sibling_id,
                            key: sibling_key.clone(),
                        });
                        new_separator = Some(sibling_key);
                    } else {
                        if sibling_keys.is_empty() || sibling_children.is_empty() {
                            return;
                        }
                        let sibling_key = sibling_keys.remove(0);
                        let child = sibling_children.remove(0);
                        let index = node_keys.len();
                        node_keys.push(separator.clone());
                        node_children.push(child);
                        moved_child = Some(child);
                        pre_events.push(TreeEvent::KeyInserted {
                            node: node_id,
                            key: separator.clone(),
                            index,
                        });
                        post_events.push(TreeEvent::KeyDeleted {
                            node: sibling_id,
                            key: sibling_key.clone(),
                        });
                        new_separator = Some(sibling_key);
                    }
                }
                _ => return,
            }
        }
        debug!(node = %node_id, sibling = %sibling_id, "redistributed one entry");

        if let Some(child) = moved_child {
            self.set_parent(child, Some(node_id));
        }
        for event in pre_events {
            self.emit(event);
        }
        if let Some(new_key) = new_separator {
            self.replace_key_at(parent_id, separator_index, new_key);
        }
        for event in post_events {
            self.emit(event);
        }
    }

    // =========================================================================
    // Structure queries
    // =========================================================================

    /// Depth of a node below the root; the root is level 0.
    pub fn node_level(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut current = id;
        while let Some(parent) = self.arena.get(current).and_then(|node| node.parent) {
            level += 1;
            current = parent;
        }
        level
    }

    /// Height by leftmost descent and node count by full traversal; the two
    /// are computed by independent code paths.
    pub fn statistics(&self) -> TreeStatistics {
        let mut height = 0;
        let mut current = self.root;
        while let Some(id) = current {
            let Some(node) = self.arena.get(id) else {
                break;
            };
            height += 1;
            current = match &node.kind {
                NodeKind::Internal { children } => children.first().copied(),
                NodeKind::Leaf { .. } => None,
            };
        }

        let mut node_count = 0;
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            node_count += 1;
            if let NodeKind::Internal { children } = &node.kind {
                stack.extend(children.iter().copied());
            }
        }

        TreeStatistics { height, node_count }
    }

    /// Every parent/child edge plus the leaf-chain edges, for consumers that
    /// render the structural graph.
    pub fn connections(&self) -> Vec<Connection> {
        let mut connections = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            if let NodeKind::Internal { children } = &node.kind {
                for (index, &child) in children.iter().enumerate() {
                    connections.push(Connection {
                        parent: id,
                        child,
                        kind: ConnectionKind::Child { index },
                    });
                    stack.push(child);
                }
            }
        }

        let mut current = self.leftmost_leaf();
        while let Some(id) = current {
            let next = self.next_leaf(id);
            if let Some(next_id) = next {
                connections.push(Connection {
                    parent: id,
                    child: next_id,
                    kind: ConnectionKind::LeafChain,
                });
            }
            current = next;
        }
        connections
    }

    pub fn node_keys(&self, id: NodeId) -> Option<&[K]> {
        self.arena.get(id).map(|node| node.keys.as_slice())
    }

    /// Child ids of a node; empty for leaves.
    pub fn node_children(&self, id: NodeId) -> Option<&[NodeId]> {
        match &self.arena.get(id)?.kind {
            NodeKind::Internal { children } => Some(children),
            NodeKind::Leaf { .. } => Some(&[]),
        }
    }

    /// The leaf following `id` in the leaf chain.
    pub fn next_leaf(&self, id: NodeId) -> Option<NodeId> {
        match &self.arena.get(id)?.kind {
            NodeKind::Leaf { next, .. } => *next,
            NodeKind::Internal { .. } => None,
        }
    }

    /// Ascending traversal of all entries over the leaf chain.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            leaf: self.leftmost_leaf(),
            index: 0,
        }
    }

    fn leftmost_leaf(&self) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            match &self.arena.get(current)?.kind {
                NodeKind::Leaf { .. } => return Some(current),
                NodeKind::Internal { children } => current = *children.first()?,
            }
        }
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn allocate(&mut self, node: BPlusNode<K, V>) -> NodeId {
        let role = if node.is_leaf() {
            NodeRole::Leaf
        } else {
            NodeRole::Internal
        };
        let id = self.arena.allocate(node);
        match self.create_node_fn.take() {
            Some(mut hook) => {
                hook(id, role);
                self.create_node_fn = Some(hook);
            }
            None => self.emit(TreeEvent::NodeAllocated { node: id }),
        }
        id
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.arena.get_mut(id) {
            node.parent = parent;
        }
    }

    fn emit(&mut self, event: TreeEvent<K>) {
        self.publisher.notify_all(&event);
    }
}

/// Ascending iterator over the leaf chain.
pub struct Iter<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeId>,
    index: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf_id = self.leaf?;
            let node = self.tree.arena.get(leaf_id)?;
            let NodeKind::Leaf { values, next } = &node.kind else {
                return None;
            };
            if self.index < node.keys.len() && self.index < values.len() {
                let index = self.index;
                self.index += 1;
                return Some((&node.keys[index], &values[index]));
            }
            self.leaf = *next;
            self.index = 0;
        }
    }
}
