//! Classical B-tree engine.
//!
//! A single node kind whose role is inferred from the presence of children:
//! internal nodes store actual keys, not copies, so deleting an internal key
//! replaces it with a predecessor or successor pulled from a leaf. Underflow
//! repair is pre-emptive: before descending into a child at minimum
//! occupancy, the deleter fills it by borrowing from a sibling or merging,
//! so no ancestor ever has to be revisited on the way back up.
//!
//! The engine is composed of three collaborating roles split across impl
//! files: `search.rs` (descent and lookup), `insert.rs` (insert, split, and
//! parent promotion), `delete.rs` (delete, borrow, merge, and fill).

mod delete;
mod insert;
mod search;

use arbor_common::{Connection, ConnectionKind, NodeId, Result, TreeConfig, TreeStatistics};

use crate::arena::NodeArena;
use crate::event::{CreateNodeFn, Listener, NodeRole, Publisher, TreeEvent};

/// A single B-tree node; a node with no children is a leaf.
pub(crate) struct BTreeNode<K> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) keys: Vec<K>,
    pub(crate) children: Vec<NodeId>,
}

impl<K> BTreeNode<K> {
    pub(crate) fn new() -> Self {
        Self {
            parent: None,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A classical B-tree over ordered keys.
///
/// Single-threaded and non-reentrant; duplicate inserts and absent-key
/// removals are silent no-ops.
pub struct BTree<K> {
    config: TreeConfig,
    arena: NodeArena<BTreeNode<K>>,
    root: Option<NodeId>,
    publisher: Publisher<K>,
    create_node_fn: Option<CreateNodeFn>,
}

impl<K> std::fmt::Debug for BTree<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<K: Ord + Clone> BTree<K> {
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

    /// Minimum keys a non-root node must hold.
    pub(crate) fn min_keys(&self) -> usize {
        self.config.fanout.div_ceil(2) - 1
    }

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
            current = node.children.first().copied();
        }

        let mut node_count = 0;
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            node_count += 1;
            stack.extend(node.children.iter().copied());
        }

        TreeStatistics { height, node_count }
    }

    /// Every parent/child edge, for consumers that render the structural
    /// graph. B-trees have no leaf chain.
    pub fn connections(&self) -> Vec<Connection> {
        let mut connections = Vec::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            for (index, &child) in node.children.iter().enumerate() {
                connections.push(Connection {
                    parent: id,
                    child,
                    kind: ConnectionKind::Child { index },
                });
                stack.push(child);
            }
        }
        connections
    }

    pub fn node_keys(&self, id: NodeId) -> Option<&[K]> {
        self.arena.get(id).map(|node| node.keys.as_slice())
    }

    /// Child ids of a node; empty for leaves.
    pub fn node_children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.arena.get(id).map(|node| node.children.as_slice())
    }

    // =========================================================================
    // Plumbing shared by the three roles
    // =========================================================================

    pub(crate) fn allocate_node(&mut self) -> NodeId {
        let id = self.arena.allocate(BTreeNode::new());
        // A B-tree node's role is inferred from its children; every node is
        // born empty, so the hook always observes a leaf.
        match self.create_node_fn.take() {
            Some(mut hook) => {
                hook(id, NodeRole::Leaf);
                self.create_node_fn = Some(hook);
            }
            None => self.emit(TreeEvent::NodeAllocated { node: id }),
        }
        id
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.arena.get_mut(id) {
            node.parent = parent;
        }
    }

    pub(crate) fn emit(&mut self, event: TreeEvent<K>) {
        self.publisher.notify_all(&event);
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&BTreeNode<K>> {
        self.arena.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut BTreeNode<K>> {
        self.arena.get_mut(id)
    }

    pub(crate) fn node_pair_mut(
        &mut self,
        a: NodeId,
        b: NodeId,
    ) -> Option<(&mut BTreeNode<K>, &mut BTreeNode<K>)> {
        self.arena.get_pair_mut(a, b)
    }

    pub(crate) fn release_node(&mut self, id: NodeId) {
        self.arena.release(id);
    }

    /// Replaces the key at `index` in place, leaving children untouched.
    pub(crate) fn replace_key_at(&mut self, node_id: NodeId, index: usize, new_key: K) {
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
}
