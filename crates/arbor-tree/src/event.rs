//! Change-notification channel.
//!
//! Every structural mutation a tree performs publishes one typed event,
//! synchronously and in mutation order, to the tree's subscribers. The
//! channel is the entire contract between the engines and any rendering or
//! animation layer: a tree reaches its final, fully repaired state by the
//! time the triggering call returns, regardless of how slowly consumers
//! process the stream. The engines never batch, reorder, or schedule.

use arbor_common::NodeId;

/// Whether a newly allocated node is a leaf or an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Leaf,
    Internal,
}

/// A structural change published by a tree.
///
/// Events carry node ids and key copies; consumers needing a per-node stream
/// filter on the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent<K> {
    /// A node was allocated (suppressed when a create-node hook is set).
    NodeAllocated { node: NodeId },
    /// A node became the root, either as the first node of an empty tree or
    /// by promotion above a split root.
    RootCreated { node: NodeId },
    /// A split created `right` as the new sibling of `left`.
    NodeSplit {
        left: NodeId,
        right: NodeId,
        level: usize,
    },
    /// The root was removed: the tree became empty or lost a level.
    RootDeleted { node: NodeId },
    /// A merge absorbed `node`; `level` is its depth at the time of removal.
    NodeDeleted { node: NodeId, level: usize },
    /// A key entered `node` at `index`.
    KeyInserted {
        node: NodeId,
        key: K,
        index: usize,
    },
    /// A key left `node`.
    KeyDeleted { node: NodeId, key: K },
    /// A separator key was rewritten in place; pointers are untouched.
    KeyReplaced {
        node: NodeId,
        old_key: K,
        new_key: K,
    },
    /// A node was visited during descent or lookup.
    NodeVisited { node: NodeId },
}

/// A subscriber callback.
pub type Listener<K> = Box<dyn FnMut(&TreeEvent<K>)>;

/// Hook invoked for each node allocation in place of the default
/// [`TreeEvent::NodeAllocated`] emission.
pub type CreateNodeFn = Box<dyn FnMut(NodeId, NodeRole)>;

/// Subscription list delivering events in registration order.
pub(crate) struct Publisher<K> {
    listeners: Vec<Listener<K>>,
}

impl<K> Publisher<K> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are never deregistered; a tree and its
    /// subscribers share a lifetime.
    pub(crate) fn subscribe(&mut self, listener: Listener<K>) {
        self.listeners.push(listener);
    }

    /// Delivers `event` to every subscriber, synchronously.
    pub(crate) fn notify_all(&mut self, event: &TreeEvent<K>) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}
