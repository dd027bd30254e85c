//! Identifiers and small shared types for the Arbor tree engines.

use serde::{Deserialize, Serialize};

/// Stable identity of a tree node.
///
/// A `NodeId` indexes the owning tree's node arena. Ids are reused after a
/// node is destroyed by a merge or root collapse, but never while the node is
/// alive, so an id held across a mutation of the same tree remains valid as
/// long as the node itself survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the arena slot index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Structural statistics of a tree.
///
/// `height` counts the nodes on the leftmost root-to-leaf walk (an empty tree
/// has height 0); `node_count` is the number of live nodes found by a full
/// traversal. The two are computed by independent code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeStatistics {
    /// Number of levels, counting the root and the leaf.
    pub height: usize,
    /// Total number of live nodes.
    pub node_count: usize,
}

/// The role of an edge reported by `connections()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Parent-to-child pointer; `index` is the pointer slot in the parent.
    Child { index: usize },
    /// Leaf-chain link between adjacent leaves.
    LeafChain,
}

/// One edge of the structural graph a tree exposes to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Source node (the parent, or the left leaf for chain edges).
    pub parent: NodeId,
    /// Destination node.
    pub child: NodeId,
    /// Edge role.
    pub kind: ConnectionKind,
}
