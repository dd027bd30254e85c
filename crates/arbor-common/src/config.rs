//! Configuration structures for the Arbor tree engines.

use crate::error::{ArborError, Result};
use serde::{Deserialize, Serialize};

/// How the B+-tree handles insertion of a key its owning leaf already holds.
///
/// The classical B-tree always rejects duplicates; this policy only affects
/// the B+-tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Inserting an existing key is a silent no-op (idempotent inserts).
    #[default]
    Reject,
    /// Equal keys may coexist; leaves become multi-value and keys within a
    /// node are non-descending rather than strictly ascending.
    Allow,
}

/// Configuration shared by both tree engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Fanout (order): maximum number of children of an internal node.
    /// Every node holds at most `fanout - 1` keys.
    pub fanout: usize,
    /// Duplicate-key handling for the B+-tree insert path.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            fanout: 4,
            duplicate_policy: DuplicatePolicy::Reject,
        }
    }
}

impl TreeConfig {
    /// Creates a configuration with the given fanout and default policy.
    pub fn with_fanout(fanout: usize) -> Self {
        Self {
            fanout,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// A fanout below 3 cannot satisfy the occupancy bounds (a split must
    /// leave both halves non-empty and still promote a key), so tree
    /// constructors reject it up front.
    pub fn validate(&self) -> Result<()> {
        if self.fanout < 3 {
            return Err(ArborError::InvalidFanout {
                fanout: self.fanout,
            });
        }
        Ok(())
    }

    /// Maximum number of keys any node may hold.
    pub fn max_keys(&self) -> usize {
        self.fanout - 1
    }
}
