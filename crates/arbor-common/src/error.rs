//! Error types for the Arbor tree engines.

use thiserror::Error;

/// Result type alias using ArborError.
pub type Result<T> = std::result::Result<T, ArborError>;

/// Errors that can occur when constructing an Arbor tree.
///
/// The engines themselves never raise errors for expected misuse: deleting an
/// absent key, inserting a duplicate under a rejecting policy, or repairing a
/// node with no parent are all silent no-ops. Errors are reserved for
/// construction-time validation.
#[derive(Debug, Error)]
pub enum ArborError {
    #[error("invalid fanout {fanout}: a multi-way tree requires fanout >= 3")]
    InvalidFanout { fanout: usize },
}
