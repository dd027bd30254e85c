//! Arbor common types, errors, and configuration.
//!
//! This crate provides shared definitions used by both tree engines.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DuplicatePolicy, TreeConfig};
pub use error::{ArborError, Result};
pub use types::{Connection, ConnectionKind, NodeId, TreeStatistics};
