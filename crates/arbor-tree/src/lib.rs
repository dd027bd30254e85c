//! Balanced multi-way tree engines for Arbor.
//!
//! This crate provides:
//! - A B+-tree with copy-up separators, a linked leaf chain, and
//!   repair-after-descent deletion (merge or redistribute on underflow)
//! - A classical B-tree with moved-up separators, predecessor/successor
//!   replacement for internal deletes, and pre-emptive fill-ahead deletion
//! - An arena-backed node model with stable node ids and O(1) parent lookup
//! - A synchronous change-notification channel consumed by renderers and
//!   other downstream observers
//!
//! Both engines are single-threaded and non-reentrant: every public call runs
//! all structural repair to completion before returning, and events are
//! published in mutation order within the triggering call stack. Pacing,
//! batching, and scheduling are consumer concerns.

mod arena;
mod ordering;

pub mod bplus;
pub mod btree;
pub mod event;

pub use arbor_common::{
    ArborError, Connection, ConnectionKind, DuplicatePolicy, NodeId, Result, TreeConfig,
    TreeStatistics,
};
pub use bplus::BPlusTree;
pub use btree::BTree;
pub use event::{CreateNodeFn, Listener, NodeRole, TreeEvent};
