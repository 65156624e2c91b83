//! Error types for tree operations
//!
//! Simple, flat error hierarchy. No over-engineering.
//!
//! Use-after-free is a typed error here, not undefined behavior: a stale
//! `NodeId` (its slot was freed, possibly reused) always resolves to
//! `StaleNode`.

use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("stale node reference: {0:?} (node was freed)")]
    StaleNode(NodeId),

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0:?} is still attached to a tree and cannot be freed")]
    NotDetached(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("inserting {0:?} here would create a cycle")]
    CycleDetected(NodeId),

    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("invalid markup fragment: {0}")]
    InvalidFragment(String),
}
