//! Service Layer Error Types
//!
//! This module defines error types for graph session operations, chaining
//! the model-level validation errors and store-level failures into one
//! service taxonomy.

use crate::db::StoreError;
use crate::models::{NodeKind, ValidationError};
use thiserror::Error;

/// Graph session errors
///
/// Staging failures (`StaleNode`, `Validation`, `WrongKind`) surface
/// synchronously from the mutating call and leave the transaction log
/// untouched. Store failures only ever surface through a commit outcome.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The node has been deleted; deletion is terminal
    #[error("Node has been deleted and can no longer be mutated")]
    StaleNode,

    /// Node-level validation failed (empty type, key, or group name)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An operation was applied to the wrong node kind
    #[error("Operation requires a {expected:?} node, got {actual:?}")]
    WrongKind { expected: NodeKind, actual: NodeKind },

    /// A watch was built with a malformed or missing predicate
    #[error("Invalid predicate: {0}")]
    Predicate(String),

    /// The underlying store failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl GraphError {
    /// Whether this error wraps a store timeout.
    pub fn is_store_timeout(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_timeout())
    }
}
