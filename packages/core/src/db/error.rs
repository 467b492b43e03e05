//! Store Error Types
//!
//! This module defines error types for store operations, providing clear
//! error handling for write, read, and timeout failures. Service-level
//! failures (stale nodes, validation, predicates) are handled by the
//! service-layer error types.

use thiserror::Error;

/// Store operation errors
///
/// Covers all failure cases the abstract store can surface. A timed-out
/// store call is a dedicated variant so callers can distinguish it from a
/// hard write failure while still treating both as commit failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A batch write was rejected or failed
    #[error("Store write failed: {context}")]
    WriteFailed { context: String },

    /// A record read failed
    #[error("Store read failed: {context}")]
    LoadFailed { context: String },

    /// A store call exceeded the caller-configured timeout
    #[error("Store call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Record serialization/deserialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific error with context
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a write failure with context
    pub fn write_failed(context: impl Into<String>) -> Self {
        Self::WriteFailed {
            context: context.into(),
        }
    }

    /// Create a read failure with context
    pub fn load_failed(context: impl Into<String>) -> Self {
        Self::LoadFailed {
            context: context.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
