//! GraphStore Trait - Store Abstraction Layer
//!
//! This module defines the `GraphStore` trait that abstracts record
//! persistence for the graph. The commit pipeline only ever talks to this
//! trait, so durable backends can be swapped without touching the staging,
//! predicate, or dispatch logic. The crate ships [`MemoryStore`] as the
//! reference implementation; durable backends live outside this crate.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: both methods are async so embedded and networked
//!    backends share one interface
//! 2. **Batch Writes**: `stage_write` receives the whole drained batch and
//!    must apply it atomically - a failed batch leaves no partial state
//!    observable through `load`
//! 3. **Store-Assigned Ids**: node ids are assigned by the store at first
//!    insert and reported back through the receipt, keyed by the node's
//!    session-local correlation id
//!
//! [`MemoryStore`]: crate::db::MemoryStore

use crate::db::error::StoreError;
use crate::models::{CommitId, LocalId, Node, NodeId, StagedMutation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Receipt for one accepted batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReceipt {
    /// Identifier the store assigned to this batch
    pub commit_id: CommitId,

    /// Ids assigned to newly inserted nodes, keyed by their session-local
    /// correlation id, in the relative order the inserts appear in the batch
    pub assigned: Vec<(LocalId, NodeId)>,
}

/// Abstraction layer for graph record persistence
///
/// Implementations must be `Send + Sync`: the commit pipeline calls them
/// from async contexts where futures move between threads.
///
/// # Atomicity
///
/// `stage_write` is all-or-nothing. If any mutation in the batch cannot be
/// applied the implementation must return an error and leave previously
/// committed state untouched; the pipeline dispatches no events for a
/// failed batch.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply an ordered batch of staged mutations.
    ///
    /// Inserts receive store-assigned ids, reported in the receipt in the
    /// same relative order as the inserts in `batch`. Mutations that refer
    /// to a node inserted earlier in the same batch carry no id yet; the
    /// implementation resolves them through the node's `local` key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the batch cannot be applied as a whole.
    async fn stage_write(&self, batch: &[StagedMutation]) -> Result<StoreReceipt, StoreError>;

    /// Load a record by id.
    ///
    /// Returns `Ok(None)` for ids that were never assigned or whose node
    /// has been deleted - this is what makes relationship links weak.
    async fn load(&self, id: &str) -> Result<Option<Node>, StoreError>;
}
