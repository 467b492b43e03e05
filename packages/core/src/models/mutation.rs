//! Mutation Types
//!
//! A [`Mutation`] is an immutable description of one atomic change to a
//! node. Mutations are appended to the graph's transaction log in staging
//! order and are never reordered or edited afterwards.
//!
//! A [`StagedMutation`] pairs the mutation with the snapshot of the node
//! taken immediately after the mutation was applied (for deletes: the last
//! snapshot before deletion). The snapshot is what store backends persist
//! and what the predicate engine evaluates at dispatch time, so watchers
//! observe each node exactly as it was at that point in the batch, not as it
//! ended up after later mutations.

use crate::models::node::{LocalId, Node, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// One atomic change to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mutation {
    /// A new node entered the graph
    Insert,

    /// A property was set; `old_value` is `None` for a first write
    #[serde(rename_all = "camelCase")]
    UpdateProperty {
        key: String,
        old_value: Option<Value>,
        new_value: Value,
    },

    /// A property was removed
    #[serde(rename_all = "camelCase")]
    DeleteProperty { key: String, old_value: Value },

    /// The node joined a group
    InsertGroup { group: String },

    /// The node left a group
    RemoveGroup { group: String },

    /// Relationship or Action link fields changed (post-change values)
    #[serde(rename_all = "camelCase")]
    SetLinks {
        subject: Option<NodeId>,
        object: Option<NodeId>,
        subjects: BTreeSet<NodeId>,
        objects: BTreeSet<NodeId>,
    },

    /// The node was deleted
    Delete,
}

/// A mutation staged for the next commit, carrying the node snapshot the
/// store persists and the watch layer evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedMutation {
    /// Node state immediately after this mutation (before it, for deletes)
    pub snapshot: Node,

    /// The change itself
    pub mutation: Mutation,
}

impl StagedMutation {
    /// Correlation key of the affected node.
    pub fn local(&self) -> &LocalId {
        &self.snapshot.local
    }

    /// Store id of the affected node, if already assigned.
    pub fn node_id(&self) -> Option<&NodeId> {
        self.snapshot.id.as_ref()
    }

    /// Kind of the affected node.
    pub fn node_kind(&self) -> NodeKind {
        self.snapshot.kind
    }

    /// Whether this staged mutation inserts a new node.
    pub fn is_insert(&self) -> bool {
        matches!(self.mutation, Mutation::Insert)
    }
}
