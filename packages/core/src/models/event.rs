//! Domain Events
//!
//! This module defines the typed events produced by a successful commit.
//! Each accepted mutation becomes exactly one [`Event`], in staging order,
//! and the whole ordered sequence is handed to the watch registry for
//! dispatch. No events exist for a failed commit.
//!
//! The `node` field is the snapshot captured when the mutation was staged
//! (with the store-assigned id patched in for nodes inserted by the same
//! commit), so a subscriber sees the node exactly as it was at that point in
//! the batch. Delete events carry the last snapshot before deletion, which
//! is also what predicates are evaluated against.

use crate::models::mutation::{Mutation, StagedMutation};
use crate::models::node::{CommitId, Node, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Event kinds a watch can subscribe to.
///
/// Property inserts, updates, and deletes all surface as `Update`; the
/// payload's `old_value`/`new_value` distinguish them (`None` on the side
/// that does not exist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
    GroupAdd,
    GroupRemove,
}

/// Kind-specific event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventPayload {
    /// The node entered the graph
    Inserted,

    /// A property changed; insert when `old_value` is `None`, delete when
    /// `new_value` is `None`
    #[serde(rename_all = "camelCase")]
    Property {
        key: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },

    /// Group membership changed
    Group { group: String },

    /// Link fields changed (post-change values)
    #[serde(rename_all = "camelCase")]
    Links {
        subject: Option<NodeId>,
        object: Option<NodeId>,
        subjects: BTreeSet<NodeId>,
        objects: BTreeSet<NodeId>,
    },

    /// The node left the graph
    Deleted,
}

/// One committed mutation, as delivered to matching watches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Which callback set this event targets
    pub kind: EventKind,

    /// Kind of the affected node
    pub node_kind: NodeKind,

    /// Node snapshot at this point in the batch
    pub node: Node,

    /// Kind-specific change details
    pub payload: EventPayload,

    /// The commit this event belongs to
    pub commit_id: CommitId,
}

impl Event {
    /// Build the event for one accepted staged mutation.
    pub(crate) fn from_staged(staged: StagedMutation, commit_id: &CommitId) -> Self {
        let StagedMutation { snapshot, mutation } = staged;
        let (kind, payload) = match mutation {
            Mutation::Insert => (EventKind::Insert, EventPayload::Inserted),
            Mutation::UpdateProperty {
                key,
                old_value,
                new_value,
            } => (
                EventKind::Update,
                EventPayload::Property {
                    key,
                    old_value,
                    new_value: Some(new_value),
                },
            ),
            Mutation::DeleteProperty { key, old_value } => (
                EventKind::Update,
                EventPayload::Property {
                    key,
                    old_value: Some(old_value),
                    new_value: None,
                },
            ),
            Mutation::InsertGroup { group } => (EventKind::GroupAdd, EventPayload::Group { group }),
            Mutation::RemoveGroup { group } => {
                (EventKind::GroupRemove, EventPayload::Group { group })
            }
            Mutation::SetLinks {
                subject,
                object,
                subjects,
                objects,
            } => (
                EventKind::Update,
                EventPayload::Links {
                    subject,
                    object,
                    subjects,
                    objects,
                },
            ),
            Mutation::Delete => (EventKind::Delete, EventPayload::Deleted),
        };
        Self {
            kind,
            node_kind: snapshot.kind,
            node: snapshot,
            payload,
            commit_id: commit_id.clone(),
        }
    }

    /// String form of the event kind, for logging and debugging.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            EventKind::Insert => "node:inserted",
            EventKind::Update => "node:updated",
            EventKind::Delete => "node:deleted",
            EventKind::GroupAdd => "group:added",
            EventKind::GroupRemove => "group:removed",
        }
    }
}
