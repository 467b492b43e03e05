//! Node Data Structures
//!
//! This module defines the universal `Node` record used for every typed
//! graph object in NodeGraph.
//!
//! # Architecture
//!
//! - **Universal Node**: a single struct represents all three node kinds
//!   (Entity, Relationship, Action), discriminated by [`NodeKind`]
//! - **Pure JSON Properties**: all caller-defined data lives in the
//!   `properties` field as `serde_json` values with structural equality
//! - **Weak Links**: Relationship `subject`/`object` and Action
//!   `subjects`/`objects` hold node ids only, never ownership; resolving a
//!   link goes through the store and yields `None` for deleted targets
//!
//! # Identity
//!
//! A node is created "pending": `id` is `None` until the first successful
//! commit, at which point the store assigns an id that stays stable for the
//! node's lifetime. The `local` field is a session-local correlation key
//! assigned at construction so mutations staged before the first commit can
//! be tied back to their insert within a batch. It is not an identity and is
//! never exposed as one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Store-assigned node identifier (UUID string, assigned at first commit).
pub type NodeId = String;

/// Session-local correlation key, assigned at node construction.
pub type LocalId = String;

/// Store-assigned identifier for one accepted commit batch.
pub type CommitId = String;

/// Validation errors for node and predicate construction
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Node type must be a non-empty string")]
    EmptyNodeType,

    #[error("Property key must be a non-empty string")]
    EmptyPropertyKey,

    #[error("Group name must be a non-empty string")]
    EmptyGroupName,

    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),
}

/// The three node kinds of the object graph.
///
/// A node's kind is fixed at construction and determines which watches can
/// observe it and which link fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Relationship,
    Action,
}

/// Node lifecycle state.
///
/// `Pending` until the first successful commit, `Committed` afterwards,
/// `Deleted` once a delete mutation has been staged. `Deleted` is terminal:
/// any further mutation fails with `GraphError::StaleNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Pending,
    Committed,
    Deleted,
}

/// Group membership condition, used by [`Node::member_of`] and the
/// `MemberOf` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Every listed group must be present (vacuously true for an empty set).
    All,
    /// At least one listed group must be present (false for an empty set).
    Any,
}

/// Universal node record for all graph object kinds.
///
/// The link fields are kind-specific: `subject`/`object` are meaningful only
/// for Relationship nodes and `subjects`/`objects` only for Action nodes;
/// the others stay empty. Keeping one struct avoids a parallel enum of
/// near-identical records and matches the pure-JSON-properties design where
/// everything type-specific already lives in `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Session-local correlation key (UUID), set at construction
    pub local: LocalId,

    /// Store-assigned identifier; `None` while the node is pending
    pub id: Option<NodeId>,

    /// Node kind, fixed at construction
    pub kind: NodeKind,

    /// Caller-defined type tag (e.g., "person", "authored"), immutable
    pub node_type: String,

    /// Caller-defined properties; structural equality, last-write-wins
    pub properties: Map<String, Value>,

    /// Group membership tags
    pub groups: BTreeSet<String>,

    /// Relationship subject (weak reference)
    pub subject: Option<NodeId>,

    /// Relationship object (weak reference)
    pub object: Option<NodeId>,

    /// Action subjects (weak references)
    pub subjects: BTreeSet<NodeId>,

    /// Action objects (weak references)
    pub objects: BTreeSet<NodeId>,

    /// Lifecycle state
    pub state: NodeState,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Create a pending node of the given kind and type.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyNodeType`] for an empty type tag.
    pub fn new(kind: NodeKind, node_type: impl Into<String>) -> Result<Self, ValidationError> {
        let node_type = node_type.into();
        if node_type.is_empty() {
            return Err(ValidationError::EmptyNodeType);
        }
        let now = Utc::now();
        Ok(Self {
            local: Uuid::new_v4().to_string(),
            id: None,
            kind,
            node_type,
            properties: Map::new(),
            groups: BTreeSet::new(),
            subject: None,
            object: None,
            subjects: BTreeSet::new(),
            objects: BTreeSet::new(),
            state: NodeState::Pending,
            created_at: now,
            modified_at: now,
        })
    }

    /// Read a property value.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a property, returning the previous value if any.
    pub(crate) fn set_property(&mut self, key: &str, value: Value) -> Option<Value> {
        let old = self.properties.insert(key.to_string(), value);
        self.modified_at = Utc::now();
        old
    }

    /// Remove a property, returning the removed value if it was present.
    pub(crate) fn delete_property(&mut self, key: &str) -> Option<Value> {
        let old = self.properties.remove(key);
        if old.is_some() {
            self.modified_at = Utc::now();
        }
        old
    }

    /// Add a group tag. Returns `false` if the node was already a member.
    pub(crate) fn add_group(&mut self, group: &str) -> bool {
        let added = self.groups.insert(group.to_string());
        if added {
            self.modified_at = Utc::now();
        }
        added
    }

    /// Remove a group tag. Returns `false` if the node was not a member.
    pub(crate) fn remove_group(&mut self, group: &str) -> bool {
        let removed = self.groups.remove(group);
        if removed {
            self.modified_at = Utc::now();
        }
        removed
    }

    /// Test group membership against a list of groups.
    ///
    /// With [`Condition::All`] every listed group must be present, so an
    /// empty list is vacuously true. With [`Condition::Any`] at least one
    /// must be present, so an empty list never matches.
    pub fn member_of<'a, I>(&self, groups: I, condition: Condition) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        match condition {
            Condition::All => groups.into_iter().all(|g| self.groups.contains(g)),
            Condition::Any => groups.into_iter().any(|g| self.groups.contains(g)),
        }
    }

    /// Whether the node has been deleted (terminal state).
    pub fn is_deleted(&self) -> bool {
        self.state == NodeState::Deleted
    }
}
