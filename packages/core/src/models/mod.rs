//! Data Models
//!
//! This module contains the core data structures of the object graph:
//!
//! - `Node` - universal record for Entity, Relationship, and Action nodes
//! - `Mutation` / `StagedMutation` - immutable change descriptions
//! - `Event` - typed change notifications produced by a commit
//! - `Predicate` - boolean expressions selecting which events a watch sees
//!
//! All caller-defined data uses the pure JSON approach: arbitrary values in
//! the node's `properties` map with structural equality.

mod event;
mod mutation;
mod node;
mod predicate;

pub use event::{Event, EventKind, EventPayload};
pub use mutation::{Mutation, StagedMutation};
pub use node::{
    CommitId, Condition, LocalId, Node, NodeId, NodeKind, NodeState, ValidationError,
};
pub use predicate::Predicate;
