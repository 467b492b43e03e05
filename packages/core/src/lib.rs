//! NodeGraph Core
//!
//! Embedded object-graph store with a reactive watch layer. Callers create
//! typed nodes (Entity, Relationship, Action) carrying arbitrary JSON
//! properties and group tags; edits are staged into a per-graph transaction
//! log, committed asynchronously through an abstract store, and replayed to
//! registered watches as an ordered, typed event stream.
//!
//! # Architecture
//!
//! - **Pure JSON Properties**: all caller data lives in each node's
//!   `properties` map (`serde_json` values, structural equality)
//! - **Staged Mutations**: every edit is an immutable mutation carrying the
//!   post-mutation node snapshot; batches commit all-or-nothing
//! - **Predicate Watches**: boolean expressions over type, groups, and
//!   properties select which events a subscriber receives
//! - **Store Abstraction**: persistence sits behind the async `GraphStore`
//!   trait; an in-memory reference store ships in this crate
//!
//! # Modules
//!
//! - [`models`] - data structures (Node, Mutation, Event, Predicate)
//! - [`services`] - graph sessions, commit pipeline, watches
//! - [`db`] - store abstraction and the in-memory reference store
//!
//! # Example
//!
//! ```rust
//! use nodegraph_core::db::MemoryStore;
//! use nodegraph_core::models::{Condition, EventKind, NodeKind, Predicate};
//! use nodegraph_core::services::Graph;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let graph = Graph::new(Arc::new(MemoryStore::new()));
//!
//!     let watch = graph
//!         .watch(NodeKind::Entity)
//!         .matching(Predicate::type_equals("T").or(Predicate::member_of(["G"], Condition::Any)))
//!         .build()?;
//!     watch.on(EventKind::Insert, |event| {
//!         println!("inserted: {}", event.node.node_type);
//!     });
//!
//!     let entity = graph.create_entity("T")?;
//!     entity.set_property("P", json!("A"))?;
//!     entity.add_to_group("G")?;
//!
//!     let outcome = graph.commit().await;
//!     assert!(outcome.success);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::{GraphStore, MemoryStore, StoreError, StoreReceipt};
pub use models::{
    CommitId, Condition, Event, EventKind, EventPayload, Mutation, Node, NodeId, NodeKind,
    NodeState, Predicate, StagedMutation, ValidationError,
};
pub use services::{CommitOutcome, Graph, GraphConfig, GraphError, NodeHandle, Watch, WatchBuilder};
