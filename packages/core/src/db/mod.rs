//! Store Layer
//!
//! This module owns the boundary between the graph core and record
//! persistence:
//!
//! - [`GraphStore`] - the async store abstraction the commit pipeline
//!   writes through
//! - [`MemoryStore`] - HashMap-backed reference implementation
//! - [`StoreError`] - store failure taxonomy (timeouts included)
//!
//! Durable backends implement `GraphStore` outside this crate; the core
//! never assumes anything about their wire format or layout.

mod error;
mod graph_store;
mod memory_store;

pub use error::StoreError;
pub use graph_store::{GraphStore, StoreReceipt};
pub use memory_store::MemoryStore;
