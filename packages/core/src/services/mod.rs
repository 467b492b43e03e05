//! Graph Services
//!
//! This module contains the session-level machinery:
//!
//! - `Graph` / `NodeHandle` - staging API and the async commit pipeline
//! - `Watch` / `WatchBuilder` - predicate-filtered subscriptions
//! - `GraphError` - service-layer error taxonomy
//!
//! Services coordinate between the store layer and callers: mutations are
//! staged synchronously, committed asynchronously one batch at a time, and
//! replayed to matching watches in staging order.

pub mod error;
pub mod graph_service;
pub mod watch_service;

pub use error::GraphError;
pub use graph_service::{CommitOutcome, Graph, GraphConfig, NodeHandle};
pub use watch_service::{Watch, WatchBuilder};
