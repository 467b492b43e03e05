//! In-Memory Store
//!
//! Reference implementation of [`GraphStore`] backed by a `HashMap`. Used by
//! the test suite and by embedders that want the watch/commit machinery
//! without durable persistence.
//!
//! Each staged mutation carries the full post-mutation node snapshot, so
//! applying a mutation is storing that snapshot under the node's id (inserts
//! mint the id, deletes remove the record). The batch is applied to a
//! scratch copy of the map and swapped in only when every mutation resolved,
//! which gives the all-or-nothing behavior the trait requires.

use crate::db::error::StoreError;
use crate::db::graph_store::{GraphStore, StoreReceipt};
use crate::models::{LocalId, Mutation, Node, NodeId, NodeState, StagedMutation};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// HashMap-backed store with injectable write failure for tests.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<NodeId, Node>>,
    fail_next_write: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `stage_write` call fail with the given error.
    ///
    /// Consumed by that one call; later writes succeed again.
    pub fn fail_next_write(&self, error: StoreError) {
        *self
            .fail_next_write
            .lock()
            .expect("memory store lock poisoned") = Some(error);
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.records
            .lock()
            .expect("memory store lock poisoned")
            .len()
    }

    fn resolve_id(
        staged: &StagedMutation,
        assigned: &HashMap<LocalId, NodeId>,
    ) -> Result<NodeId, StoreError> {
        if let Some(id) = staged.node_id() {
            return Ok(id.clone());
        }
        assigned.get(staged.local()).cloned().ok_or_else(|| {
            StoreError::write_failed(format!(
                "mutation references unknown node (local {})",
                staged.local()
            ))
        })
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn stage_write(&self, batch: &[StagedMutation]) -> Result<StoreReceipt, StoreError> {
        if let Some(error) = self
            .fail_next_write
            .lock()
            .expect("memory store lock poisoned")
            .take()
        {
            return Err(error);
        }

        let mut records = self.records.lock().expect("memory store lock poisoned");
        let mut scratch = records.clone();
        let mut assigned: Vec<(LocalId, NodeId)> = Vec::new();
        let mut assigned_by_local: HashMap<LocalId, NodeId> = HashMap::new();

        for staged in batch {
            match &staged.mutation {
                Mutation::Insert => {
                    let id = Uuid::new_v4().to_string();
                    let mut record = staged.snapshot.clone();
                    record.id = Some(id.clone());
                    record.state = NodeState::Committed;
                    scratch.insert(id.clone(), record);
                    assigned_by_local.insert(staged.local().clone(), id.clone());
                    assigned.push((staged.local().clone(), id));
                }
                Mutation::Delete => {
                    let id = Self::resolve_id(staged, &assigned_by_local)?;
                    if scratch.remove(&id).is_none() {
                        return Err(StoreError::write_failed(format!(
                            "delete for unknown record {id}"
                        )));
                    }
                }
                _ => {
                    // Snapshot is the full post-mutation state, so an update
                    // of any flavor is a whole-record replace.
                    let id = Self::resolve_id(staged, &assigned_by_local)?;
                    if !scratch.contains_key(&id) {
                        return Err(StoreError::write_failed(format!(
                            "update for unknown record {id}"
                        )));
                    }
                    let mut record = staged.snapshot.clone();
                    record.id = Some(id.clone());
                    record.state = NodeState::Committed;
                    scratch.insert(id, record);
                }
            }
        }

        *records = scratch;
        Ok(StoreReceipt {
            commit_id: Uuid::new_v4().to_string(),
            assigned,
        })
    }

    async fn load(&self, id: &str) -> Result<Option<Node>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("memory store lock poisoned")
            .get(id)
            .cloned())
    }
}
