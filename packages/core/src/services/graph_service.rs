//! Graph Service - Sessions, Staging, and the Commit Pipeline
//!
//! This module provides the graph session API:
//!
//! - [`Graph`] - cheaply cloneable handle over one graph session
//! - [`NodeHandle`] - shared live node; every mutator applies the edit and
//!   stages the matching mutation synchronously
//! - `TransactionLog` - per-session buffer of staged mutations
//! - the commit pipeline turning a drained batch into a store write and an
//!   ordered event stream
//!
//! # Staging
//!
//! Mutators are synchronous and fail fast: stale-node and validation errors
//! return before the transaction log is touched. A successful mutator
//! applies the change to the live node under its lock, captures the
//! post-mutation snapshot, and appends it to the log. Staging never performs
//! store I/O.
//!
//! # Commit
//!
//! `commit` is async and serialized per graph by a tokio mutex: at most one
//! commit is writing and dispatching at a time, later callers queue FIFO.
//! The pipeline itself runs on a spawned task, so a caller that stops
//! polling its commit future never strands a drained batch. The drained
//! batch is written through the store as a whole; on failure the
//! batch is dropped (the caller restages - there is no automatic retry) and
//! no events are dispatched. On success, store-assigned ids are frozen onto
//! pending nodes, one event per mutation is built in staging order, and the
//! whole sequence is dispatched to matching watches before the outcome is
//! returned.

use crate::db::{GraphStore, StoreError};
use crate::models::{
    CommitId, Condition, Event, LocalId, Mutation, Node, NodeId, NodeKind, NodeState,
    StagedMutation, ValidationError,
};
use crate::services::error::GraphError;
use crate::services::watch_service::{WatchBuilder, WatchRegistry};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Graph session configuration.
#[derive(Debug, Clone, Default)]
pub struct GraphConfig {
    /// Upper bound for a single store call (`stage_write` or `load`).
    /// `None` means the store call is awaited without a deadline.
    pub store_timeout: Option<Duration>,
}

/// Result of one commit, returned after all dispatch has been attempted.
#[derive(Debug)]
pub struct CommitOutcome {
    /// Whether the batch was accepted by the store
    pub success: bool,

    /// Store-assigned commit id; `None` for empty or failed commits
    pub commit_id: Option<CommitId>,

    /// Number of events built and offered to the watch registry
    pub events: usize,

    /// The failure, when `success` is false
    pub error: Option<GraphError>,
}

impl CommitOutcome {
    fn empty() -> Self {
        Self {
            success: true,
            commit_id: None,
            events: 0,
            error: None,
        }
    }

    fn applied(commit_id: CommitId, events: usize) -> Self {
        Self {
            success: true,
            commit_id: Some(commit_id),
            events,
            error: None,
        }
    }

    fn failed(error: GraphError) -> Self {
        Self {
            success: false,
            commit_id: None,
            events: 0,
            error: Some(error),
        }
    }
}

/// One staged entry: the immutable mutation record plus the live node it
/// belongs to, kept so the commit can freeze store-assigned ids.
pub(crate) struct LogEntry {
    pub(crate) staged: StagedMutation,
    pub(crate) node: Arc<RwLock<Node>>,
}

/// Per-session buffer of staged mutations.
///
/// `stage` appends under a short mutex; `drain_for_commit` swaps the buffer
/// for an empty one, so a concurrent `stage` lands wholly in the draining
/// batch or wholly in the next one.
pub(crate) struct TransactionLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl TransactionLog {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn stage(&self, entry: LogEntry) {
        self.entries
            .lock()
            .expect("transaction log lock poisoned")
            .push(entry);
    }

    pub(crate) fn drain_for_commit(&self) -> Vec<LogEntry> {
        mem::take(&mut *self.entries.lock().expect("transaction log lock poisoned"))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("transaction log lock poisoned")
            .len()
    }
}

pub(crate) struct GraphInner {
    pub(crate) store: Arc<dyn GraphStore>,
    pub(crate) log: TransactionLog,
    pub(crate) registry: WatchRegistry,
    commit_gate: tokio::sync::Mutex<()>,
    config: GraphConfig,
}

/// Handle over one graph session.
///
/// Clones share the same transaction log, watch registry, and commit gate.
#[derive(Clone)]
pub struct Graph {
    pub(crate) inner: Arc<GraphInner>,
}

impl Graph {
    /// Create a session over the given store with default configuration.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_config(store, GraphConfig::default())
    }

    /// Create a session with explicit configuration.
    pub fn with_config(store: Arc<dyn GraphStore>, config: GraphConfig) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                store,
                log: TransactionLog::new(),
                registry: WatchRegistry::new(),
                commit_gate: tokio::sync::Mutex::new(()),
                config,
            }),
        }
    }

    /// Create a pending Entity node and stage its insert.
    pub fn create_entity(&self, node_type: impl Into<String>) -> Result<NodeHandle, GraphError> {
        self.create(NodeKind::Entity, node_type)
    }

    /// Create a pending Relationship node and stage its insert.
    pub fn create_relationship(
        &self,
        node_type: impl Into<String>,
    ) -> Result<NodeHandle, GraphError> {
        self.create(NodeKind::Relationship, node_type)
    }

    /// Create a pending Action node and stage its insert.
    pub fn create_action(&self, node_type: impl Into<String>) -> Result<NodeHandle, GraphError> {
        self.create(NodeKind::Action, node_type)
    }

    fn create(&self, kind: NodeKind, node_type: impl Into<String>) -> Result<NodeHandle, GraphError> {
        let node = Node::new(kind, node_type)?;
        let snapshot = node.clone();
        let node = Arc::new(RwLock::new(node));
        self.inner.log.stage(LogEntry {
            staged: StagedMutation {
                snapshot,
                mutation: Mutation::Insert,
            },
            node: Arc::clone(&node),
        });
        Ok(NodeHandle {
            node,
            graph: self.clone(),
        })
    }

    /// Number of mutations staged for the next commit.
    pub fn pending_mutations(&self) -> usize {
        self.inner.log.len()
    }

    /// Start building a watch over nodes of the given kind.
    pub fn watch(&self, kind: NodeKind) -> WatchBuilder {
        WatchBuilder::new(self.clone(), kind)
    }

    /// Load a record by id through the store.
    ///
    /// Returns `Ok(None)` for unknown or deleted ids, which is what makes
    /// relationship links weak references.
    pub async fn load(&self, id: &str) -> Result<Option<Node>, StoreError> {
        self.store_call(self.inner.store.load(id)).await
    }

    /// Commit all staged mutations.
    ///
    /// Serialized per graph: a second commit queues behind the one in
    /// flight. An empty log is a successful no-op with zero events. The
    /// returned outcome is the commit's completion: it is produced exactly
    /// once, after every matching watch has been offered every event.
    ///
    /// The pipeline runs on a spawned task: a caller that stops polling
    /// this future (timeout, select) abandons only the outcome, never the
    /// batch - the commit still writes and dispatches in the background.
    ///
    /// This method never panics on store failure; all failure surfaces in
    /// the outcome, and the drained batch is dropped (callers restage).
    pub async fn commit(&self) -> CommitOutcome {
        let graph = self.clone();
        let pipeline = tokio::spawn(async move { graph.run_commit().await });
        match pipeline.await {
            Ok(outcome) => outcome,
            Err(_) => CommitOutcome::failed(
                StoreError::Backend("commit task aborted".to_string()).into(),
            ),
        }
    }

    async fn run_commit(&self) -> CommitOutcome {
        let _gate = self.inner.commit_gate.lock().await;

        let batch = self.inner.log.drain_for_commit();
        if batch.is_empty() {
            tracing::debug!("commit: transaction log empty, nothing to write");
            return CommitOutcome::empty();
        }

        let (mut staged, handles): (Vec<StagedMutation>, Vec<Arc<RwLock<Node>>>) =
            batch.into_iter().map(|e| (e.staged, e.node)).unzip();

        // An insert event describes the node as it enters the store, so its
        // snapshot is folded forward to the node's last snapshot within this
        // batch (a node "inserted in group G" matches a MemberOf("G") watch
        // on the insert event itself). Only this batch is consulted;
        // mutations staged after the drain belong to the next commit.
        let mut latest: HashMap<LocalId, Node> = HashMap::new();
        for entry in &staged {
            latest.insert(entry.snapshot.local.clone(), entry.snapshot.clone());
        }
        for entry in staged.iter_mut() {
            if entry.is_insert() {
                if let Some(node) = latest.get(&entry.snapshot.local) {
                    entry.snapshot = node.clone();
                }
            }
        }

        // A mutation staged between an earlier commit's drain and its id
        // freeze carries a snapshot with `id: None` even though the store
        // has assigned one by now; take the id from the live node.
        for (entry, handle) in staged.iter_mut().zip(&handles) {
            if entry.snapshot.id.is_none() {
                entry.snapshot.id = handle.read().expect("node lock poisoned").id.clone();
            }
        }

        let receipt = match self.store_call(self.inner.store.stage_write(&staged)).await {
            Ok(receipt) => receipt,
            Err(error) => {
                tracing::warn!(
                    mutations = staged.len(),
                    error = %error,
                    "commit failed; staged mutations dropped"
                );
                return CommitOutcome::failed(error.into());
            }
        };

        let assigned: HashMap<LocalId, NodeId> = receipt.assigned.iter().cloned().collect();

        // Freeze store-assigned ids and promote lifecycle state on the live
        // nodes before any watch observes the commit.
        for handle in &handles {
            let mut node = handle.write().expect("node lock poisoned");
            if node.id.is_none() {
                if let Some(id) = assigned.get(&node.local) {
                    node.id = Some(id.clone());
                }
            }
            if node.state == NodeState::Pending {
                node.state = NodeState::Committed;
            }
        }

        let events: Vec<Event> = staged
            .into_iter()
            .map(|mut staged| {
                if staged.snapshot.id.is_none() {
                    if let Some(id) = assigned.get(&staged.snapshot.local) {
                        staged.snapshot.id = Some(id.clone());
                    }
                }
                if staged.snapshot.state == NodeState::Pending {
                    staged.snapshot.state = NodeState::Committed;
                }
                Event::from_staged(staged, &receipt.commit_id)
            })
            .collect();

        let delivered = self.inner.registry.dispatch(&events);
        tracing::debug!(
            commit_id = %receipt.commit_id,
            events = events.len(),
            callbacks = delivered,
            "commit applied"
        );
        CommitOutcome::applied(receipt.commit_id, events.len())
    }

    /// Commit in the background and invoke `completion` exactly once with
    /// `(success, error)`, after dispatch has finished.
    pub fn commit_with<F>(&self, completion: F)
    where
        F: FnOnce(bool, Option<GraphError>) + Send + 'static,
    {
        let graph = self.clone();
        tokio::spawn(async move {
            let outcome = graph.run_commit().await;
            completion(outcome.success, outcome.error);
        });
    }

    async fn store_call<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.inner.config.store_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::timeout(limit.as_millis() as u64)),
            },
            None => call.await,
        }
    }
}

/// Shared handle to a live node.
///
/// Clones refer to the same node. All mutators stage synchronously; reads
/// return consistent snapshots taken under the node's lock.
#[derive(Clone)]
pub struct NodeHandle {
    node: Arc<RwLock<Node>>,
    graph: Graph,
}

impl NodeHandle {
    /// Store-assigned id, once the first commit has succeeded.
    pub fn id(&self) -> Option<NodeId> {
        self.read().id.clone()
    }

    pub fn kind(&self) -> NodeKind {
        self.read().kind
    }

    pub fn node_type(&self) -> String {
        self.read().node_type.clone()
    }

    /// Consistent snapshot of the current node state.
    pub fn snapshot(&self) -> Node {
        self.read().clone()
    }

    pub fn property(&self, key: &str) -> Option<Value> {
        self.read().property(key).cloned()
    }

    pub fn groups(&self) -> BTreeSet<String> {
        self.read().groups.clone()
    }

    pub fn member_of<'a, I>(&self, groups: I, condition: Condition) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.read().member_of(groups, condition)
    }

    pub fn is_deleted(&self) -> bool {
        self.read().is_deleted()
    }

    /// Set a property (last write wins) and stage the update.
    pub fn set_property(&self, key: impl Into<String>, value: Value) -> Result<(), GraphError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::EmptyPropertyKey.into());
        }
        self.stage_with(|node| {
            let old_value = node.set_property(&key, value.clone());
            Some(Mutation::UpdateProperty {
                key: key.clone(),
                old_value,
                new_value: value.clone(),
            })
        })
    }

    /// Remove a property and stage the deletion. Removing a key that is not
    /// present is a no-op and stages nothing.
    pub fn delete_property(&self, key: &str) -> Result<(), GraphError> {
        if key.is_empty() {
            return Err(ValidationError::EmptyPropertyKey.into());
        }
        self.stage_with(|node| {
            node.delete_property(key).map(|old_value| Mutation::DeleteProperty {
                key: key.to_string(),
                old_value,
            })
        })
    }

    /// Add the node to a group. Already a member is a no-op.
    pub fn add_to_group(&self, group: &str) -> Result<(), GraphError> {
        if group.is_empty() {
            return Err(ValidationError::EmptyGroupName.into());
        }
        self.stage_with(|node| {
            node.add_group(group).then(|| Mutation::InsertGroup {
                group: group.to_string(),
            })
        })
    }

    /// Remove the node from a group. Not a member is a no-op.
    pub fn remove_from_group(&self, group: &str) -> Result<(), GraphError> {
        if group.is_empty() {
            return Err(ValidationError::EmptyGroupName.into());
        }
        self.stage_with(|node| {
            node.remove_group(group).then(|| Mutation::RemoveGroup {
                group: group.to_string(),
            })
        })
    }

    /// Add the node to the group if absent, remove it otherwise.
    pub fn toggle_group(&self, group: &str) -> Result<(), GraphError> {
        if group.is_empty() {
            return Err(ValidationError::EmptyGroupName.into());
        }
        self.stage_with(|node| {
            if node.groups.contains(group) {
                node.remove_group(group);
                Some(Mutation::RemoveGroup {
                    group: group.to_string(),
                })
            } else {
                node.add_group(group);
                Some(Mutation::InsertGroup {
                    group: group.to_string(),
                })
            }
        })
    }

    /// Set the relationship subject (weak reference). Relationship only.
    pub fn set_subject(&self, subject: Option<NodeId>) -> Result<(), GraphError> {
        self.require_kind(NodeKind::Relationship)?;
        self.stage_with(|node| {
            if node.subject == subject {
                return None;
            }
            node.subject = subject.clone();
            Some(links_mutation(node))
        })
    }

    /// Set the relationship object (weak reference). Relationship only.
    pub fn set_object(&self, object: Option<NodeId>) -> Result<(), GraphError> {
        self.require_kind(NodeKind::Relationship)?;
        self.stage_with(|node| {
            if node.object == object {
                return None;
            }
            node.object = object.clone();
            Some(links_mutation(node))
        })
    }

    /// Add an action subject (weak reference). Action only.
    pub fn add_subject(&self, id: NodeId) -> Result<(), GraphError> {
        self.require_kind(NodeKind::Action)?;
        self.stage_with(|node| node.subjects.insert(id.clone()).then(|| links_mutation(node)))
    }

    /// Add an action object (weak reference). Action only.
    pub fn add_object(&self, id: NodeId) -> Result<(), GraphError> {
        self.require_kind(NodeKind::Action)?;
        self.stage_with(|node| node.objects.insert(id.clone()).then(|| links_mutation(node)))
    }

    /// Remove an action subject. Action only.
    pub fn remove_subject(&self, id: &str) -> Result<(), GraphError> {
        self.require_kind(NodeKind::Action)?;
        self.stage_with(|node| node.subjects.remove(id).then(|| links_mutation(node)))
    }

    /// Remove an action object. Action only.
    pub fn remove_object(&self, id: &str) -> Result<(), GraphError> {
        self.require_kind(NodeKind::Action)?;
        self.stage_with(|node| node.objects.remove(id).then(|| links_mutation(node)))
    }

    /// Stage the node's deletion.
    ///
    /// The node is marked deleted immediately, so later mutators fail with
    /// `StaleNode` even before the commit lands. The staged snapshot is the
    /// last state before deletion; that is what predicates evaluate against
    /// for the delete event. Deleting twice is a no-op.
    pub fn delete(&self) -> Result<(), GraphError> {
        let mut node = self.node.write().expect("node lock poisoned");
        if node.is_deleted() {
            return Ok(());
        }
        let snapshot = node.clone();
        node.state = NodeState::Deleted;
        // Stage while still holding the node lock so log order matches the
        // order edits were applied to this node.
        self.graph.inner.log.stage(LogEntry {
            staged: StagedMutation {
                snapshot,
                mutation: Mutation::Delete,
            },
            node: Arc::clone(&self.node),
        });
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Node> {
        self.node.read().expect("node lock poisoned")
    }

    fn require_kind(&self, expected: NodeKind) -> Result<(), GraphError> {
        let actual = self.kind();
        if actual != expected {
            return Err(GraphError::WrongKind { expected, actual });
        }
        Ok(())
    }

    /// Apply an edit under the node lock and stage the resulting mutation.
    ///
    /// The closure returns `None` for no-op edits, which stage nothing. The
    /// snapshot is captured after the edit, so it is the post-mutation state
    /// the store persists and predicates evaluate.
    fn stage_with<F>(&self, edit: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut Node) -> Option<Mutation>,
    {
        let mut node = self.node.write().expect("node lock poisoned");
        if node.is_deleted() {
            return Err(GraphError::StaleNode);
        }
        let mutation = match edit(&mut node) {
            Some(mutation) => mutation,
            None => return Ok(()),
        };
        let snapshot = node.clone();
        // Stage while still holding the node lock so log order matches the
        // order edits were applied to this node.
        self.graph.inner.log.stage(LogEntry {
            staged: StagedMutation { snapshot, mutation },
            node: Arc::clone(&self.node),
        });
        Ok(())
    }
}

fn links_mutation(node: &Node) -> Mutation {
    Mutation::SetLinks {
        subject: node.subject.clone(),
        object: node.object.clone(),
        subjects: node.subjects.clone(),
        objects: node.objects.clone(),
    }
}

#[cfg(test)]
#[path = "graph_service_test.rs"]
mod graph_service_test;
