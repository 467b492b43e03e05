//! Watch Service - Subscriptions and Event Dispatch
//!
//! A [`Watch`] pairs one predicate with per-event-kind callback sets over a
//! single node kind. The registry holds only weak back-references: the
//! registering caller owns the watch, and dropping or cancelling it stops
//! delivery.
//!
//! # Dispatch
//!
//! `dispatch` receives the whole ordered event sequence of one commit. It
//! snapshots the live watch list once per call, so a watch registered
//! mid-dispatch is not retroactively notified and one cancelled mid-dispatch
//! stops receiving events as soon as `cancel` returns (an invocation already
//! in flight finishes). Each event is fully delivered to every matching
//! watch before the next event starts.
//!
//! A panicking subscriber callback is caught, logged, and skipped; it never
//! prevents delivery to other subscribers and never fails the commit.

use crate::models::{Event, EventKind, NodeKind, Predicate};
use crate::services::error::GraphError;
use crate::services::graph_service::Graph;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

type WatchCallback = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// State shared between a watch handle and the registry.
pub(crate) struct WatchShared {
    kind: NodeKind,
    predicate: Predicate,
    callbacks: RwLock<HashMap<EventKind, Vec<WatchCallback>>>,
    cancelled: AtomicBool,
}

/// Builder returned by `Graph::watch`.
///
/// The predicate is validated at `build`, never at dispatch time.
pub struct WatchBuilder {
    graph: Graph,
    kind: NodeKind,
    predicate: Option<Predicate>,
}

impl WatchBuilder {
    pub(crate) fn new(graph: Graph, kind: NodeKind) -> Self {
        Self {
            graph,
            kind,
            predicate: None,
        }
    }

    /// Set the predicate this watch filters events with.
    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Validate the predicate and register the watch.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Predicate`] for a missing or malformed
    /// predicate. `Predicate::member_of([], Condition::All)` expresses
    /// match-all explicitly for callers who want every node of the kind.
    pub fn build(self) -> Result<Watch, GraphError> {
        let predicate = self
            .predicate
            .ok_or_else(|| GraphError::Predicate("watch requires a predicate".to_string()))?;
        predicate
            .validate()
            .map_err(|e| GraphError::Predicate(e.to_string()))?;

        let shared = Arc::new(WatchShared {
            kind: self.kind,
            predicate,
            callbacks: RwLock::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
        });
        self.graph.inner.registry.register(&shared);
        Ok(Watch {
            shared,
            graph: self.graph,
        })
    }
}

/// Live subscription owned by the registering caller.
///
/// Dropping the watch cancels it.
pub struct Watch {
    shared: Arc<WatchShared>,
    graph: Graph,
}

impl Watch {
    /// Register a callback for one event kind.
    ///
    /// Multiple callbacks per kind are allowed; on a match all of them run,
    /// in registration order.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> &Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared
            .callbacks
            .write()
            .expect("watch callbacks lock poisoned")
            .entry(kind)
            .or_default()
            .push(Arc::new(callback));
        self
    }

    /// Stop receiving events. Idempotent, and safe to call while a dispatch
    /// is in flight: callbacks already invoked finish, no new one starts
    /// after this returns.
    pub fn cancel(&self) {
        if !self.shared.cancelled.swap(true, Ordering::SeqCst) {
            self.graph.inner.registry.unregister(&self.shared);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Registry of active watches, keyed by node kind.
pub(crate) struct WatchRegistry {
    watches: RwLock<HashMap<NodeKind, Vec<Weak<WatchShared>>>>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self {
            watches: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self, shared: &Arc<WatchShared>) {
        let mut map = self.watches.write().expect("watch registry lock poisoned");
        let list = map.entry(shared.kind).or_default();
        list.retain(|w| w.strong_count() > 0);
        list.push(Arc::downgrade(shared));
    }

    pub(crate) fn unregister(&self, shared: &Arc<WatchShared>) {
        let mut map = self.watches.write().expect("watch registry lock poisoned");
        if let Some(list) = map.get_mut(&shared.kind) {
            let target = Arc::downgrade(shared);
            list.retain(|w| w.strong_count() > 0 && !w.ptr_eq(&target));
        }
    }

    /// Deliver one commit's ordered event sequence.
    ///
    /// Returns the number of callback invocations that completed normally.
    pub(crate) fn dispatch(&self, events: &[Event]) -> usize {
        // One snapshot per dispatch call: watches registered after this
        // point see only later commits.
        let snapshot: HashMap<NodeKind, Vec<Arc<WatchShared>>> = {
            let map = self.watches.read().expect("watch registry lock poisoned");
            map.iter()
                .map(|(kind, list)| (*kind, list.iter().filter_map(Weak::upgrade).collect()))
                .collect()
        };

        let mut delivered = 0;
        for event in events {
            let Some(watches) = snapshot.get(&event.node_kind) else {
                continue;
            };
            for watch in watches {
                if watch.cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                if !watch.predicate.matches(&event.node) {
                    continue;
                }
                let callbacks: Vec<WatchCallback> = watch
                    .callbacks
                    .read()
                    .expect("watch callbacks lock poisoned")
                    .get(&event.kind)
                    .cloned()
                    .unwrap_or_default();
                for callback in callbacks {
                    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                        Ok(()) => delivered += 1,
                        Err(_) => {
                            tracing::warn!(
                                event = event.event_type(),
                                "watch callback panicked; continuing dispatch"
                            );
                        }
                    }
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "watch_service_test.rs"]
mod watch_service_test;
