//! Tests for watch registration and event dispatch
//!
//! Covers predicate-filtered delivery, per-event ordering, idempotent
//! cancellation, callback panic isolation, and the guarantee that failed
//! commits deliver nothing.

mod tests {
    use crate::db::{MemoryStore, StoreError};
    use crate::models::{Condition, Event, EventKind, EventPayload, NodeKind, Predicate};
    use crate::services::error::GraphError;
    use crate::services::graph_service::Graph;
    use crate::services::watch_service::Watch;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const ALL_KINDS: [EventKind; 5] = [
        EventKind::Insert,
        EventKind::Update,
        EventKind::Delete,
        EventKind::GroupAdd,
        EventKind::GroupRemove,
    ];

    fn memory_graph() -> (Graph, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Graph::new(store.clone()), store)
    }

    /// Collect every event the watch delivers, across all event kinds.
    fn observe_all(watch: &Watch) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in ALL_KINDS {
            let sink = Arc::clone(&seen);
            watch.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
        }
        seen
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn test_build_requires_valid_predicate() {
        let (graph, _) = memory_graph();

        let missing = graph.watch(NodeKind::Entity).build();
        assert!(matches!(missing, Err(GraphError::Predicate(_))));

        let malformed = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals(""))
            .build();
        assert!(matches!(malformed, Err(GraphError::Predicate(_))));
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Insert an entity of type "T" with a property and a group: one insert
    /// event, one property event, one group event, in staging order, all
    /// delivered before the commit outcome is returned.
    #[tokio::test]
    async fn test_insert_property_group_scenario() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        let entity = graph.create_entity("T").unwrap();
        entity.set_property("P", json!("A")).unwrap();
        entity.add_to_group("G").unwrap();

        let outcome = graph.commit().await;
        assert!(outcome.success);

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].kind, EventKind::Insert);
        assert_eq!(events[1].kind, EventKind::Update);
        match &events[1].payload {
            EventPayload::Property {
                key,
                old_value,
                new_value,
            } => {
                assert_eq!(key, "P");
                assert_eq!(old_value, &None);
                assert_eq!(new_value, &Some(json!("A")));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(events[2].kind, EventKind::GroupAdd);

        // Snapshots carry the committed id and the same commit id
        let commit_id = outcome.commit_id.unwrap();
        for event in events.iter() {
            assert_eq!(event.commit_id, commit_id);
            assert!(event.node.id.is_some());
        }

        // The insert event describes the node as it entered the store,
        // edits from the same batch included
        assert_eq!(events[0].node.property("P"), Some(&json!("A")));
        assert!(events[0].node.groups.contains("G"));
        assert!(events[2].node.groups.contains("G"));
    }

    #[tokio::test]
    async fn test_update_event_carries_old_and_new_value() {
        let (graph, _) = memory_graph();
        let entity = graph.create_entity("T").unwrap();
        entity.set_property("P", json!("A")).unwrap();
        graph.commit().await;

        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        entity.set_property("P", json!("B")).unwrap();
        graph.commit().await;

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::Property {
                key,
                old_value,
                new_value,
            } => {
                assert_eq!(key, "P");
                assert_eq!(old_value, &Some(json!("A")));
                assert_eq!(new_value, &Some(json!("B")));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    /// `type == "T" || member of "G"`: each insert fires at most one insert
    /// callback, composite predicates are evaluated once per event.
    #[tokio::test]
    async fn test_or_predicate_insert_matrix() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T").or(Predicate::member_of(["G"], Condition::Any)))
            .build()
            .unwrap();

        let inserts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&inserts);
        watch.on(EventKind::Insert, move |event| {
            sink.lock().unwrap().push(event.node.node_type.clone());
        });

        graph.create_entity("T").unwrap();
        let grouped = graph.create_entity("U").unwrap();
        grouped.add_to_group("G").unwrap();
        graph.create_entity("U").unwrap();

        graph.commit().await;

        // "T" matches by type, the grouped "U" by membership, the plain "U"
        // not at all - each firing its insert callback at most once
        let inserts = inserts.lock().unwrap();
        assert_eq!(inserts.as_slice(), ["T", "U"]);
    }

    #[tokio::test]
    async fn test_group_events_delivered_in_staging_order() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        let entity = graph.create_entity("T").unwrap();
        entity.add_to_group("G1").unwrap();
        entity.add_to_group("G2").unwrap();
        entity.remove_from_group("G1").unwrap();

        graph.commit().await;

        let events = seen.lock().unwrap();
        let groups: Vec<(EventKind, &str)> = events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::Group { group } => Some((e.kind, group.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            groups,
            [
                (EventKind::GroupAdd, "G1"),
                (EventKind::GroupAdd, "G2"),
                (EventKind::GroupRemove, "G1"),
            ]
        );
    }

    /// One group mutation produces exactly one group event even when the
    /// watch predicate also uses MemberOf in a composite.
    #[tokio::test]
    async fn test_group_event_not_duplicated_by_member_of_predicate() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Relationship)
            .matching(
                Predicate::type_equals("T").or(Predicate::member_of(["G1"], Condition::Any)),
            )
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        let relationship = graph.create_relationship("T").unwrap();
        relationship.add_to_group("G1").unwrap();
        graph.commit().await;

        let events = seen.lock().unwrap();
        let group_adds = events
            .iter()
            .filter(|e| e.kind == EventKind::GroupAdd)
            .count();
        assert_eq!(group_adds, 1);
    }

    #[tokio::test]
    async fn test_watch_only_sees_its_node_kind() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Action)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        graph.create_entity("T").unwrap();
        graph.create_relationship("T").unwrap();
        graph.create_action("T").unwrap();
        graph.commit().await;

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].node_kind, NodeKind::Action);
    }

    /// Delete events evaluate against the last snapshot before deletion, so
    /// a type predicate still matches the deleted node.
    #[tokio::test]
    async fn test_delete_event_uses_pre_deletion_snapshot() {
        let (graph, _) = memory_graph();
        let entity = graph.create_entity("T").unwrap();
        entity.set_property("P", json!("A")).unwrap();
        graph.commit().await;

        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T").and(Predicate::property_equals("P", json!("A"))))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        entity.delete().unwrap();
        graph.commit().await;

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Delete);
        assert_eq!(events[0].node.property("P"), Some(&json!("A")));
    }

    #[tokio::test]
    async fn test_multiple_callbacks_per_kind_all_fire() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();

        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        let a = Arc::clone(&first);
        let b = Arc::clone(&second);
        watch.on(EventKind::Insert, move |_| *a.lock().unwrap() += 1);
        watch.on(EventKind::Insert, move |_| *b.lock().unwrap() += 1);

        graph.create_entity("T").unwrap();
        graph.commit().await;

        assert_eq!(*first.lock().unwrap(), 1);
        assert_eq!(*second.lock().unwrap(), 1);
    }

    // ========================================================================
    // Cancellation and isolation
    // ========================================================================

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_stops_delivery() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        graph.create_entity("T").unwrap();
        graph.commit().await;
        assert_eq!(seen.lock().unwrap().len(), 1);

        watch.cancel();
        watch.cancel();
        assert!(watch.is_cancelled());

        graph.create_entity("T").unwrap();
        graph.commit().await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_watch_stops_delivery() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);
        drop(watch);

        graph.create_entity("T").unwrap();
        graph.commit().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    /// A panicking subscriber is isolated: other subscribers still receive
    /// the event and the commit succeeds.
    #[tokio::test]
    async fn test_callback_panic_is_isolated() {
        let (graph, _) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();

        let delivered = Arc::new(Mutex::new(0));
        watch.on(EventKind::Insert, |_| panic!("subscriber bug"));
        let sink = Arc::clone(&delivered);
        watch.on(EventKind::Insert, move |_| *sink.lock().unwrap() += 1);

        graph.create_entity("T").unwrap();
        let outcome = graph.commit().await;

        assert!(outcome.success);
        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_delivers_no_events() {
        let (graph, store) = memory_graph();
        let watch = graph
            .watch(NodeKind::Entity)
            .matching(Predicate::type_equals("T"))
            .build()
            .unwrap();
        let seen = observe_all(&watch);

        let entity = graph.create_entity("T").unwrap();
        entity.set_property("P", json!("A")).unwrap();
        store.fail_next_write(StoreError::write_failed("disk full"));

        let outcome = graph.commit().await;
        assert!(!outcome.success);
        assert!(seen.lock().unwrap().is_empty());
    }
}
