//! Tests for the predicate engine
//!
//! Pins down the evaluation semantics watchers depend on: purity, the empty
//! MemberOf edge cases for every node kind, composite short-circuiting, and
//! construction-time validation.

mod tests {
    use crate::models::node::{Condition, Node, NodeKind, ValidationError};
    use crate::models::predicate::Predicate;
    use serde_json::json;

    fn entity_with_groups(node_type: &str, groups: &[&str]) -> Node {
        let mut node = Node::new(NodeKind::Entity, node_type).unwrap();
        for g in groups {
            node.add_group(g);
        }
        node
    }

    // ========================================================================
    // Leaf predicates
    // ========================================================================

    #[test]
    fn test_type_equals() {
        let node = entity_with_groups("T", &[]);
        assert!(Predicate::type_equals("T").matches(&node));
        assert!(!Predicate::type_equals("U").matches(&node));
    }

    #[test]
    fn test_member_of_all() {
        let node = entity_with_groups("T", &["G1", "G2"]);
        assert!(Predicate::member_of(["G1"], Condition::All).matches(&node));
        assert!(Predicate::member_of(["G1", "G2"], Condition::All).matches(&node));
        assert!(!Predicate::member_of(["G1", "G3"], Condition::All).matches(&node));
    }

    #[test]
    fn test_member_of_any() {
        let node = entity_with_groups("T", &["G1"]);
        assert!(Predicate::member_of(["G1", "G9"], Condition::Any).matches(&node));
        assert!(!Predicate::member_of(["G8", "G9"], Condition::Any).matches(&node));
    }

    /// Empty MemberOf is a classic off-by-one: All over the empty set is
    /// vacuously true, Any over the empty set matches nothing. Pinned for
    /// every node kind.
    #[test]
    fn test_member_of_empty_set_for_every_kind() {
        for kind in [NodeKind::Entity, NodeKind::Relationship, NodeKind::Action] {
            let node = Node::new(kind, "T").unwrap();
            let all = Predicate::member_of(Vec::<String>::new(), Condition::All);
            let any = Predicate::member_of(Vec::<String>::new(), Condition::Any);
            assert!(all.matches(&node), "All over empty set must match {kind:?}");
            assert!(!any.matches(&node), "Any over empty set must not match {kind:?}");
        }
    }

    #[test]
    fn test_property_equals_is_structural() {
        let mut node = Node::new(NodeKind::Entity, "T").unwrap();
        node.set_property("P", json!({"a": [1, 2]}));

        assert!(Predicate::property_equals("P", json!({"a": [1, 2]})).matches(&node));
        assert!(!Predicate::property_equals("P", json!({"a": [1, 2, 3]})).matches(&node));
        assert!(!Predicate::property_equals("missing", json!(null)).matches(&node));
    }

    // ========================================================================
    // Composites
    // ========================================================================

    #[test]
    fn test_and_or_not() {
        let node = entity_with_groups("T", &["G1"]);

        let both = Predicate::type_equals("T").and(Predicate::member_of(["G1"], Condition::Any));
        assert!(both.matches(&node));

        let either = Predicate::type_equals("U").or(Predicate::member_of(["G1"], Condition::Any));
        assert!(either.matches(&node));

        let neither = Predicate::type_equals("U").or(Predicate::member_of(["G9"], Condition::Any));
        assert!(!neither.matches(&node));

        assert!(Predicate::type_equals("U").not().matches(&node));
        assert!(!Predicate::type_equals("T").not().matches(&node));
    }

    /// The matrix from the watch layer: `type == "T" || member of "G"`.
    #[test]
    fn test_type_or_group_matrix() {
        let predicate =
            Predicate::type_equals("T").or(Predicate::member_of(["G"], Condition::Any));

        assert!(predicate.matches(&entity_with_groups("T", &[])));
        assert!(predicate.matches(&entity_with_groups("U", &["G"])));
        assert!(!predicate.matches(&entity_with_groups("U", &[])));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let node = entity_with_groups("T", &["G1"]);
        let predicate = Predicate::type_equals("T")
            .and(Predicate::member_of(["G1"], Condition::All))
            .or(Predicate::property_equals("P", json!("A")).not());

        let first = predicate.matches(&node);
        for _ in 0..10 {
            assert_eq!(predicate.matches(&node), first);
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_rejects_empty_identifiers() {
        assert!(matches!(
            Predicate::type_equals("").validate(),
            Err(ValidationError::InvalidPredicate(_))
        ));
        assert!(matches!(
            Predicate::member_of([""], Condition::Any).validate(),
            Err(ValidationError::InvalidPredicate(_))
        ));
        assert!(matches!(
            Predicate::property_equals("", json!(1)).validate(),
            Err(ValidationError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn test_validate_recurses_into_composites() {
        let bad = Predicate::type_equals("T").and(Predicate::type_equals(""));
        assert!(bad.validate().is_err());

        let good = Predicate::type_equals("T")
            .or(Predicate::member_of(["G"], Condition::All).not());
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_predicate_serialization_round_trip() {
        let predicate = Predicate::type_equals("T")
            .or(Predicate::member_of(["G1", "G2"], Condition::Any))
            .and(Predicate::property_equals("P", json!("A")).not());

        let json = serde_json::to_string(&predicate).unwrap();
        let parsed: Predicate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, predicate);
    }
}
