//! Predicate Engine
//!
//! A [`Predicate`] is a recursive boolean expression over a node's type,
//! groups, and properties. Watches own one predicate each; the registry
//! evaluates it against the node snapshot carried by every event (the
//! post-mutation state, or the last pre-deletion state for delete events).
//!
//! Evaluation is pure and deterministic: the same snapshot always yields the
//! same result. `And`/`Or` short-circuit left-to-right, which is never
//! observable because no sub-expression has side effects.
//!
//! Malformed predicates (empty type tags, group names, or property keys) are
//! rejected when the watch is built, never at dispatch time.

use crate::models::node::{Condition, Node, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Boolean expression tree over node type, groups, and properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    /// Matches nodes whose type tag equals the given string
    #[serde(rename_all = "camelCase")]
    TypeEquals { node_type: String },

    /// Matches on group membership; `All` over an empty set is vacuously
    /// true, `Any` over an empty set never matches
    MemberOf {
        groups: BTreeSet<String>,
        condition: Condition,
    },

    /// Matches nodes where `properties[key]` structurally equals `value`
    PropertyEquals { key: String, value: Value },

    /// Both sub-predicates match
    And {
        left: Box<Predicate>,
        right: Box<Predicate>,
    },

    /// Either sub-predicate matches
    Or {
        left: Box<Predicate>,
        right: Box<Predicate>,
    },

    /// The sub-predicate does not match
    Not { inner: Box<Predicate> },
}

impl Predicate {
    /// Predicate matching nodes of the given type.
    pub fn type_equals(node_type: impl Into<String>) -> Self {
        Self::TypeEquals {
            node_type: node_type.into(),
        }
    }

    /// Predicate matching on group membership.
    pub fn member_of<I, S>(groups: I, condition: Condition) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MemberOf {
            groups: groups.into_iter().map(Into::into).collect(),
            condition,
        }
    }

    /// Predicate matching nodes whose property equals the given value.
    pub fn property_equals(key: impl Into<String>, value: Value) -> Self {
        Self::PropertyEquals {
            key: key.into(),
            value,
        }
    }

    /// Combine with another predicate; both must match.
    pub fn and(self, other: Predicate) -> Self {
        Self::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Combine with another predicate; either may match.
    pub fn or(self, other: Predicate) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Negate this predicate.
    pub fn not(self) -> Self {
        Self::Not {
            inner: Box::new(self),
        }
    }

    /// Evaluate against a node snapshot.
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::TypeEquals { node_type } => node.node_type == *node_type,
            Self::MemberOf { groups, condition } => {
                node.member_of(groups.iter().map(String::as_str), *condition)
            }
            Self::PropertyEquals { key, value } => node.property(key) == Some(value),
            Self::And { left, right } => left.matches(node) && right.matches(node),
            Self::Or { left, right } => left.matches(node) || right.matches(node),
            Self::Not { inner } => !inner.matches(node),
        }
    }

    /// Validate the whole tree. Called once at watch construction so
    /// dispatch never has to handle a malformed predicate.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::TypeEquals { node_type } => {
                if node_type.is_empty() {
                    return Err(ValidationError::InvalidPredicate(
                        "typeEquals requires a non-empty type".to_string(),
                    ));
                }
                Ok(())
            }
            Self::MemberOf { groups, .. } => {
                if groups.iter().any(|g| g.is_empty()) {
                    return Err(ValidationError::InvalidPredicate(
                        "memberOf requires non-empty group names".to_string(),
                    ));
                }
                Ok(())
            }
            Self::PropertyEquals { key, .. } => {
                if key.is_empty() {
                    return Err(ValidationError::InvalidPredicate(
                        "propertyEquals requires a non-empty key".to_string(),
                    ));
                }
                Ok(())
            }
            Self::And { left, right } | Self::Or { left, right } => {
                left.validate()?;
                right.validate()
            }
            Self::Not { inner } => inner.validate(),
        }
    }
}

#[cfg(test)]
#[path = "predicate_test.rs"]
mod predicate_test;
