//! Node constraints and the constraint evaluator.
//!
//! A [`NodeConstraint`] describes which nodes may occupy a structural slot
//! (a legal parent, a transform's required grandparent, every child of a
//! node, ...). Evaluation is a pure predicate over the candidate's node
//! type and the [`StructuralRelation`] connecting it.

use serde::{Deserialize, Serialize};

use super::NodeTypeId;

/// A parent/child predicate pair characterising the edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructuralRelation {
    /// Predicate read from the parent towards the child (e.g. `hasMember`).
    pub parent_to_child: String,
    /// Predicate read from the child towards the parent (e.g. `isMemberOf`).
    pub child_to_parent: String,
}

impl StructuralRelation {
    #[must_use]
    pub fn new(parent_to_child: impl Into<String>, child_to_parent: impl Into<String>) -> Self {
        Self {
            parent_to_child: parent_to_child.into(),
            child_to_parent: child_to_parent.into(),
        }
    }
}

/// Constraint on the node occupying a structural slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConstraint {
    #[serde(default)]
    pub matches_any: bool,
    #[serde(default)]
    pub matches_none: bool,
    #[serde(default)]
    pub node_types: Vec<NodeTypeId>,
    #[serde(default)]
    pub structural_relations: Vec<StructuralRelation>,
}

impl NodeConstraint {
    /// Constraint accepting every node.
    #[must_use]
    pub fn any() -> Self {
        Self {
            matches_any: true,
            ..Self::default()
        }
    }

    /// Constraint accepting no node; an empty slot satisfies it.
    #[must_use]
    pub fn none() -> Self {
        Self {
            matches_none: true,
            ..Self::default()
        }
    }

    /// Constraint accepting nodes of the listed types over any relation.
    #[must_use]
    pub fn of_types<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeTypeId>,
    {
        Self {
            node_types: types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restrict the accepted connecting relations.
    #[must_use]
    pub fn with_relation(mut self, relation: StructuralRelation) -> Self {
        self.structural_relations.push(relation);
        self
    }

    /// Decide whether a node of `candidate` type, connected by `relation`,
    /// satisfies this constraint.
    ///
    /// - `matches_any` accepts unconditionally.
    /// - `matches_none` rejects unconditionally.
    /// - Otherwise the type must be listed, and when relations are listed the
    ///   connecting relation must be one of them (an unknown relation fails).
    #[must_use]
    pub fn matches(&self, candidate: &NodeTypeId, relation: Option<&StructuralRelation>) -> bool {
        if self.matches_any {
            return true;
        }
        if self.matches_none {
            return false;
        }
        if !self.node_types.contains(candidate) {
            return false;
        }
        if self.structural_relations.is_empty() {
            return true;
        }
        relation.is_some_and(|r| self.structural_relations.contains(r))
    }

    /// Evaluate the constraint against a slot that may be empty.
    ///
    /// An empty slot satisfies only a `matches_none` constraint. An occupied
    /// slot whose node has no type yet satisfies only `matches_any`.
    #[must_use]
    pub fn admits_slot(
        &self,
        slot: Option<(Option<&NodeTypeId>, Option<&StructuralRelation>)>,
    ) -> bool {
        match slot {
            None => self.matches_none,
            Some((Some(node_type), relation)) => self.matches(node_type, relation),
            Some((None, _)) => self.matches_any,
        }
    }

    /// First listed node type, used when a constraint must name a type to create.
    #[must_use]
    pub fn preferred_type(&self) -> Option<&NodeTypeId> {
        self.node_types.first()
    }
}
