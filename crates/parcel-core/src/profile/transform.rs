use serde::{Deserialize, Serialize};

use super::{NodeConstraint, NodeTypeId};

/// A rule describing how a node matching structural preconditions may be
/// retyped and relocated.
///
/// The three action flags are independent and combine; the order in which
/// they run is fixed by the transform engine (`crate::tree::transform`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTransform {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_type: NodeTypeId,
    #[serde(default)]
    pub source_parent: Option<NodeConstraint>,
    #[serde(default)]
    pub source_grandparent: Option<NodeConstraint>,
    /// Every child of the source node must satisfy this.
    #[serde(default)]
    pub source_child: Option<NodeConstraint>,
    #[serde(default)]
    pub result_type: Option<NodeTypeId>,
    /// Names the type of an inserted parent.
    #[serde(default)]
    pub result_parent: Option<NodeConstraint>,
    #[serde(default)]
    pub insert_parent: bool,
    #[serde(default)]
    pub move_to_grandparent: bool,
    #[serde(default)]
    pub remove_empty_parent: bool,
}

impl NodeTransform {
    #[must_use]
    pub fn new(label: impl Into<String>, source_type: impl Into<NodeTypeId>) -> Self {
        Self {
            label: label.into(),
            description: None,
            source_type: source_type.into(),
            source_parent: None,
            source_grandparent: None,
            source_child: None,
            result_type: None,
            result_parent: None,
            insert_parent: false,
            move_to_grandparent: false,
            remove_empty_parent: false,
        }
    }

    #[must_use]
    pub fn retype_to(mut self, result: impl Into<NodeTypeId>) -> Self {
        self.result_type = Some(result.into());
        self
    }

    #[must_use]
    pub fn requiring_parent(mut self, constraint: NodeConstraint) -> Self {
        self.source_parent = Some(constraint);
        self
    }

    #[must_use]
    pub fn requiring_grandparent(mut self, constraint: NodeConstraint) -> Self {
        self.source_grandparent = Some(constraint);
        self
    }

    #[must_use]
    pub fn requiring_children(mut self, constraint: NodeConstraint) -> Self {
        self.source_child = Some(constraint);
        self
    }

    #[must_use]
    pub fn inserting_parent(mut self, constraint: NodeConstraint) -> Self {
        self.insert_parent = true;
        self.result_parent = Some(constraint);
        self
    }

    #[must_use]
    pub const fn moving_to_grandparent(mut self) -> Self {
        self.move_to_grandparent = true;
        self
    }

    #[must_use]
    pub const fn removing_empty_parent(mut self) -> Self {
        self.remove_empty_parent = true;
        self
    }

    /// Every node type this transform mentions.
    pub fn referenced_node_types(&self) -> impl Iterator<Item = &NodeTypeId> {
        let constraints = [
            self.source_parent.as_ref(),
            self.source_grandparent.as_ref(),
            self.source_child.as_ref(),
            self.result_parent.as_ref(),
        ];
        std::iter::once(&self.source_type)
            .chain(self.result_type.iter())
            .chain(
                constraints
                    .into_iter()
                    .flatten()
                    .flat_map(|c| c.node_types.iter()),
            )
    }
}
