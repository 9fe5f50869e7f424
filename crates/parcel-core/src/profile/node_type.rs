use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{
    Cardinality, NodeConstraint, NodeTypeId, ProfileId, Property, PropertyConstraint,
    PropertyTypeId, StructuralRelation,
};

/// Whether nodes of a type must, may, or must not carry file content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileRequirement {
    #[serde(rename = "REQUIRED")]
    Required,
    #[serde(rename = "OPTIONAL")]
    Optional,
    #[default]
    #[serde(rename = "NONE")]
    Forbidden,
}

impl FileRequirement {
    /// Whether a node with the given byte-stream flag meets the requirement.
    #[must_use]
    pub const fn admits(self, byte_stream: bool) -> bool {
        match self {
            Self::Required => byte_stream,
            Self::Optional => true,
            Self::Forbidden => !byte_stream,
        }
    }
}

/// Property values the system supplies from file information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuppliedProperty {
    FileName,
    FileSize,
    FileFormat,
    FileCreated,
    FileModified,
}

/// A classification of content-tree nodes.
///
/// Equality and hashing use [`NodeType::id`] only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    pub id: NodeTypeId,
    /// Owning profile, stamped when the profile is validated.
    #[serde(skip)]
    profile: ProfileId,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// URIs of the domain-object classes this node type maps to.
    #[serde(default)]
    pub domain_types: Vec<String>,
    /// Legal parents; a node is legal when any one constraint admits its parent.
    #[serde(default)]
    pub parent_constraints: Vec<NodeConstraint>,
    #[serde(default)]
    pub property_constraints: Vec<PropertyConstraint>,
    /// Properties that nodes of this type accept from an ancestor.
    #[serde(default)]
    pub inheritable_properties: Vec<PropertyTypeId>,
    #[serde(default)]
    pub default_property_values: Vec<Property>,
    #[serde(default)]
    pub supplied_properties: BTreeMap<PropertyTypeId, SuppliedProperty>,
    #[serde(default)]
    pub file_requirement: FileRequirement,
    /// Preferred number of file-bearing children; a tie-break, not a rule.
    #[serde(default)]
    pub preferred_file_children: Option<Cardinality>,
}

impl NodeType {
    #[must_use]
    pub fn new(id: impl Into<NodeTypeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            profile: ProfileId::default(),
            label: label.into(),
            description: None,
            domain_types: Vec::new(),
            parent_constraints: Vec::new(),
            property_constraints: Vec::new(),
            inheritable_properties: Vec::new(),
            default_property_values: Vec::new(),
            supplied_properties: BTreeMap::new(),
            file_requirement: FileRequirement::default(),
            preferred_file_children: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, constraint: NodeConstraint) -> Self {
        self.parent_constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn with_property(mut self, constraint: PropertyConstraint) -> Self {
        self.property_constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn with_inheritable(mut self, property: impl Into<PropertyTypeId>) -> Self {
        self.inheritable_properties.push(property.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: Property) -> Self {
        self.default_property_values.push(value);
        self
    }

    #[must_use]
    pub const fn with_file_requirement(mut self, requirement: FileRequirement) -> Self {
        self.file_requirement = requirement;
        self
    }

    #[must_use]
    pub const fn with_preferred_file_children(mut self, preferred: Cardinality) -> Self {
        self.preferred_file_children = Some(preferred);
        self
    }

    /// Identifier of the profile that declares this type.
    #[must_use]
    pub const fn profile(&self) -> &ProfileId {
        &self.profile
    }

    pub(crate) fn set_profile(&mut self, profile: ProfileId) {
        self.profile = profile;
    }

    #[must_use]
    pub fn is_inheritable(&self, property: &str) -> bool {
        self.inheritable_properties
            .iter()
            .any(|p| p.as_str() == property)
    }

    #[must_use]
    pub fn property_constraint(&self, property: &str) -> Option<&PropertyConstraint> {
        self.property_constraints
            .iter()
            .find(|c| c.property_type.as_str() == property)
    }

    /// Whether this type recognizes `property` at all.
    #[must_use]
    pub fn allows_property(&self, property: &str) -> bool {
        self.property_constraint(property).is_some()
    }

    /// Whether a node of this type may sit under a parent of `parent_type`
    /// (or at the root, when `parent_type` is `None`).
    #[must_use]
    pub fn allows_parent(
        &self,
        parent_type: Option<&NodeTypeId>,
        relation: Option<&StructuralRelation>,
    ) -> bool {
        let slot = parent_type.map(|t| (Some(t), relation));
        self.parent_constraints.iter().any(|c| c.admits_slot(slot))
    }

    /// Whether a node of this type may be the root of a tree.
    #[must_use]
    pub fn can_be_root(&self) -> bool {
        self.allows_parent(None, None)
    }

    /// Whether `count` file-bearing children matches the preferred count.
    /// Types without a preference never match.
    #[must_use]
    pub fn prefers_file_children(&self, count: usize) -> bool {
        self.preferred_file_children
            .is_some_and(|preferred| preferred.admits(count))
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeType {}

impl Hash for NodeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
