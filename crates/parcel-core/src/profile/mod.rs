//! Domain profiles: the ontology that decides which content trees are legal.
//!
//! A [`DomainProfile`] enumerates the node types, property types, property
//! categories, and node transforms of one domain. Profiles are loaded once
//! (see [`store::ProfileStore`]) and shared immutably behind `Arc` for the
//! rest of the process.
//!
//! # Identity
//!
//! A node type knows its owning profile and a profile enumerates its node
//! types. That back-reference is held as a [`ProfileId`] only, never as a
//! pointer, and equality/hashing of both [`DomainProfile`] and
//! [`NodeType`] compare identifiers only. Nothing in this module recurses
//! through the owner relation.
//!
//! # Submodules
//!
//! - [`constraint`]: node constraints and the constraint evaluator.
//! - [`node_type`]: node types, file requirements, supplied properties.
//! - [`property`]: property types, constraints, categories, and values.
//! - [`transform`]: node transform rules.
//! - [`store`]: the read-only profile repository.
//! - [`builtin`]: the embedded business-object profile.

#![allow(clippy::module_name_repetitions)]

pub mod builtin;
pub mod constraint;
pub mod node_type;
pub mod property;
pub mod store;
pub mod transform;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ToolError};

pub use constraint::{NodeConstraint, StructuralRelation};
pub use node_type::{FileRequirement, NodeType, SuppliedProperty};
pub use property::{
    Cardinality, Property, PropertyCategory, PropertyConstraint, PropertyType, PropertyValue,
    PropertyValueHint, PropertyValueType,
};
pub use store::ProfileStore;
pub use transform::NodeTransform;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Identifier of a [`DomainProfile`].
    ProfileId
);
identifier!(
    /// Identifier of a [`NodeType`], unique within its profile.
    NodeTypeId
);
identifier!(
    /// Identifier of a [`PropertyType`]; artifacts key their properties by it.
    PropertyTypeId
);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while building a profile or reading typed property values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    /// An identifier was empty.
    #[error("{context} has an empty identifier")]
    EmptyId { context: String },

    /// Two node types share an identifier.
    #[error("duplicate node type '{0}'")]
    DuplicateNodeType(NodeTypeId),

    /// Two property types share an identifier.
    #[error("duplicate property type '{0}'")]
    DuplicatePropertyType(PropertyTypeId),

    /// A constraint or transform names a node type the profile does not declare.
    #[error("{context} references unknown node type '{id}'")]
    UnknownNodeType { context: String, id: NodeTypeId },

    /// A constraint or category names a property type the profile does not declare.
    #[error("{context} references unknown property type '{id}'")]
    UnknownPropertyType { context: String, id: PropertyTypeId },

    /// A property value was set or read as the wrong kind.
    #[error("property '{property}' holds {actual:?}, not {expected:?}")]
    ValueKind {
        property: PropertyTypeId,
        expected: PropertyValueType,
        actual: PropertyValueType,
    },
}

impl ProfileError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ValueKind { .. } => ErrorCode::PropertyKindMismatch,
            _ => ErrorCode::ProfileInvalid,
        }
    }
}

impl From<ProfileError> for ToolError {
    fn from(err: ProfileError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// DomainProfile
// ---------------------------------------------------------------------------

/// A domain ontology: node types, property types, categories, and transforms.
///
/// Construct through [`ProfileDocument`] (`DomainProfile::try_from`) so that
/// every cross reference is checked once, up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ProfileDocument")]
pub struct DomainProfile {
    id: ProfileId,
    label: String,
    description: Option<String>,
    domain_id: String,
    node_types: Vec<NodeType>,
    property_types: Vec<PropertyType>,
    property_categories: Vec<PropertyCategory>,
    node_transforms: Vec<NodeTransform>,
}

impl DomainProfile {
    #[must_use]
    pub const fn id(&self) -> &ProfileId {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Identifier of the domain this ontology describes.
    #[must_use]
    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    /// Node types in declaration order.
    #[must_use]
    pub fn node_types(&self) -> &[NodeType] {
        &self.node_types
    }

    #[must_use]
    pub fn node_type(&self, id: &str) -> Option<&NodeType> {
        self.node_types.iter().find(|t| t.id.as_str() == id)
    }

    #[must_use]
    pub fn property_types(&self) -> &[PropertyType] {
        &self.property_types
    }

    #[must_use]
    pub fn property_type(&self, id: &str) -> Option<&PropertyType> {
        self.property_types.iter().find(|t| t.id.as_str() == id)
    }

    #[must_use]
    pub fn property_categories(&self) -> &[PropertyCategory] {
        &self.property_categories
    }

    #[must_use]
    pub fn node_transforms(&self) -> &[NodeTransform] {
        &self.node_transforms
    }

    /// Transforms whose source type is `source`, in declaration order.
    pub fn transforms_from<'a, 's>(
        &'a self,
        source: &'s NodeTypeId,
    ) -> impl Iterator<Item = &'a NodeTransform> + use<'a, 's> {
        self.node_transforms
            .iter()
            .filter(move |t| &t.source_type == source)
    }
}

impl PartialEq for DomainProfile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DomainProfile {}

impl Hash for DomainProfile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// ProfileDocument
// ---------------------------------------------------------------------------

/// Unvalidated profile definition, as read from a JSON or YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub id: ProfileId,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain_id: String,
    #[serde(default)]
    pub node_types: Vec<NodeType>,
    #[serde(default)]
    pub property_types: Vec<PropertyType>,
    #[serde(default)]
    pub property_categories: Vec<PropertyCategory>,
    #[serde(default)]
    pub node_transforms: Vec<NodeTransform>,
}

impl TryFrom<ProfileDocument> for DomainProfile {
    type Error = ProfileError;

    fn try_from(doc: ProfileDocument) -> Result<Self, Self::Error> {
        if doc.id.as_str().is_empty() {
            return Err(ProfileError::EmptyId {
                context: "profile".to_string(),
            });
        }

        let mut node_ids: BTreeSet<&NodeTypeId> = BTreeSet::new();
        for node_type in &doc.node_types {
            if node_type.id.as_str().is_empty() {
                return Err(ProfileError::EmptyId {
                    context: format!("node type '{}'", node_type.label),
                });
            }
            if !node_ids.insert(&node_type.id) {
                return Err(ProfileError::DuplicateNodeType(node_type.id.clone()));
            }
        }

        let mut property_ids: BTreeSet<&PropertyTypeId> = BTreeSet::new();
        for property_type in &doc.property_types {
            if property_type.id.as_str().is_empty() {
                return Err(ProfileError::EmptyId {
                    context: format!("property type '{}'", property_type.label),
                });
            }
            if !property_ids.insert(&property_type.id) {
                return Err(ProfileError::DuplicatePropertyType(property_type.id.clone()));
            }
        }

        let check_node = |context: &str, id: &NodeTypeId| {
            if node_ids.contains(id) {
                Ok(())
            } else {
                Err(ProfileError::UnknownNodeType {
                    context: context.to_string(),
                    id: id.clone(),
                })
            }
        };
        let check_property = |context: &str, id: &PropertyTypeId| {
            if property_ids.contains(id) {
                Ok(())
            } else {
                Err(ProfileError::UnknownPropertyType {
                    context: context.to_string(),
                    id: id.clone(),
                })
            }
        };

        for property_type in &doc.property_types {
            let context = format!("property type '{}'", property_type.id);
            for sub in &property_type.sub_types {
                check_property(&context, &sub.property_type)?;
            }
        }

        for node_type in &doc.node_types {
            let context = format!("node type '{}'", node_type.id);
            for constraint in &node_type.parent_constraints {
                for id in &constraint.node_types {
                    check_node(&context, id)?;
                }
            }
            for constraint in &node_type.property_constraints {
                check_property(&context, &constraint.property_type)?;
            }
            for id in &node_type.inheritable_properties {
                check_property(&context, id)?;
            }
            for id in node_type.supplied_properties.keys() {
                check_property(&context, id)?;
            }
            for default in &node_type.default_property_values {
                check_property(&context, &default.property_type)?;
                let declared = doc
                    .property_types
                    .iter()
                    .find(|t| t.id == default.property_type)
                    .map(|t| t.value_type);
                if let Some(expected) = declared {
                    let actual = default.value.value_type();
                    if actual != expected {
                        return Err(ProfileError::ValueKind {
                            property: default.property_type.clone(),
                            expected,
                            actual,
                        });
                    }
                }
            }
        }

        for category in &doc.property_categories {
            let context = format!("property category '{}'", category.label);
            for id in &category.property_types {
                check_property(&context, id)?;
            }
        }

        for node_transform in &doc.node_transforms {
            let context = format!("transform '{}'", node_transform.label);
            for id in node_transform.referenced_node_types() {
                check_node(&context, id)?;
            }
        }

        let ProfileDocument {
            id,
            label,
            description,
            domain_id,
            mut node_types,
            property_types,
            property_categories,
            node_transforms,
        } = doc;

        for node_type in &mut node_types {
            node_type.set_profile(id.clone());
        }

        Ok(Self {
            id,
            label,
            description,
            domain_id,
            node_types,
            property_types,
            property_categories,
            node_transforms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> ProfileDocument {
        ProfileDocument {
            id: ProfileId::new("urn:test:profile"),
            label: "Test".into(),
            domain_id: "urn:test:domain".into(),
            node_types: vec![
                NodeType::new("Root", "Root").with_parent(NodeConstraint::none()),
                NodeType::new("Leaf", "Leaf")
                    .with_parent(NodeConstraint::of_types(["Root"]))
                    .with_property(PropertyConstraint::new("title", Cardinality::exactly(1))),
            ],
            property_types: vec![PropertyType::new("title", "Title", PropertyValueType::String)],
            ..ProfileDocument::default()
        }
    }

    #[test]
    fn valid_document_stamps_owner_on_node_types() {
        let profile = DomainProfile::try_from(doc()).expect("valid profile");
        let leaf = profile.node_type("Leaf").expect("leaf type");
        assert_eq!(leaf.profile().as_str(), "urn:test:profile");
        assert!(profile.node_type("Missing").is_none());
    }

    #[test]
    fn duplicate_node_type_is_rejected() {
        let mut d = doc();
        d.node_types.push(NodeType::new("Leaf", "Again"));
        let err = DomainProfile::try_from(d).unwrap_err();
        assert_eq!(err, ProfileError::DuplicateNodeType(NodeTypeId::new("Leaf")));
    }

    #[test]
    fn unknown_parent_type_is_rejected() {
        let mut d = doc();
        d.node_types
            .push(NodeType::new("Orphan", "Orphan").with_parent(NodeConstraint::of_types(["Nope"])));
        let err = DomainProfile::try_from(d).unwrap_err();
        assert!(matches!(err, ProfileError::UnknownNodeType { id, .. } if id.as_str() == "Nope"));
        assert_eq!(
            ProfileError::DuplicateNodeType(NodeTypeId::new("x")).code(),
            ErrorCode::ProfileInvalid
        );
    }

    #[test]
    fn unknown_transform_result_is_rejected() {
        let mut d = doc();
        d.node_transforms
            .push(NodeTransform::new("bad", "Leaf").retype_to("Ghost"));
        assert!(DomainProfile::try_from(d).is_err());
    }

    #[test]
    fn default_value_kind_must_match_declaration() {
        let mut d = doc();
        d.node_types[1]
            .default_property_values
            .push(Property::unchecked("title", PropertyValue::Long(4)));
        let err = DomainProfile::try_from(d).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PropertyKindMismatch);
    }

    #[test]
    fn equality_and_hash_use_identifier_only() {
        use std::collections::HashSet;

        let a = DomainProfile::try_from(doc()).expect("valid");
        let mut other = doc();
        other.label = "Renamed".into();
        other.node_types.pop();
        let b = DomainProfile::try_from(other).expect("valid");

        assert_eq!(a, b);
        let set: HashSet<DomainProfile> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
