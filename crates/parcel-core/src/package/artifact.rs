use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use url::Url;

use super::ArtifactReference;
use crate::error::{ErrorCode, ToolError};
use crate::profile::{NodeType, Property, PropertyTypeId, PropertyValue};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Whether a property name holds plain strings or value groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Simple,
    Group,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => f.write_str("simple values"),
            Self::Group => f.write_str("value groups"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// A value of one kind was added under a name holding the other kind.
    #[error("property '{property}' holds {held}; cannot add {attempted}")]
    MixedPropertyKinds {
        property: String,
        held: PropertyKind,
        attempted: PropertyKind,
    },

    #[error("relationship name is empty")]
    EmptyRelationshipName,

    /// A URI-only relationship was given a target that is not a URI.
    #[error("relationship '{relationship}' requires URI targets; '{target}' is not one")]
    TargetNotUri {
        relationship: String,
        target: String,
    },
}

impl ArtifactError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MixedPropertyKinds { .. } => ErrorCode::PropertyKindMismatch,
            Self::EmptyRelationshipName | Self::TargetNotUri { .. } => ErrorCode::InvalidReference,
        }
    }
}

impl From<ArtifactError> for ToolError {
    fn from(err: ArtifactError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// PropertyValueGroup
// ---------------------------------------------------------------------------

/// A composite property value, such as a contact record.
///
/// Equality, ordering, and hashing use the sub-property map only; the name
/// is a display label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyValueGroup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    values: BTreeMap<String, BTreeSet<String>>,
}

impl PropertyValueGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, sub_property: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_sub_property_value(sub_property, value);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_sub_property_value(
        &mut self,
        sub_property: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.values
            .entry(sub_property.into())
            .or_default()
            .insert(value.into());
    }

    #[must_use]
    pub fn sub_property_values(&self, sub_property: &str) -> Option<&BTreeSet<String>> {
        self.values.get(sub_property)
    }

    #[must_use]
    pub const fn sub_properties(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.values
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeSet::is_empty)
    }
}

impl PartialEq for PropertyValueGroup {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for PropertyValueGroup {}

impl PartialOrd for PropertyValueGroup {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyValueGroup {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.values.cmp(&other.values)
    }
}

impl Hash for PropertyValueGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

// ---------------------------------------------------------------------------
// PropertyValues
// ---------------------------------------------------------------------------

/// All values stored under one property name: either plain strings or
/// value groups, never a mix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum PropertyValues {
    Simple(BTreeSet<String>),
    Groups(BTreeSet<PropertyValueGroup>),
}

impl PropertyValues {
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        match self {
            Self::Simple(_) => PropertyKind::Simple,
            Self::Groups(_) => PropertyKind::Group,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Simple(values) => values.is_empty(),
            Self::Groups(groups) => groups.is_empty(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Simple(values) => values.len(),
            Self::Groups(groups) => groups.len(),
        }
    }

    /// Artifact-level form of a typed profile value.
    #[must_use]
    pub fn from_property(property: &Property) -> Self {
        match &property.value {
            PropertyValue::Complex(subs) => {
                let mut group = PropertyValueGroup::new(property.property_type.as_str());
                for sub in subs {
                    if let Some(text) = sub.value.to_text() {
                        group.add_sub_property_value(sub.property_type.as_str(), text);
                    }
                }
                Self::Groups(BTreeSet::from([group]))
            }
            value => Self::Simple(value.to_text().into_iter().collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// PackageRelationship
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RelationshipDocument {
    name: String,
    #[serde(default)]
    targets: BTreeSet<String>,
    #[serde(default)]
    requires_uri: bool,
}

/// A named edge from an artifact to a set of targets.
///
/// Equality is structural over name, targets, and the URI flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RelationshipDocument")]
pub struct PackageRelationship {
    name: String,
    targets: BTreeSet<String>,
    requires_uri: bool,
}

impl PackageRelationship {
    /// # Errors
    ///
    /// Returns an error for an empty name, or when `requires_uri` is set and
    /// a target does not parse as an absolute URI.
    pub fn new<I, S>(
        name: impl Into<String>,
        targets: I,
        requires_uri: bool,
    ) -> Result<Self, ArtifactError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(ArtifactError::EmptyRelationshipName);
        }
        let targets: BTreeSet<String> = targets.into_iter().map(Into::into).collect();
        if requires_uri {
            if let Some(bad) = targets.iter().find(|t| Url::parse(t).is_err()) {
                return Err(ArtifactError::TargetNotUri {
                    relationship: name,
                    target: bad.clone(),
                });
            }
        }
        Ok(Self {
            name,
            targets,
            requires_uri,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    #[must_use]
    pub const fn requires_uri(&self) -> bool {
        self.requires_uri
    }

    #[must_use]
    pub fn contains_target(&self, target: &str) -> bool {
        self.targets.contains(target)
    }
}

impl TryFrom<RelationshipDocument> for PackageRelationship {
    type Error = ArtifactError;

    fn try_from(doc: RelationshipDocument) -> Result<Self, Self::Error> {
        Self::new(doc.name, doc.targets, doc.requires_uri)
    }
}

// ---------------------------------------------------------------------------
// PackageArtifact
// ---------------------------------------------------------------------------

/// A node of the user-editable content graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageArtifact {
    id: String,
    artifact_type: String,
    #[serde(default)]
    artifact_ref: Option<ArtifactReference>,
    #[serde(default)]
    byte_stream: bool,
    #[serde(default)]
    ignored: bool,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValues>,
    #[serde(default)]
    relationships: Vec<PackageRelationship>,
}

impl PackageArtifact {
    #[must_use]
    pub fn new(id: impl Into<String>, artifact_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            artifact_type: artifact_type.into(),
            artifact_ref: None,
            byte_stream: false,
            ignored: false,
            properties: BTreeMap::new(),
            relationships: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_ref(mut self, reference: ArtifactReference) -> Self {
        self.artifact_ref = Some(reference);
        self
    }

    #[must_use]
    pub const fn with_byte_stream(mut self, byte_stream: bool) -> Self {
        self.byte_stream = byte_stream;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the artifact's node type.
    #[must_use]
    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn set_artifact_type(&mut self, artifact_type: impl Into<String>) {
        self.artifact_type = artifact_type.into();
    }

    #[must_use]
    pub const fn artifact_ref(&self) -> Option<&ArtifactReference> {
        self.artifact_ref.as_ref()
    }

    pub fn set_artifact_ref(&mut self, reference: Option<ArtifactReference>) {
        self.artifact_ref = reference;
    }

    /// Whether the artifact is a file rather than a container.
    #[must_use]
    pub const fn is_byte_stream(&self) -> bool {
        self.byte_stream
    }

    pub const fn set_byte_stream(&mut self, byte_stream: bool) {
        self.byte_stream = byte_stream;
    }

    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub const fn set_ignored(&mut self, ignored: bool) {
        self.ignored = ignored;
    }

    // -- properties ---------------------------------------------------------

    fn check_kind(&self, name: &str, attempted: PropertyKind) -> Result<(), ArtifactError> {
        match self.properties.get(name) {
            Some(existing) if !existing.is_empty() && existing.kind() != attempted => {
                Err(ArtifactError::MixedPropertyKinds {
                    property: name.to_string(),
                    held: existing.kind(),
                    attempted,
                })
            }
            _ => Ok(()),
        }
    }

    /// Add one plain value. Duplicate values collapse.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::MixedPropertyKinds`] if `name` holds groups.
    pub fn add_simple_property_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ArtifactError> {
        let name = name.into();
        self.check_kind(&name, PropertyKind::Simple)?;
        let entry = self
            .properties
            .entry(name)
            .or_insert_with(|| PropertyValues::Simple(BTreeSet::new()));
        if let PropertyValues::Groups(_) = entry {
            *entry = PropertyValues::Simple(BTreeSet::new());
        }
        if let PropertyValues::Simple(values) = entry {
            values.insert(value.into());
        }
        Ok(())
    }

    /// Replace every value of `name` with plain `values`. An empty iterator
    /// leaves an empty set behind.
    pub fn set_simple_property_values<I, S>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.properties
            .insert(name.into(), PropertyValues::Simple(values));
    }

    /// Plain values of `name`; `None` when absent or grouped.
    #[must_use]
    pub fn simple_property_values(&self, name: &str) -> Option<&BTreeSet<String>> {
        match self.properties.get(name) {
            Some(PropertyValues::Simple(values)) => Some(values),
            _ => None,
        }
    }

    /// Add one value group. Groups with equal sub-property maps collapse.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::MixedPropertyKinds`] if `name` holds plain values.
    pub fn add_property_value_group(
        &mut self,
        name: impl Into<String>,
        group: PropertyValueGroup,
    ) -> Result<(), ArtifactError> {
        let name = name.into();
        self.check_kind(&name, PropertyKind::Group)?;
        let entry = self
            .properties
            .entry(name)
            .or_insert_with(|| PropertyValues::Groups(BTreeSet::new()));
        if let PropertyValues::Simple(_) = entry {
            *entry = PropertyValues::Groups(BTreeSet::new());
        }
        if let PropertyValues::Groups(groups) = entry {
            groups.insert(group);
        }
        Ok(())
    }

    pub fn set_property_value_groups(
        &mut self,
        name: impl Into<String>,
        groups: impl IntoIterator<Item = PropertyValueGroup>,
    ) {
        self.properties.insert(
            name.into(),
            PropertyValues::Groups(groups.into_iter().collect()),
        );
    }

    /// Value groups of `name`; `None` when absent or plain.
    #[must_use]
    pub fn property_value_groups(&self, name: &str) -> Option<&BTreeSet<PropertyValueGroup>> {
        match self.properties.get(name) {
            Some(PropertyValues::Groups(groups)) => Some(groups),
            _ => None,
        }
    }

    /// Whether `name` holds at least one plain value.
    #[must_use]
    pub fn has_simple_property(&self, name: &str) -> bool {
        self.simple_property_values(name)
            .is_some_and(|values| !values.is_empty())
    }

    /// Whether `name` holds at least one value group.
    #[must_use]
    pub fn has_property_value_group(&self, name: &str) -> bool {
        self.property_value_groups(name)
            .is_some_and(|groups| !groups.is_empty())
    }

    /// Whether `name` holds a non-empty value of either kind.
    #[must_use]
    pub fn has_property_value(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .is_some_and(|values| !values.is_empty())
    }

    #[must_use]
    pub fn property_values(&self, name: &str) -> Option<&PropertyValues> {
        self.properties.get(name)
    }

    /// Replace `name` with `values` of either kind.
    pub fn set_property_values(&mut self, name: impl Into<String>, values: PropertyValues) {
        self.properties.insert(name.into(), values);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValues> {
        self.properties.remove(name)
    }

    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, PropertyValues> {
        &self.properties
    }

    /// Property names in sorted order, including names with empty value sets.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Fill in `node_type`'s default values for properties without a value.
    /// Returns the names that were filled.
    pub fn apply_default_values(&mut self, node_type: &NodeType) -> Vec<PropertyTypeId> {
        let mut applied = Vec::new();
        for default in &node_type.default_property_values {
            let name = default.property_type.as_str();
            if self.has_property_value(name) {
                continue;
            }
            self.properties
                .insert(name.to_string(), PropertyValues::from_property(default));
            applied.push(default.property_type.clone());
        }
        applied
    }

    // -- relationships ------------------------------------------------------

    #[must_use]
    pub fn relationships(&self) -> &[PackageRelationship] {
        &self.relationships
    }

    pub fn add_relationship(&mut self, relationship: PackageRelationship) {
        if !self.relationships.contains(&relationship) {
            self.relationships.push(relationship);
        }
    }

    /// Relationships called `name`, in insertion order.
    pub fn relationships_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a PackageRelationship> + use<'a, 'n> {
        self.relationships.iter().filter(move |r| r.name == name)
    }

    /// First relationship called `name` whose targets include every one of
    /// `targets`. This is a subset match: extra targets on the relationship
    /// do not prevent a hit.
    #[must_use]
    pub fn find_relationship(&self, name: &str, targets: &[&str]) -> Option<&PackageRelationship> {
        self.relationships_named(name)
            .find(|r| targets.iter().all(|t| r.contains_target(t)))
    }

    /// Remove every relationship called `name` that has `target` among its
    /// targets. The whole relationship goes, including its other targets.
    /// Empty arguments are a no-op. Returns the number removed.
    pub fn remove_relationship(&mut self, name: &str, target: &str) -> usize {
        if name.is_empty() || target.is_empty() {
            return 0;
        }
        let before = self.relationships.len();
        self.relationships
            .retain(|r| !(r.name == name && r.contains_target(target)));
        before - self.relationships.len()
    }

    /// Keep only the relationships for which `keep` returns true.
    pub fn retain_relationships(&mut self, keep: impl FnMut(&PackageRelationship) -> bool) {
        self.relationships.retain(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creator(name: &str, email: &str) -> PropertyValueGroup {
        PropertyValueGroup::new("creator")
            .with_value("creatorName", name)
            .with_value("creatorEmail", email)
    }

    #[test]
    fn simple_values_collapse_duplicates() {
        let mut artifact = PackageArtifact::new("a", "Collection");
        artifact
            .add_simple_property_value("publisher", "Acme")
            .expect("simple value");
        artifact
            .add_simple_property_value("publisher", "Acme")
            .expect("simple value");
        assert_eq!(
            artifact.simple_property_values("publisher"),
            Some(&BTreeSet::from(["Acme".to_string()]))
        );
        assert!(artifact.has_simple_property("publisher"));
        assert!(!artifact.has_property_value_group("publisher"));
    }

    #[test]
    fn set_with_no_values_leaves_an_empty_set() {
        let mut artifact = PackageArtifact::new("a", "Collection");
        artifact.set_simple_property_values("title", Vec::<String>::new());
        assert_eq!(artifact.simple_property_values("title"), Some(&BTreeSet::new()));
        assert!(!artifact.has_simple_property("title"));
        assert!(!artifact.has_property_value("title"));
    }

    #[test]
    fn mixing_kinds_under_one_name_is_rejected() {
        let mut artifact = PackageArtifact::new("a", "Project");
        artifact
            .add_property_value_group("creator", creator("Ada", "ada@example.org"))
            .expect("group");
        let err = artifact
            .add_simple_property_value("creator", "Ada")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PropertyKindMismatch);

        artifact
            .add_simple_property_value("publisher", "Acme")
            .expect("simple");
        assert!(
            artifact
                .add_property_value_group("publisher", creator("x", "y"))
                .is_err()
        );
    }

    #[test]
    fn empty_property_may_switch_kind() {
        let mut artifact = PackageArtifact::new("a", "Project");
        artifact.set_simple_property_values("creator", Vec::<String>::new());
        artifact
            .add_property_value_group("creator", creator("Ada", "ada@example.org"))
            .expect("empty simple set does not pin the kind");
        assert!(artifact.has_property_value_group("creator"));
    }

    #[test]
    fn groups_compare_by_sub_properties_only() {
        let a = creator("Ada", "ada@example.org");
        let mut b = PropertyValueGroup::new("author");
        b.add_sub_property_value("creatorEmail", "ada@example.org");
        b.add_sub_property_value("creatorName", "Ada");
        assert_eq!(a, b);

        let mut artifact = PackageArtifact::new("a", "Project");
        artifact.add_property_value_group("creator", a).expect("group");
        artifact.add_property_value_group("creator", b).expect("group");
        assert_eq!(artifact.property_value_groups("creator").map(BTreeSet::len), Some(1));
    }

    #[test]
    fn find_relationship_is_a_subset_match() {
        let mut artifact = PackageArtifact::new("p", "Project");
        artifact.add_relationship(
            PackageRelationship::new("hasMember", ["a", "b", "c"], false).expect("relationship"),
        );
        assert!(artifact.find_relationship("hasMember", &["a", "b"]).is_some());
        assert!(artifact.find_relationship("hasMember", &["a", "d"]).is_none());
        assert!(artifact.find_relationship("isMemberOf", &["a"]).is_none());
    }

    #[test]
    fn found_relationship_outlives_the_lookup_name() {
        let mut artifact = PackageArtifact::new("p", "Project");
        artifact.add_relationship(
            PackageRelationship::new("hasMember", ["a", "b"], false).expect("relationship"),
        );
        let found = {
            let name = String::from("hasMember");
            artifact.find_relationship(&name, &["a"])
        };
        assert!(found.is_some_and(|r| r.contains_target("b")));
    }

    #[test]
    fn remove_relationship_drops_whole_relationship() {
        let mut artifact = PackageArtifact::new("p", "Project");
        artifact.add_relationship(
            PackageRelationship::new("hasMember", ["a", "b"], false).expect("relationship"),
        );
        artifact.add_relationship(
            PackageRelationship::new("hasMember", ["c"], false).expect("relationship"),
        );

        assert_eq!(artifact.remove_relationship("", "a"), 0);
        assert_eq!(artifact.remove_relationship("hasMember", ""), 0);
        assert_eq!(artifact.relationships().len(), 2);

        assert_eq!(artifact.remove_relationship("hasMember", "a"), 1);
        assert!(artifact.find_relationship("hasMember", &["b"]).is_none());
        assert!(artifact.find_relationship("hasMember", &["c"]).is_some());
    }

    #[test]
    fn uri_relationships_validate_targets() {
        assert!(PackageRelationship::new("seeAlso", ["https://example.org/x"], true).is_ok());
        let err = PackageRelationship::new("seeAlso", ["not a uri"], true).unwrap_err();
        assert!(matches!(err, ArtifactError::TargetNotUri { .. }));
        assert_eq!(
            PackageRelationship::new("", ["a"], false).unwrap_err(),
            ArtifactError::EmptyRelationshipName
        );
    }

    #[test]
    fn relationship_equality_is_structural() {
        let a = PackageRelationship::new("seeAlso", ["https://a.org", "https://b.org"], false)
            .expect("rel");
        let b = PackageRelationship::new("seeAlso", ["https://b.org", "https://a.org"], false)
            .expect("rel");
        let c = PackageRelationship::new("seeAlso", ["https://a.org", "https://b.org"], true)
            .expect("rel");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn defaults_fill_only_missing_properties() {
        let node_type = NodeType::new("Metadata", "Metadata")
            .with_default(Property::unchecked(
                "description",
                PropertyValue::String("Supplementary metadata".into()),
            ))
            .with_default(Property::unchecked("title", PropertyValue::String("untitled".into())));

        let mut artifact = PackageArtifact::new("m", "Metadata");
        artifact
            .add_simple_property_value("title", "readme.txt")
            .expect("simple");

        let applied = artifact.apply_default_values(&node_type);
        assert_eq!(applied, vec![PropertyTypeId::new("description")]);
        assert!(
            artifact
                .simple_property_values("title")
                .is_some_and(|v| v.contains("readme.txt"))
        );
    }

    #[test]
    fn complex_defaults_become_groups() {
        let value = Property::unchecked(
            "creator",
            PropertyValue::Complex(vec![Property::unchecked(
                "creatorName",
                PropertyValue::String("Ada".into()),
            )]),
        );
        let values = PropertyValues::from_property(&value);
        assert_eq!(values.kind(), PropertyKind::Group);
        assert_eq!(values.len(), 1);
    }
}
