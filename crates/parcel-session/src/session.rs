//! The editing session.
//!
//! An [`EditSession`] owns one package description and its content tree and
//! keeps them in step: every edit goes through `&mut self`, is applied to
//! the tree or the description, and synced to the other before returning.
//! Only one logical edit is ever in flight.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parcel_core::config::{HierarchyConfig, ProjectConfig};
use parcel_core::error::{ErrorCode, ToolError};
use parcel_core::inherit::{
    InheritanceError, InheritanceOptions, InheritanceReport, apply_all_inheritance,
    apply_inheritance,
};
use parcel_core::package::{ArtifactError, PropertyValues};
use parcel_core::profile::{NodeTypeId, PropertyTypeId};
use parcel_core::tree::{
    AssignError, IdMint, SyncReport, TransformError, TransformOutcome, TreeError,
    applicable_transforms, apply_transform_minting, assign_node_types, valid_node_types,
};
use parcel_core::validate::{ValidationReport, find_invalid_properties, validate_package};
use parcel_core::{
    ContentTree, DomainProfile, NodeTransform, NodeType, PackageDescription, ProfileStore,
};
use tracing::{debug, info, instrument};

use crate::rebuild::{RebuildError, RebuildRequest, Rebuilt, Ticket};
use crate::view::ExpansionState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("node '{0}' is not in the session")]
    NodeNotFound(String),

    #[error("profile '{profile}' defines no node type '{node_type}'")]
    UnknownNodeType { node_type: String, profile: String },

    #[error("node '{id}' cannot take type '{node_type}' where it sits")]
    IllegalNodeType { id: String, node_type: String },

    #[error("no transform '{label}' is defined for node '{id}'")]
    UnknownTransform { id: String, label: String },

    #[error("no profile '{0}' is loaded")]
    UnknownProfile(String),

    #[error("rebuild {ticket} was built from an older package state")]
    StaleRebuild { ticket: Ticket },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error(transparent)]
    Inheritance(#[from] InheritanceError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Rebuild(#[from] RebuildError),
}

impl SessionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Self::UnknownNodeType { .. } => ErrorCode::UnknownNodeType,
            Self::IllegalNodeType { .. } => ErrorCode::TypeAssignmentFailed,
            Self::UnknownTransform { .. } => ErrorCode::UnknownTransform,
            Self::UnknownProfile(_) => ErrorCode::ProfileLoadFailed,
            Self::StaleRebuild { .. } => ErrorCode::StaleRebuild,
            Self::Tree(err) => err.code(),
            Self::Transform(err) => err.code(),
            Self::Assign(err) => err.code(),
            Self::Inheritance(err) => err.code(),
            Self::Artifact(err) => err.code(),
            Self::Rebuild(err) => err.code(),
        }
    }
}

impl From<SessionError> for ToolError {
    fn from(err: SessionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Property changes that follow a node type change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetypeReport {
    /// Properties the new type does not recognize, now removed.
    pub dropped: Vec<String>,
    /// Properties filled from the new type's defaults.
    pub defaults: Vec<PropertyTypeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub outcome: TransformOutcome,
    pub sync: SyncReport,
    /// Property changes on the transformed node and an inserted parent.
    pub retyped: BTreeMap<String, RetypeReport>,
}

#[derive(Debug, Clone)]
pub struct EditSession {
    profile: Arc<DomainProfile>,
    hierarchy: HierarchyConfig,
    inheritance: InheritanceOptions,
    description: PackageDescription,
    tree: ContentTree,
    ids: IdMint,
    generation: u64,
}

impl EditSession {
    /// Open an existing package.
    ///
    /// # Errors
    ///
    /// Returns an error if the package's hierarchy does not form a tree.
    #[instrument(skip_all, fields(profile = %profile.id(), artifacts = description.len()))]
    pub fn open(
        profile: Arc<DomainProfile>,
        hierarchy: HierarchyConfig,
        inheritance: InheritanceOptions,
        mut description: PackageDescription,
    ) -> Result<Self, SessionError> {
        let tree = ContentTree::from_description(&description, &hierarchy)?;
        if description.ontology_id().is_none() {
            description.set_ontology_id(Some(profile.id().clone()));
        }
        info!(nodes = tree.len(), "session opened");
        Ok(Self {
            profile,
            hierarchy,
            inheritance,
            description,
            tree,
            ids: IdMint::default(),
            generation: 0,
        })
    }

    /// Start a new package from a content tree, typically one produced by
    /// scanning a directory. Every node becomes an artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if an edge has no relation and none is configured.
    pub fn create(
        profile: Arc<DomainProfile>,
        hierarchy: HierarchyConfig,
        inheritance: InheritanceOptions,
        tree: ContentTree,
    ) -> Result<Self, SessionError> {
        let mut description = PackageDescription::new().with_ontology(profile.id().clone());
        tree.sync_description(&mut description, &hierarchy)?;
        info!(profile = %profile.id(), nodes = tree.len(), "session created");
        Ok(Self {
            profile,
            hierarchy,
            inheritance,
            description,
            tree,
            ids: IdMint::default(),
            generation: 0,
        })
    }

    /// Open `description` with the profile it names, or the first primary
    /// profile of `store` when it names none.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownProfile`] when no such profile is
    /// loaded, or the errors of [`EditSession::open`].
    pub fn from_store(
        store: &ProfileStore,
        config: &ProjectConfig,
        description: PackageDescription,
    ) -> Result<Self, SessionError> {
        let profile = match description.ontology_id() {
            Some(id) => store
                .profile(id.as_str())
                .ok_or_else(|| SessionError::UnknownProfile(id.to_string()))?,
            None => store
                .primary_domain_profiles()
                .into_iter()
                .next()
                .ok_or_else(|| SessionError::UnknownProfile(String::new()))?,
        };
        Self::open(
            profile,
            config.hierarchy.clone(),
            InheritanceOptions::from(&config.inheritance),
            description,
        )
    }

    /// Name nodes synthesized by transforms from `ids` instead of random
    /// uuids.
    #[must_use]
    pub fn with_id_mint(mut self, ids: IdMint) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    #[must_use]
    pub const fn hierarchy(&self) -> &HierarchyConfig {
        &self.hierarchy
    }

    #[must_use]
    pub const fn description(&self) -> &PackageDescription {
        &self.description
    }

    #[must_use]
    pub const fn tree(&self) -> &ContentTree {
        &self.tree
    }

    /// Number of edits applied so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn content_hash(&self) -> String {
        self.description.content_hash()
    }

    #[must_use]
    pub fn into_description(self) -> PackageDescription {
        self.description
    }

    fn require_node(&self, id: &str) -> Result<(), SessionError> {
        if self.tree.contains(id) {
            Ok(())
        } else {
            Err(SessionError::NodeNotFound(id.to_string()))
        }
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    // -- transforms --

    /// Transforms that apply to node `id` right now.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NodeNotFound`] for unknown ids.
    pub fn available_transforms(&self, id: &str) -> Result<Vec<&NodeTransform>, SessionError> {
        self.require_node(id)?;
        Ok(applicable_transforms(&self.tree, id, &self.profile))
    }

    /// Apply the transform labelled `label` to node `id` and sync the
    /// package. Nodes that changed type lose the properties their new type
    /// does not recognize and gain its defaults.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the session unchanged, when the node's type
    /// has no such transform or the transform does not apply.
    pub fn apply_transform(&mut self, id: &str, label: &str) -> Result<TransformReport, SessionError> {
        self.require_node(id)?;
        let transform = self
            .tree
            .node(id)
            .and_then(|n| n.node_type.as_ref())
            .and_then(|source| {
                self.profile
                    .transforms_from(source)
                    .find(|t| t.label == label)
            })
            .cloned()
            .ok_or_else(|| SessionError::UnknownTransform {
                id: id.to_string(),
                label: label.to_string(),
            })?;

        let mut tree = self.tree.clone();
        let outcome = apply_transform_minting(&mut tree, id, &transform, &mut self.ids)?;
        let sync = tree.sync_description(&mut self.description, &self.hierarchy)?;
        self.tree = tree;

        let mut retyped = BTreeMap::new();
        let changed = outcome
            .retyped_from
            .as_ref()
            .map(|_| id.to_string())
            .into_iter()
            .chain(outcome.inserted_parent.clone());
        for node in changed {
            retyped.insert(node.clone(), self.settle_properties(&node));
        }

        self.touch();
        Ok(TransformReport {
            outcome,
            sync,
            retyped,
        })
    }

    // -- node types --

    /// Node types `id` could take where it sits.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NodeNotFound`] for unknown ids.
    pub fn valid_node_types(&self, id: &str) -> Result<Vec<&NodeTypeId>, SessionError> {
        self.require_node(id)?;
        Ok(valid_node_types(&self.tree, id, &self.profile)?)
    }

    /// Properties node `id` would lose by becoming `node_type`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown nodes or node types.
    pub fn preview_retype(&self, id: &str, node_type: &str) -> Result<Vec<String>, SessionError> {
        self.require_node(id)?;
        let target = self.known_node_type(node_type)?;
        let artifact = self
            .description
            .artifact(id)
            .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))?;
        Ok(find_invalid_properties(artifact, target))
    }

    /// Change the type of node `id`, dropping the properties the new type
    /// does not recognize.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalNodeType`] when the type is not one of
    /// [`EditSession::valid_node_types`].
    #[instrument(skip(self))]
    pub fn commit_retype(&mut self, id: &str, node_type: &str) -> Result<RetypeReport, SessionError> {
        self.known_node_type(node_type)?;
        let legal = self
            .valid_node_types(id)?
            .iter()
            .any(|t| t.as_str() == node_type);
        if !legal {
            return Err(SessionError::IllegalNodeType {
                id: id.to_string(),
                node_type: node_type.to_string(),
            });
        }

        if let Some(node) = self.tree.node_mut(id) {
            node.node_type = Some(NodeTypeId::new(node_type));
        }
        self.tree
            .sync_description(&mut self.description, &self.hierarchy)?;
        let report = self.settle_properties(id);
        info!(
            node = id,
            node_type,
            dropped = report.dropped.len(),
            "node retyped"
        );
        self.touch();
        Ok(report)
    }

    /// Assign a legal type to every node. Returns how many nodes changed.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the session unchanged, when the tree admits
    /// no legal assignment.
    pub fn assign_types(&mut self) -> Result<usize, SessionError> {
        let mut tree = self.tree.clone();
        let changed = assign_node_types(&mut tree, &self.profile)?;
        tree.sync_description(&mut self.description, &self.hierarchy)?;
        let retyped = retyped_nodes(&self.tree, &tree);
        self.tree = tree;

        for id in retyped {
            self.settle_properties(&id);
        }
        if changed > 0 {
            self.touch();
        }
        Ok(changed)
    }

    fn known_node_type(&self, node_type: &str) -> Result<&NodeType, SessionError> {
        self.profile
            .node_type(node_type)
            .ok_or_else(|| SessionError::UnknownNodeType {
                node_type: node_type.to_string(),
                profile: self.profile.id().to_string(),
            })
    }

    /// Drop properties the node's type does not recognize and fill defaults.
    fn settle_properties(&mut self, id: &str) -> RetypeReport {
        let Some(node_type) = self
            .tree
            .node(id)
            .and_then(|n| n.node_type.as_ref())
            .and_then(|t| self.profile.node_type(t.as_str()))
        else {
            return RetypeReport::default();
        };
        let Some(artifact) = self.description.artifact_mut(id) else {
            return RetypeReport::default();
        };

        let dropped = find_invalid_properties(artifact, node_type);
        for property in &dropped {
            artifact.remove_property(property);
        }
        let defaults = artifact.apply_default_values(node_type);
        if !dropped.is_empty() {
            debug!(node = id, ?dropped, "properties dropped");
        }
        RetypeReport { dropped, defaults }
    }

    // -- properties --

    /// # Errors
    ///
    /// Returns an error for unknown nodes or when `property` holds groups.
    pub fn add_simple_property_value(
        &mut self,
        id: &str,
        property: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        self.description
            .artifact_mut(id)
            .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))?
            .add_simple_property_value(property, value)?;
        self.touch();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NodeNotFound`] for unknown nodes.
    pub fn set_property_values(
        &mut self,
        id: &str,
        property: &str,
        values: PropertyValues,
    ) -> Result<(), SessionError> {
        self.description
            .artifact_mut(id)
            .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))?
            .set_property_values(property, values);
        self.touch();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NodeNotFound`] for unknown nodes.
    pub fn remove_property(
        &mut self,
        id: &str,
        property: &str,
    ) -> Result<Option<PropertyValues>, SessionError> {
        let removed = self
            .description
            .artifact_mut(id)
            .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))?
            .remove_property(property);
        if removed.is_some() {
            self.touch();
        }
        Ok(removed)
    }

    // -- inheritance --

    /// # Errors
    ///
    /// Returns an error if `source` is not in the session.
    pub fn apply_inheritance(
        &mut self,
        source: &str,
        property: &str,
    ) -> Result<InheritanceReport, SessionError> {
        let report = apply_inheritance(
            &mut self.description,
            &self.tree,
            source,
            property,
            &self.profile,
            self.inheritance,
        )?;
        if !report.is_noop() {
            self.touch();
        }
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns an error if `source` is not in the session.
    pub fn apply_all_inheritance(
        &mut self,
        source: &str,
    ) -> Result<Vec<InheritanceReport>, SessionError> {
        let reports = apply_all_inheritance(
            &mut self.description,
            &self.tree,
            source,
            &self.profile,
            self.inheritance,
        )?;
        if reports.iter().any(|r| !r.is_noop()) {
            self.touch();
        }
        Ok(reports)
    }

    // -- ignore flags --

    /// Set the ignored flag on `id` and its subtree. Returns the number of
    /// nodes touched.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Tree`] for unknown ids.
    pub fn set_ignored(&mut self, id: &str, ignored: bool) -> Result<usize, SessionError> {
        let touched = self.tree.set_ignored(id, ignored)?;
        self.tree
            .sync_description(&mut self.description, &self.hierarchy)?;
        self.touch();
        Ok(touched)
    }

    // -- validation --

    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        validate_package(&self.description, &self.profile, &self.hierarchy)
    }

    // -- background rebuilds --

    /// Snapshot for a [`crate::rebuild::TreeRebuilder`].
    #[must_use]
    pub fn rebuild_request(&self, expansion: ExpansionState) -> RebuildRequest {
        RebuildRequest {
            description: self.description.clone(),
            hierarchy: self.hierarchy.clone(),
            expansion,
            assign_with: Some(Arc::clone(&self.profile)),
        }
    }

    /// Replace the tree with a rebuilt one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::StaleRebuild`] when the package changed
    /// after the snapshot was taken.
    pub fn install_rebuild(&mut self, rebuilt: Rebuilt) -> Result<(), SessionError> {
        if rebuilt.source_hash != self.description.content_hash() {
            return Err(SessionError::StaleRebuild {
                ticket: rebuilt.ticket,
            });
        }
        let tree = rebuilt.tree;
        let retyped = retyped_nodes(&self.tree, &tree);
        if rebuilt.assigned > 0 {
            tree.sync_description(&mut self.description, &self.hierarchy)?;
        }
        self.tree = tree;
        for id in retyped {
            self.settle_properties(&id);
        }
        self.touch();
        Ok(())
    }
}

/// Ids whose node type differs between `before` and `after`.
fn retyped_nodes(before: &ContentTree, after: &ContentTree) -> Vec<String> {
    after
        .iter()
        .into_iter()
        .filter(|n| before.node(n.id()).map(|b| &b.node_type) != Some(&n.node_type))
        .map(|n| n.id().to_string())
        .collect()
}

/// Read a package description from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_description(path: &Path) -> Result<PackageDescription> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write a package description as pretty JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_description(path: &Path, description: &PackageDescription) -> Result<()> {
    let content =
        serde_json::to_string_pretty(description).context("Failed to serialize package")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use parcel_core::package::{PackageArtifact, PackageRelationship};
    use parcel_core::profile::builtin::business_object_profile;
    use parcel_core::tree::Node;

    fn profile() -> Arc<DomainProfile> {
        Arc::new(business_object_profile().expect("profile"))
    }

    fn scanned_tree() -> ContentTree {
        let mut tree = ContentTree::new();
        tree.set_root(Node::new("root")).expect("root");
        tree.add_child("root", Node::new("raw")).expect("raw");
        tree.add_child("raw", Node::new("a.csv").file()).expect("file");
        tree.add_child("raw", Node::new("README").file()).expect("file");
        tree.add_child("root", Node::new("docs")).expect("docs");
        tree
    }

    fn session() -> EditSession {
        let mut session = EditSession::create(
            profile(),
            HierarchyConfig::default(),
            InheritanceOptions::default(),
            scanned_tree(),
        )
        .expect("session");
        session.assign_types().expect("assignment");
        session
    }

    fn type_of(session: &EditSession, id: &str) -> Option<String> {
        session
            .description()
            .artifact(id)
            .map(|a| a.artifact_type().to_string())
    }

    #[test]
    fn created_session_types_every_artifact() {
        let session = session();
        assert_eq!(session.description().len(), 5);
        assert_eq!(type_of(&session, "root").as_deref(), Some("Project"));
        assert_eq!(type_of(&session, "raw").as_deref(), Some("DataItem"));
        assert_eq!(type_of(&session, "a.csv").as_deref(), Some("DataFile"));
        assert_eq!(type_of(&session, "docs").as_deref(), Some("Collection"));
        assert!(session.generation() > 0);

        // both files take the first file type; no defaults to fill
        let readme = session.description().artifact("README").expect("README");
        assert_eq!(type_of(&session, "README").as_deref(), Some("DataFile"));
        assert!(!readme.has_property_value("description"));
    }

    #[test]
    fn retype_preview_and_commit_drop_unknown_properties() {
        let mut session = session();
        session
            .add_simple_property_value("a.csv", "publisher", "Acme")
            .expect("publisher");
        session
            .add_simple_property_value("a.csv", "title", "a.csv")
            .expect("title");

        assert_eq!(
            session.preview_retype("a.csv", "Metadata").expect("preview"),
            vec!["publisher".to_string()]
        );

        let report = session.commit_retype("a.csv", "Metadata").expect("retype");
        assert_eq!(report.dropped, vec!["publisher".to_string()]);
        assert_eq!(report.defaults.len(), 1);
        let artifact = session.description().artifact("a.csv").expect("a.csv");
        assert_eq!(artifact.artifact_type(), "Metadata");
        assert!(!artifact.has_property_value("publisher"));
        assert!(artifact.has_property_value("title"));
        assert!(artifact.has_property_value("description"));
    }

    #[test]
    fn illegal_and_unknown_types_are_rejected() {
        let mut session = session();
        assert!(matches!(
            session.commit_retype("a.csv", "Collection"),
            Err(SessionError::IllegalNodeType { .. })
        ));
        let err = session.preview_retype("a.csv", "Spaceship").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownNodeType);
        assert!(matches!(
            session.preview_retype("ghost", "DataFile"),
            Err(SessionError::NodeNotFound(_))
        ));
    }

    #[test]
    fn transform_syncs_description_and_settles_properties() {
        let mut session = session();
        let labels: Vec<String> = session
            .available_transforms("a.csv")
            .expect("transforms")
            .iter()
            .map(|t| t.label.clone())
            .collect();
        assert!(labels.contains(&"Data file to metadata of the enclosing collection".to_string()));

        session
            .add_simple_property_value("README", "publisher", "Acme")
            .expect("publisher");
        let generation = session.generation();
        let report = session
            .apply_transform("README", "Data file to metadata file")
            .expect("transform");
        assert_eq!(report.retyped["README"].dropped, vec!["publisher".to_string()]);
        assert_eq!(type_of(&session, "README").as_deref(), Some("Metadata"));
        assert_eq!(session.generation(), generation + 1);

        let err = session
            .apply_transform("README", "No such transform")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownTransform);
    }

    #[test]
    fn rejected_transform_leaves_session_unchanged() {
        let mut session = session();
        let before_hash = session.content_hash();
        let before_tree = session.tree().clone();

        // raw holds data files, not only metadata
        let err = session
            .apply_transform("raw", "Data item to collection")
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transform(TransformError::NotApplicable { .. })
        ));
        assert_eq!(session.content_hash(), before_hash);
        assert_eq!(session.tree(), &before_tree);
    }

    #[test]
    fn inheritance_and_ignore_flags() {
        let mut session = session();
        session
            .add_simple_property_value("root", "publisher", "Acme")
            .expect("publisher");
        session.set_ignored("docs", true).expect("ignore");
        assert!(session
            .description()
            .artifact("docs")
            .is_some_and(PackageArtifact::is_ignored));

        let report = session
            .apply_inheritance("root", "publisher")
            .expect("inheritance");
        assert!(report.updated.contains(&"raw".to_string()));
        assert!(report.updated.contains(&"a.csv".to_string()));
        assert_eq!(
            session
                .description()
                .artifact("raw")
                .and_then(|a| a.simple_property_values("publisher"))
                .cloned(),
            Some(BTreeSet::from(["Acme".to_string()]))
        );
    }

    #[test]
    fn validation_reports_missing_titles() {
        let mut session = session();
        let report = session.validate();
        assert!(report.cardinality.contains_key("root"));
        session
            .add_simple_property_value("root", "title", "Survey")
            .expect("title");
        assert!(!session.validate().cardinality.contains_key("root"));
    }

    #[test]
    fn from_store_uses_primary_profile() {
        let store = ProfileStore::with_builtin().expect("store");
        let mut desc = PackageDescription::new();
        desc.insert_artifact(PackageArtifact::new("p", "Project"))
            .expect("insert");
        let mut child = PackageArtifact::new("c", "Collection");
        child.add_relationship(
            PackageRelationship::new("isMemberOf", ["p"], false).expect("relationship"),
        );
        desc.insert_artifact(child).expect("insert");

        let session =
            EditSession::from_store(&store, &ProjectConfig::default(), desc).expect("session");
        assert_eq!(session.tree().len(), 2);
        assert_eq!(
            session.description().ontology_id(),
            Some(session.profile().id())
        );

        let desc = PackageDescription::new().with_ontology("urn:missing");
        assert!(matches!(
            EditSession::from_store(&store, &ProjectConfig::default(), desc),
            Err(SessionError::UnknownProfile(_))
        ));
    }

    #[test]
    fn description_files_round_trip() {
        let session = session();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("package.json");
        save_description(&path, session.description()).expect("save");
        let loaded = load_description(&path).expect("load");
        assert_eq!(&loaded, session.description());
    }
}
