use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ArtifactReference, PackageArtifact, PropertyValues};
use crate::error::{ErrorCode, ToolError};
use crate::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptionError {
    #[error("artifact id '{0}' is already in the package")]
    DuplicateArtifactId(String),

    #[error("artifact '{0}' is not in the package")]
    ArtifactNotFound(String),

    /// The root reference must match exactly one artifact.
    #[error("root reference '{reference}' matches {matches} artifacts")]
    RootReferenceMismatch {
        reference: ArtifactReference,
        matches: usize,
    },
}

impl DescriptionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateArtifactId(_) => ErrorCode::DuplicateArtifactId,
            Self::ArtifactNotFound(_) => ErrorCode::ArtifactNotFound,
            Self::RootReferenceMismatch { .. } => ErrorCode::RootReferenceMismatch,
        }
    }
}

impl From<DescriptionError> for ToolError {
    fn from(err: DescriptionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Persisted shape of a [`PackageDescription`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptionDocument {
    #[serde(default)]
    pub ontology_id: Option<ProfileId>,
    #[serde(default)]
    pub root_artifact_ref: Option<ArtifactReference>,
    #[serde(default)]
    pub artifacts: Vec<PackageArtifact>,
}

/// The artifact graph of one package.
///
/// Artifacts are keyed by id. Relationship targets are expected to name
/// artifacts of the same description; [`crate::validate::check_integrity`]
/// reports those that do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DescriptionDocument", into = "DescriptionDocument")]
pub struct PackageDescription {
    ontology_id: Option<ProfileId>,
    root_artifact_ref: Option<ArtifactReference>,
    artifacts: BTreeMap<String, PackageArtifact>,
}

impl PackageDescription {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ontology(mut self, ontology_id: impl Into<ProfileId>) -> Self {
        self.ontology_id = Some(ontology_id.into());
        self
    }

    /// Identifier of the domain profile the package is described against.
    #[must_use]
    pub const fn ontology_id(&self) -> Option<&ProfileId> {
        self.ontology_id.as_ref()
    }

    pub fn set_ontology_id(&mut self, ontology_id: Option<ProfileId>) {
        self.ontology_id = ontology_id;
    }

    #[must_use]
    pub const fn root_artifact_ref(&self) -> Option<&ArtifactReference> {
        self.root_artifact_ref.as_ref()
    }

    pub fn set_root_artifact_ref(&mut self, reference: Option<ArtifactReference>) {
        self.root_artifact_ref = reference;
    }

    /// # Errors
    ///
    /// Returns [`DescriptionError::DuplicateArtifactId`] if the id is taken.
    pub fn insert_artifact(&mut self, artifact: PackageArtifact) -> Result<(), DescriptionError> {
        if self.artifacts.contains_key(artifact.id()) {
            return Err(DescriptionError::DuplicateArtifactId(artifact.id().to_string()));
        }
        self.artifacts.insert(artifact.id().to_string(), artifact);
        Ok(())
    }

    #[must_use]
    pub fn artifact(&self, id: &str) -> Option<&PackageArtifact> {
        self.artifacts.get(id)
    }

    pub fn artifact_mut(&mut self, id: &str) -> Option<&mut PackageArtifact> {
        self.artifacts.get_mut(id)
    }

    pub fn remove_artifact(&mut self, id: &str) -> Option<PackageArtifact> {
        self.artifacts.remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.artifacts.contains_key(id)
    }

    /// Artifacts in id order.
    pub fn artifacts(&self) -> impl Iterator<Item = &PackageArtifact> {
        self.artifacts.values()
    }

    pub fn artifacts_mut(&mut self) -> impl Iterator<Item = &mut PackageArtifact> {
        self.artifacts.values_mut()
    }

    pub fn artifact_ids(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifacts whose reference equals `reference`.
    pub fn artifacts_with_ref<'a, 'r>(
        &'a self,
        reference: &'r ArtifactReference,
    ) -> impl Iterator<Item = &'a PackageArtifact> + use<'a, 'r> {
        self.artifacts
            .values()
            .filter(move |a| a.artifact_ref() == Some(reference))
    }

    /// The artifact matched by the root reference, or `None` when no root
    /// reference is set.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::RootReferenceMismatch`] unless exactly one
    /// artifact carries the root reference.
    pub fn root_artifact(&self) -> Result<Option<&PackageArtifact>, DescriptionError> {
        let Some(reference) = &self.root_artifact_ref else {
            return Ok(None);
        };
        let mut matches = self.artifacts_with_ref(reference);
        match (matches.next(), matches.next()) {
            (Some(root), None) => Ok(Some(root)),
            (first, second) => {
                let found = usize::from(first.is_some())
                    + usize::from(second.is_some())
                    + matches.count();
                Err(DescriptionError::RootReferenceMismatch {
                    reference: reference.clone(),
                    matches: found,
                })
            }
        }
    }

    /// BLAKE3 digest over the canonical content: ontology, root reference,
    /// and every artifact in id order with sorted properties.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let field = |hasher: &mut blake3::Hasher, bytes: &[u8]| {
            hasher.update(bytes);
            hasher.update(b"\x00");
        };

        field(
            &mut hasher,
            self.ontology_id.as_ref().map_or("", ProfileId::as_str).as_bytes(),
        );
        field(
            &mut hasher,
            self.root_artifact_ref
                .as_ref()
                .map_or("", ArtifactReference::as_str)
                .as_bytes(),
        );

        for artifact in self.artifacts.values() {
            field(&mut hasher, b"artifact");
            field(&mut hasher, artifact.id().as_bytes());
            field(&mut hasher, artifact.artifact_type().as_bytes());
            field(
                &mut hasher,
                artifact
                    .artifact_ref()
                    .map_or("", ArtifactReference::as_str)
                    .as_bytes(),
            );
            field(
                &mut hasher,
                &[u8::from(artifact.is_byte_stream()), u8::from(artifact.is_ignored())],
            );

            for (name, values) in artifact.properties() {
                field(&mut hasher, b"property");
                field(&mut hasher, name.as_bytes());
                match values {
                    PropertyValues::Simple(values) => {
                        for value in values {
                            field(&mut hasher, value.as_bytes());
                        }
                    }
                    PropertyValues::Groups(groups) => {
                        for group in groups {
                            field(&mut hasher, b"group");
                            for (sub, sub_values) in group.sub_properties() {
                                field(&mut hasher, sub.as_bytes());
                                for value in sub_values {
                                    field(&mut hasher, value.as_bytes());
                                }
                            }
                        }
                    }
                }
            }

            for relationship in artifact.relationships() {
                field(&mut hasher, b"relationship");
                field(&mut hasher, relationship.name().as_bytes());
                field(&mut hasher, &[u8::from(relationship.requires_uri())]);
                for target in relationship.targets() {
                    field(&mut hasher, target.as_bytes());
                }
            }
        }

        format!("blake3:{}", hasher.finalize())
    }
}

impl TryFrom<DescriptionDocument> for PackageDescription {
    type Error = DescriptionError;

    fn try_from(doc: DescriptionDocument) -> Result<Self, Self::Error> {
        let mut description = Self {
            ontology_id: doc.ontology_id,
            root_artifact_ref: doc.root_artifact_ref,
            artifacts: BTreeMap::new(),
        };
        for artifact in doc.artifacts {
            description.insert_artifact(artifact)?;
        }
        Ok(description)
    }
}

impl From<PackageDescription> for DescriptionDocument {
    fn from(description: PackageDescription) -> Self {
        Self {
            ontology_id: description.ontology_id,
            root_artifact_ref: description.root_artifact_ref,
            artifacts: description.artifacts.into_values().collect(),
        }
    }
}
