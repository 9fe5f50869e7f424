//! The package artifact graph.
//!
//! A [`PackageDescription`] owns a set of [`PackageArtifact`]s keyed by id.
//! Artifacts carry typed-by-name properties ([`PropertyValues`]) and named
//! [`PackageRelationship`]s to other artifacts. The hierarchical subset of
//! those relationships forms the content tree (see [`crate::tree`]).

mod artifact;
mod description;
mod reference;

pub use artifact::{
    ArtifactError, PackageArtifact, PackageRelationship, PropertyKind, PropertyValueGroup,
    PropertyValues,
};
pub use description::{DescriptionDocument, DescriptionError, PackageDescription};
pub use reference::{ArtifactReference, ReferenceError};
