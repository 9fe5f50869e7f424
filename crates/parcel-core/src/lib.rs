//! parcel-core library.
//!
//! Domain profiles, the node constraint evaluator, node transforms, the
//! package artifact graph, and property inheritance.
//!
//! # Conventions
//!
//! - **Errors**: module errors derive `thiserror::Error` and map to an
//!   [`error::ErrorCode`]; file and config edges use `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).
//! - **Lookups**: profile and property misses return `Option`, never errors.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod inherit;
pub mod package;
pub mod profile;
pub mod tree;
pub mod validate;

pub use error::{ErrorCode, ToolError};
pub use package::{
    ArtifactReference, PackageArtifact, PackageDescription, PackageRelationship,
    PropertyValueGroup, PropertyValues,
};
pub use profile::{DomainProfile, NodeConstraint, NodeTransform, NodeType, ProfileStore};
pub use tree::ContentTree;
