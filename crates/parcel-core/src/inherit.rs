//! Property inheritance.
//!
//! Inheritance copies the values of one property from the artifact where
//! the user triggered it down to its descendants. The walk is a pre-order
//! traversal of the content tree below the source:
//!
//! - a descendant whose node type does not list the property as
//!   inheritable is blocked, and so is its entire subtree;
//! - a descendant that already holds a value keeps it, and the walk
//!   continues into its children;
//! - any other descendant receives a copy of the source's value set.
//!
//! Value groups are copied by value, so inherited groups compare equal to
//! the source's.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::InheritanceConfig;
use crate::error::{ErrorCode, ToolError};
use crate::package::PackageDescription;
use crate::profile::DomainProfile;
use crate::tree::ContentTree;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InheritanceError {
    #[error("node '{0}' is not in the content tree")]
    NodeNotFound(String),

    /// The tree and the description disagree about an artifact.
    #[error("artifact '{0}' is in the content tree but not in the package")]
    ArtifactMissing(String),
}

impl InheritanceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Self::ArtifactMissing(_) => ErrorCode::ArtifactNotFound,
        }
    }
}

impl From<InheritanceError> for ToolError {
    fn from(err: InheritanceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InheritanceOptions {
    /// Treat ignored artifacts as blocking.
    pub skip_ignored: bool,
}

impl From<&InheritanceConfig> for InheritanceOptions {
    fn from(config: &InheritanceConfig) -> Self {
        Self {
            skip_ignored: config.skip_ignored,
        }
    }
}

/// Artifact ids affected by one inheritance run, each in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceReport {
    pub property: String,
    pub source: String,
    /// Descendants that received the source's values.
    pub updated: Vec<String>,
    /// Descendants that kept their own value.
    pub kept_local: Vec<String>,
    /// Roots of the subtrees the walk did not enter.
    pub blocked: Vec<String>,
}

impl InheritanceReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty()
    }
}

/// Propagate `property` from artifact `source` to its descendants.
///
/// A source without a value for `property` yields an empty report.
///
/// # Errors
///
/// Returns an error if `source` is not in the tree or a visited node has no
/// artifact in `description`.
#[instrument(skip(description, tree, profile, options))]
pub fn apply_inheritance(
    description: &mut PackageDescription,
    tree: &ContentTree,
    source: &str,
    property: &str,
    profile: &DomainProfile,
    options: InheritanceOptions,
) -> Result<InheritanceReport, InheritanceError> {
    let start = tree
        .node(source)
        .ok_or_else(|| InheritanceError::NodeNotFound(source.to_string()))?;
    let values = description
        .artifact(source)
        .ok_or_else(|| InheritanceError::ArtifactMissing(source.to_string()))?
        .property_values(property)
        .filter(|v| !v.is_empty())
        .cloned();

    let mut report = InheritanceReport {
        property: property.to_string(),
        source: source.to_string(),
        ..InheritanceReport::default()
    };
    let Some(values) = values else {
        debug!(source, property, "source has no value to inherit");
        return Ok(report);
    };

    // Walk first so a missing artifact fails before anything is written.
    let mut reached: Vec<&str> = Vec::new();
    let mut stack: Vec<&str> = start.child_ids().iter().rev().map(String::as_str).collect();
    while let Some(id) = stack.pop() {
        let Some(node) = tree.node(id) else {
            continue;
        };

        let inherits = node
            .node_type
            .as_ref()
            .and_then(|t| profile.node_type(t.as_str()))
            .is_some_and(|t| t.is_inheritable(property));
        if !inherits || (options.skip_ignored && node.ignored) {
            debug!(node = id, property, "inheritance blocked");
            report.blocked.push(id.to_string());
            continue;
        }

        if description.artifact(id).is_none() {
            return Err(InheritanceError::ArtifactMissing(id.to_string()));
        }
        reached.push(id);
        stack.extend(node.child_ids().iter().rev().map(String::as_str));
    }

    for id in reached {
        let Some(artifact) = description.artifact_mut(id) else {
            continue;
        };
        if artifact.has_property_value(property) {
            report.kept_local.push(id.to_string());
        } else {
            artifact.set_property_values(property, values.clone());
            report.updated.push(id.to_string());
        }
    }

    info!(
        source,
        property,
        updated = report.updated.len(),
        kept = report.kept_local.len(),
        blocked = report.blocked.len(),
        "inheritance applied"
    );
    Ok(report)
}

/// Run [`apply_inheritance`] for every property `source` has a value for,
/// in property-name order.
///
/// # Errors
///
/// Fails on the first property whose run fails.
pub fn apply_all_inheritance(
    description: &mut PackageDescription,
    tree: &ContentTree,
    source: &str,
    profile: &DomainProfile,
    options: InheritanceOptions,
) -> Result<Vec<InheritanceReport>, InheritanceError> {
    let properties: Vec<String> = description
        .artifact(source)
        .ok_or_else(|| InheritanceError::ArtifactMissing(source.to_string()))?
        .properties()
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, _)| name.clone())
        .collect();

    properties
        .iter()
        .map(|property| apply_inheritance(description, tree, source, property, profile, options))
        .collect()
}
