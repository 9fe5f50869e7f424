//! Node transform engine.
//!
//! # Applicability
//!
//! A transform applies to a node when the node's type is the transform's
//! source type and every structural precondition holds:
//!
//! - parent constraint: the node's parent slot satisfies it (a root's empty
//!   slot satisfies only `matches_none`);
//! - grandparent constraint: checked only when a grandparent exists;
//! - child constraint: every child satisfies it (vacuous without children).
//!
//! # Application
//!
//! Actions run in a fixed order on a scratch copy of the tree:
//!
//! 1. retype the node;
//! 2. insert a new parent between the node and its parent;
//! 3. move the node under its grandparent;
//! 4. remove the original parent if it has no children left.
//!
//! The copy replaces the tree only when every step succeeds, so a rejected
//! transform leaves the tree exactly as it was.

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{ContentTree, Node, TreeError};
use crate::error::{ErrorCode, ToolError};
use crate::profile::{DomainProfile, NodeTransform, NodeTypeId};

/// Source of ids for nodes a transform synthesizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdMint {
    /// Random `urn:uuid:` ids.
    #[default]
    Uuid,
    /// `{prefix}{n}`, counting up from `next`. Reproducible across runs.
    Counter { prefix: String, next: u64 },
}

impl IdMint {
    #[must_use]
    pub fn counter(prefix: impl Into<String>) -> Self {
        Self::Counter {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn mint(&mut self) -> String {
        match self {
            Self::Uuid => format!("urn:uuid:{}", Uuid::new_v4()),
            Self::Counter { prefix, next } => {
                let id = format!("{prefix}{next}");
                *next += 1;
                id
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("node '{0}' is not in the tree")]
    NodeNotFound(String),

    #[error("transform '{label}' does not apply to node '{id}'")]
    NotApplicable { id: String, label: String },

    #[error("transform '{label}' moves node '{id}' to its grandparent, but it has none")]
    MissingGrandparent { id: String, label: String },

    #[error("transform '{label}' inserts a parent but names no node type for it")]
    MissingResultParentType { label: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl TransformError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Self::NotApplicable { .. } => ErrorCode::TransformNotApplicable,
            Self::MissingGrandparent { .. } => ErrorCode::MissingGrandparent,
            Self::MissingResultParentType { .. } => ErrorCode::MissingResultParentType,
            Self::Tree(err) => err.code(),
        }
    }
}

impl From<TransformError> for ToolError {
    fn from(err: TransformError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// What an applied transform changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutcome {
    pub node_id: String,
    pub retyped_from: Option<NodeTypeId>,
    pub inserted_parent: Option<String>,
    pub moved_to: Option<String>,
    pub removed_parent: Option<String>,
}

/// Whether `transform` applies to node `id`. Unknown ids never match.
#[must_use]
pub fn is_applicable(tree: &ContentTree, id: &str, transform: &NodeTransform) -> bool {
    let Some(node) = tree.node(id) else {
        return false;
    };
    if node.node_type.as_ref() != Some(&transform.source_type) {
        return false;
    }

    let parent = tree.parent(id);
    if let Some(constraint) = &transform.source_parent {
        let slot = parent.map(|p| (p.node_type.as_ref(), node.relation.as_ref()));
        if !constraint.admits_slot(slot) {
            return false;
        }
    }

    if let Some(constraint) = &transform.source_grandparent {
        if let (Some(parent), Some(grandparent)) = (parent, tree.grandparent(id)) {
            let slot = Some((grandparent.node_type.as_ref(), parent.relation.as_ref()));
            if !constraint.admits_slot(slot) {
                return false;
            }
        }
    }

    if let Some(constraint) = &transform.source_child {
        let all_children_match = tree
            .children(id)
            .iter()
            .all(|c| constraint.admits_slot(Some((c.node_type.as_ref(), c.relation.as_ref()))));
        if !all_children_match {
            return false;
        }
    }

    true
}

/// Transforms of `profile` that apply to node `id`, in declaration order.
#[must_use]
pub fn applicable_transforms<'p>(
    tree: &ContentTree,
    id: &str,
    profile: &'p DomainProfile,
) -> Vec<&'p NodeTransform> {
    let Some(source) = tree.node(id).and_then(|n| n.node_type.as_ref()) else {
        return Vec::new();
    };
    profile
        .transforms_from(source)
        .filter(|t| is_applicable(tree, id, t))
        .collect()
}

/// Apply `transform` to node `id`.
///
/// # Errors
///
/// Returns an error, leaving `tree` untouched, when the transform does not
/// apply, a required grandparent is missing, or an inserted parent has no
/// type to take.
pub fn apply_transform(
    tree: &mut ContentTree,
    id: &str,
    transform: &NodeTransform,
) -> Result<TransformOutcome, TransformError> {
    apply_transform_minting(tree, id, transform, &mut IdMint::Uuid)
}

/// [`apply_transform`] taking inserted-parent ids from `ids`.
///
/// # Errors
///
/// As [`apply_transform`].
#[instrument(skip(tree, transform, ids), fields(transform = %transform.label))]
pub fn apply_transform_minting(
    tree: &mut ContentTree,
    id: &str,
    transform: &NodeTransform,
    ids: &mut IdMint,
) -> Result<TransformOutcome, TransformError> {
    if !tree.contains(id) {
        return Err(TransformError::NodeNotFound(id.to_string()));
    }
    if !is_applicable(tree, id, transform) {
        warn!(node = id, "transform rejected: preconditions not met");
        return Err(TransformError::NotApplicable {
            id: id.to_string(),
            label: transform.label.clone(),
        });
    }

    let mut scratch = tree.clone();
    let outcome = run_actions(&mut scratch, id, transform, ids).inspect_err(|err| {
        warn!(node = id, error = %err, "transform rejected");
    })?;
    *tree = scratch;

    info!(
        node = id,
        inserted = outcome.inserted_parent.as_deref(),
        moved_to = outcome.moved_to.as_deref(),
        removed = outcome.removed_parent.as_deref(),
        "transform applied"
    );
    Ok(outcome)
}

fn run_actions(
    tree: &mut ContentTree,
    id: &str,
    transform: &NodeTransform,
    ids: &mut IdMint,
) -> Result<TransformOutcome, TransformError> {
    let mut outcome = TransformOutcome {
        node_id: id.to_string(),
        ..TransformOutcome::default()
    };
    let original_parent = tree.parent(id).map(|p| p.id().to_string());

    if let Some(result) = &transform.result_type {
        let node = tree
            .node_mut(id)
            .ok_or_else(|| TransformError::NodeNotFound(id.to_string()))?;
        if node.node_type.as_ref() != Some(result) {
            outcome.retyped_from = node.node_type.replace(result.clone());
            debug!(node = id, to = %result, "retyped");
        }
    }

    if transform.insert_parent {
        let constraint = transform.result_parent.as_ref();
        let parent_type = constraint
            .and_then(|c| c.preferred_type())
            .ok_or_else(|| TransformError::MissingResultParentType {
                label: transform.label.clone(),
            })?;
        let relation = constraint
            .and_then(|c| c.structural_relations.first().cloned())
            .or_else(|| tree.node(id).and_then(|n| n.relation.clone()));

        let new_id = ids.mint();
        let mut new_parent = Node::new(new_id.clone()).typed(parent_type.clone());
        new_parent.relation = relation;
        tree.insert_parent(id, new_parent)?;
        debug!(node = id, parent = %new_id, "parent inserted");
        outcome.inserted_parent = Some(new_id);
    }

    if transform.move_to_grandparent {
        let Some(grandparent) = tree.grandparent(id).map(|g| g.id().to_string()) else {
            return Err(TransformError::MissingGrandparent {
                id: id.to_string(),
                label: transform.label.clone(),
            });
        };
        tree.reparent(id, &grandparent)?;
        debug!(node = id, to = %grandparent, "moved to grandparent");
        outcome.moved_to = Some(grandparent);
    }

    if transform.remove_empty_parent {
        if let Some(parent) = original_parent {
            let prunable = tree
                .node(&parent)
                .is_some_and(|p| p.child_ids().is_empty() && !p.is_root());
            if prunable {
                tree.remove_subtree(&parent)?;
                debug!(node = id, parent = %parent, "empty parent removed");
                outcome.removed_parent = Some(parent);
            }
        }
    }

    Ok(outcome)
}
