//! Node type assignment.
//!
//! Every node gets a type such that its parent constraint admits its
//! parent's type and its file requirement admits its byte-stream flag.
//! Candidates are tried in preference order: types whose preferred count
//! of file-bearing children matches the node come first, then profile
//! declaration order.
//!
//! The result is the first legal assignment a depth-first backtracking
//! search would find in that order. It is computed without backtracking:
//! a bottom-up pass records, per node, the types whose whole subtree can be
//! completed, and a top-down pass picks the first preferred feasible type.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};

use super::ContentTree;
use crate::error::{ErrorCode, ToolError};
use crate::profile::{DomainProfile, NodeType, NodeTypeId, StructuralRelation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignError {
    #[error("tree is empty")]
    EmptyTree,

    #[error("node '{0}' is not in the tree")]
    NodeNotFound(String),

    /// No type for `id` admits a legal completion of its subtree.
    #[error("no node type of profile '{profile}' fits node '{id}' and its subtree")]
    NoLegalAssignment { id: String, profile: String },
}

impl AssignError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyTree | Self::NoLegalAssignment { .. } => ErrorCode::TypeAssignmentFailed,
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
        }
    }
}

impl From<AssignError> for ToolError {
    fn from(err: AssignError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Candidate types for `id`, preferred first.
fn ordered_candidates<'p>(
    tree: &ContentTree,
    id: &str,
    profile: &'p DomainProfile,
) -> Vec<&'p NodeType> {
    let Some(node) = tree.node(id) else {
        return Vec::new();
    };
    let file_children = tree.file_children(id);
    let (mut preferred, rest): (Vec<&NodeType>, Vec<&NodeType>) = profile
        .node_types()
        .iter()
        .filter(|t| t.file_requirement.admits(node.byte_stream))
        .partition(|t| t.prefers_file_children(file_children));
    preferred.extend(rest);
    preferred
}

/// Assign a legal node type to every node of `tree`.
///
/// Returns the number of nodes whose type changed. On error the tree is
/// left untouched.
///
/// # Errors
///
/// Returns [`AssignError::NoLegalAssignment`] naming the last node in
/// pre-order left without any feasible type, or [`AssignError::EmptyTree`].
#[instrument(skip_all, fields(profile = %profile.id(), nodes = tree.len()))]
pub fn assign_node_types(
    tree: &mut ContentTree,
    profile: &DomainProfile,
) -> Result<usize, AssignError> {
    let root = tree.root_id().ok_or(AssignError::EmptyTree)?.to_string();
    let order: Vec<String> = tree.pre_order(&root).iter().map(|n| n.id().to_string()).collect();

    // Bottom-up: types of each node whose subtree can be completed.
    let mut feasible: BTreeMap<&str, Vec<&NodeType>> = BTreeMap::new();
    for id in order.iter().rev() {
        let children: Vec<(&str, Option<_>)> = tree
            .children(id)
            .iter()
            .map(|c| (c.id(), c.relation.clone()))
            .collect();
        let fits: Vec<&NodeType> = ordered_candidates(tree, id, profile)
            .into_iter()
            .filter(|candidate| {
                children.iter().all(|(child, relation)| {
                    feasible.get(child).is_some_and(|types| {
                        types
                            .iter()
                            .any(|t| t.allows_parent(Some(&candidate.id), relation.as_ref()))
                    })
                })
            })
            .collect();
        feasible.insert(id.as_str(), fits);
    }

    // Top-down: first feasible type admitted by the chosen parent type.
    let mut chosen: BTreeMap<&str, &NodeTypeId> = BTreeMap::new();
    for id in &order {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let parent_type = node.parent_id().and_then(|p| chosen.get(p).copied());
        let pick = feasible.get(id.as_str()).and_then(|types| {
            types
                .iter()
                .find(|t| t.allows_parent(parent_type, node.relation.as_ref()))
        });
        let Some(pick) = pick else {
            let culprit = order
                .iter()
                .rev()
                .find(|n| feasible.get(n.as_str()).is_some_and(Vec::is_empty))
                .unwrap_or(id);
            return Err(AssignError::NoLegalAssignment {
                id: culprit.clone(),
                profile: profile.id().to_string(),
            });
        };
        chosen.insert(id.as_str(), &pick.id);
    }

    let assignments: Vec<(String, NodeTypeId)> = chosen
        .into_iter()
        .map(|(id, t)| (id.to_string(), t.clone()))
        .collect();

    let mut changed = 0;
    for (id, node_type) in assignments {
        if let Some(node) = tree.node_mut(&id) {
            if node.node_type.as_ref() != Some(&node_type) {
                debug!(node = %id, node_type = %node_type, "type assigned");
                node.node_type = Some(node_type);
                changed += 1;
            }
        }
    }
    Ok(changed)
}

/// Types `id` could take without breaking its current surroundings: the
/// parent's type admits it, its file requirement holds, and every typed
/// child admits it as parent.
///
/// # Errors
///
/// Returns [`AssignError::NodeNotFound`] for unknown ids.
pub fn valid_node_types<'p>(
    tree: &ContentTree,
    id: &str,
    profile: &'p DomainProfile,
) -> Result<Vec<&'p NodeTypeId>, AssignError> {
    let node = tree
        .node(id)
        .ok_or_else(|| AssignError::NodeNotFound(id.to_string()))?;
    let slot = tree
        .parent(id)
        .map(|p| (p.node_type.as_ref(), node.relation.as_ref()));

    let typed_children: BTreeSet<(&NodeTypeId, Option<&StructuralRelation>)> = tree
        .children(id)
        .iter()
        .filter_map(|c| c.node_type.as_ref().map(|t| (t, c.relation.as_ref())))
        .collect();

    Ok(profile
        .node_types()
        .iter()
        .filter(|t| t.file_requirement.admits(node.byte_stream))
        .filter(|t| t.parent_constraints.iter().any(|c| c.admits_slot(slot)))
        .filter(|t| {
            typed_children.iter().all(|(child_type, relation)| {
                profile
                    .node_type(child_type.as_str())
                    .is_some_and(|c| c.allows_parent(Some(&t.id), *relation))
            })
        })
        .map(|t| &t.id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::builtin::business_object_profile;
    use crate::tree::Node;
    use crate::tree::tests::sample_tree;

    fn untyped(tree: &ContentTree) -> ContentTree {
        let mut out = tree.clone();
        let ids: Vec<String> = out.iter().iter().map(|n| n.id().to_string()).collect();
        for id in ids {
            if let Some(node) = out.node_mut(&id) {
                node.node_type = None;
            }
        }
        out
    }

    fn type_of(tree: &ContentTree, id: &str) -> Option<String> {
        tree.node(id)
            .and_then(|n| n.node_type.as_ref())
            .map(|t| t.as_str().to_string())
    }

    #[test]
    fn assigns_legal_types_top_down() {
        let profile = business_object_profile().expect("profile");
        let mut tree = untyped(&sample_tree());

        let changed = assign_node_types(&mut tree, &profile).expect("assignment");
        assert_eq!(changed, 6);
        assert_eq!(type_of(&tree, "p").as_deref(), Some("Project"));
        // c1 holds a container, so DataItem is infeasible despite its file child
        assert_eq!(type_of(&tree, "c1").as_deref(), Some("Collection"));
        assert_eq!(type_of(&tree, "i1").as_deref(), Some("DataItem"));
        assert_eq!(type_of(&tree, "f1").as_deref(), Some("DataFile"));
        assert_eq!(type_of(&tree, "m1").as_deref(), Some("Metadata"));
        assert_eq!(type_of(&tree, "c2").as_deref(), Some("Collection"));

        assert_eq!(assign_node_types(&mut tree, &profile), Ok(0));
    }

    #[test]
    fn container_without_files_prefers_declaration_order() {
        let profile = business_object_profile().expect("profile");
        let mut tree = ContentTree::new();
        tree.set_root(Node::new("root")).expect("root");
        tree.add_child("root", Node::new("dir")).expect("dir");
        tree.add_child("dir", Node::new("sub")).expect("sub");
        tree.add_child("sub", Node::new("file").file()).expect("file");

        assign_node_types(&mut tree, &profile).expect("assignment");
        assert_eq!(type_of(&tree, "root").as_deref(), Some("Project"));
        assert_eq!(type_of(&tree, "dir").as_deref(), Some("Collection"));
        assert_eq!(type_of(&tree, "sub").as_deref(), Some("DataItem"));
        assert_eq!(type_of(&tree, "file").as_deref(), Some("DataFile"));
    }

    #[test]
    fn impossible_shape_is_reported_and_tree_untouched() {
        let profile = business_object_profile().expect("profile");
        let mut tree = ContentTree::new();
        tree.set_root(Node::new("root")).expect("root");
        tree.add_child("root", Node::new("f").file()).expect("file");
        tree.add_child("f", Node::new("g").file()).expect("file under file");

        let before = tree.clone();
        let err = assign_node_types(&mut tree, &profile).unwrap_err();
        assert!(matches!(&err, AssignError::NoLegalAssignment { id, .. } if id == "f"));
        assert_eq!(err.code(), ErrorCode::TypeAssignmentFailed);
        assert_eq!(tree, before);
    }

    #[test]
    fn empty_tree_is_an_error() {
        let profile = business_object_profile().expect("profile");
        assert_eq!(
            assign_node_types(&mut ContentTree::new(), &profile),
            Err(AssignError::EmptyTree)
        );
    }

    #[test]
    fn valid_types_respect_parent_and_children() {
        let profile = business_object_profile().expect("profile");
        let tree = sample_tree();

        let ids = |types: Vec<&NodeTypeId>| -> Vec<String> {
            types.iter().map(|t| t.as_str().to_string()).collect()
        };

        assert_eq!(
            ids(valid_node_types(&tree, "c2", &profile).expect("c2")),
            vec!["Collection", "DataItem"]
        );
        // i1 has a DataFile child, which only a DataItem parent admits
        assert_eq!(
            ids(valid_node_types(&tree, "i1", &profile).expect("i1")),
            vec!["DataItem"]
        );
        assert_eq!(
            ids(valid_node_types(&tree, "m1", &profile).expect("m1")),
            vec!["Metadata"]
        );
        assert!(valid_node_types(&tree, "nope", &profile).is_err());
    }
}
