//! Conversion between a [`PackageDescription`] and a [`ContentTree`].
//!
//! Hierarchical relationships are those whose name is one of the configured
//! structural relation predicates. A child may record the edge
//! (`isMemberOf parent`), the parent may (`hasMember child`), or both; the
//! two forms collapse to one edge.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, instrument};

use super::{ContentTree, Node, TreeError};
use crate::config::HierarchyConfig;
use crate::package::{PackageArtifact, PackageDescription, PackageRelationship};
use crate::profile::{NodeTypeId, StructuralRelation};

/// Artifacts added or removed by [`ContentTree::sync_description`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub removed: Vec<String>,
}

struct Edge {
    parent: String,
    relation: StructuralRelation,
}

impl ContentTree {
    /// Build the content tree of `description`.
    ///
    /// Children are ordered by artifact id. Relationship targets that are not
    /// artifacts of the description are ignored here;
    /// [`crate::validate::check_integrity`] reports them.
    ///
    /// # Errors
    ///
    /// Returns a [`TreeError`] when an artifact has two parents, the root
    /// cannot be determined, or some artifact is unreachable from the root.
    #[instrument(skip_all, fields(artifacts = description.len()))]
    pub fn from_description(
        description: &PackageDescription,
        hierarchy: &HierarchyConfig,
    ) -> Result<Self, TreeError> {
        let mut edges: BTreeMap<String, Edge> = BTreeMap::new();

        for artifact in description.artifacts() {
            for relationship in artifact.relationships() {
                if let Some(relation) = hierarchy.by_child_to_parent(relationship.name()) {
                    for parent in relationship.targets() {
                        record_edge(description, &mut edges, parent, artifact.id(), relation)?;
                    }
                }
                if let Some(relation) = hierarchy.by_parent_to_child(relationship.name()) {
                    for child in relationship.targets() {
                        record_edge(description, &mut edges, artifact.id(), child, relation)?;
                    }
                }
            }
        }

        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (child, edge) in &edges {
            children
                .entry(edge.parent.as_str())
                .or_default()
                .push(child.as_str());
        }

        let mut tree = Self::new();
        if description.is_empty() {
            return Ok(tree);
        }

        let root = match description.root_artifact()? {
            Some(root) => {
                if let Some(edge) = edges.get(root.id()) {
                    return Err(TreeError::MultipleParents {
                        id: root.id().to_string(),
                        parents: vec![edge.parent.clone()],
                    });
                }
                root.id().to_string()
            }
            None => {
                let candidates: Vec<String> = description
                    .artifact_ids()
                    .filter(|id| !edges.contains_key(*id))
                    .map(str::to_string)
                    .collect();
                match candidates.as_slice() {
                    [] => return Err(TreeError::NoRoot),
                    [only] => only.clone(),
                    _ => return Err(TreeError::AmbiguousRoot(candidates)),
                }
            }
        };

        let mut queue: VecDeque<String> = VecDeque::new();
        if let Some(artifact) = description.artifact(&root) {
            tree.set_root(node_for(artifact, None))?;
            queue.push_back(root);
        }

        while let Some(current) = queue.pop_front() {
            for child in children.get(current.as_str()).into_iter().flatten() {
                let (Some(artifact), Some(edge)) = (description.artifact(child), edges.get(*child))
                else {
                    continue;
                };
                if tree.contains(child) {
                    continue;
                }
                tree.add_child(&current, node_for(artifact, Some(edge.relation.clone())))?;
                queue.push_back((*child).to_string());
            }
        }

        if tree.len() != description.len() {
            let unreachable: Vec<String> = description
                .artifact_ids()
                .filter(|id| !tree.contains(id))
                .map(str::to_string)
                .collect();
            return Err(TreeError::Unreachable(unreachable));
        }

        debug!(nodes = tree.len(), "content tree built");
        Ok(tree)
    }

    /// Write node types, flags, and hierarchy back into `description`.
    ///
    /// Hierarchical relationships of every artifact are replaced by the
    /// tree's edges, recorded on both ends. Nodes without an artifact (for
    /// example inserted parents) become new artifacts; artifacts without a
    /// node (pruned) are removed.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NoRelation`] when an edge has no relation and the
    /// hierarchy configures none.
    pub fn sync_description(
        &self,
        description: &mut PackageDescription,
        hierarchy: &HierarchyConfig,
    ) -> Result<SyncReport, TreeError> {
        let mut report = SyncReport::default();

        let stale: Vec<String> = description
            .artifact_ids()
            .filter(|id| !self.contains(id))
            .map(str::to_string)
            .collect();
        for id in stale {
            description.remove_artifact(&id);
            report.removed.push(id);
        }

        let mut upward: BTreeMap<&str, PackageRelationship> = BTreeMap::new();
        let mut downward: BTreeMap<&str, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for node in self.iter() {
            let Some(parent) = node.parent_id() else {
                continue;
            };
            let relation = node
                .relation
                .as_ref()
                .or_else(|| hierarchy.default_relation())
                .ok_or_else(|| TreeError::NoRelation(node.id().to_string()))?;
            upward.insert(
                node.id(),
                PackageRelationship::new(relation.child_to_parent.clone(), [parent], false)?,
            );
            downward
                .entry(parent)
                .or_default()
                .entry(relation.parent_to_child.clone())
                .or_default()
                .insert(node.id().to_string());
        }

        for node in self.iter() {
            if !description.contains(node.id()) {
                let artifact = PackageArtifact::new(node.id(), "").with_byte_stream(node.byte_stream);
                description.insert_artifact(artifact)?;
                report.created.push(node.id().to_string());
            }
            let Some(artifact) = description.artifact_mut(node.id()) else {
                continue;
            };

            artifact.set_artifact_type(node.node_type.as_ref().map_or("", NodeTypeId::as_str));
            artifact.set_ignored(node.ignored);
            artifact.set_byte_stream(node.byte_stream);
            artifact.retain_relationships(|r| !hierarchy.is_hierarchical(r.name()));

            if let Some(relationship) = upward.remove(node.id()) {
                artifact.add_relationship(relationship);
            }
            if let Some(by_name) = downward.remove(node.id()) {
                for (name, targets) in by_name {
                    artifact.add_relationship(PackageRelationship::new(name, targets, false)?);
                }
            }
        }

        // The root reference follows the tree root. A root without a
        // reference of its own clears it, leaving the root to be found as
        // the only artifact without a parent.
        if let Some(root_id) = self.root_id() {
            let names_root = description.root_artifact_ref().is_none()
                || description
                    .root_artifact()
                    .ok()
                    .flatten()
                    .is_some_and(|a| a.id() == root_id);
            if !names_root {
                let moved = description
                    .artifact(root_id)
                    .and_then(PackageArtifact::artifact_ref)
                    .cloned();
                debug!(root = root_id, kept = moved.is_some(), "root reference moved");
                description.set_root_artifact_ref(moved);
            }
        }

        if !report.created.is_empty() || !report.removed.is_empty() {
            debug!(
                created = report.created.len(),
                removed = report.removed.len(),
                "description synced"
            );
        }
        Ok(report)
    }
}

fn record_edge(
    description: &PackageDescription,
    edges: &mut BTreeMap<String, Edge>,
    parent: &str,
    child: &str,
    relation: &StructuralRelation,
) -> Result<(), TreeError> {
    if !description.contains(parent) || !description.contains(child) {
        debug!(parent, child, "skipping edge to unknown artifact");
        return Ok(());
    }
    match edges.get(child) {
        Some(existing) if existing.parent != parent => Err(TreeError::MultipleParents {
            id: child.to_string(),
            parents: vec![existing.parent.clone(), parent.to_string()],
        }),
        Some(_) => Ok(()),
        None => {
            edges.insert(
                child.to_string(),
                Edge {
                    parent: parent.to_string(),
                    relation: relation.clone(),
                },
            );
            Ok(())
        }
    }
}

fn node_for(artifact: &PackageArtifact, relation: Option<StructuralRelation>) -> Node {
    let mut node = Node::new(artifact.id());
    if !artifact.artifact_type().is_empty() {
        node.node_type = Some(NodeTypeId::new(artifact.artifact_type()));
    }
    node.relation = relation;
    node.byte_stream = artifact.is_byte_stream();
    node.ignored = artifact.is_ignored();
    node
}
