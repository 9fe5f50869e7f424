//! The content tree: the hierarchical view of a package description.
//!
//! [`ContentTree`] is an arena of [`Node`]s keyed by artifact id. Parent and
//! child links are ids, never references, so nodes can be moved, inserted,
//! and pruned without fighting the borrow checker. Children keep their
//! order; traversals are deterministic pre-order.
//!
//! - [`build`] converts between a tree and a [`crate::package::PackageDescription`].
//! - [`transform`] evaluates and applies node transforms.
//! - [`assign`] picks a legal node type for every node.

pub mod assign;
pub mod build;
pub mod transform;

use std::collections::BTreeMap;

use crate::error::{ErrorCode, ToolError};
use crate::package::{ArtifactError, DescriptionError};
use crate::profile::{NodeTypeId, StructuralRelation};

pub use assign::{AssignError, assign_node_types, valid_node_types};
pub use build::SyncReport;
pub use transform::{
    IdMint, TransformError, TransformOutcome, applicable_transforms, apply_transform,
    apply_transform_minting, is_applicable,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node '{0}' is not in the tree")]
    NodeNotFound(String),

    #[error("node '{0}' is already in the tree")]
    DuplicateNode(String),

    #[error("tree already has root '{0}'")]
    RootExists(String),

    #[error("package has no root artifact")]
    NoRoot,

    #[error("package has several root candidates: {0:?}")]
    AmbiguousRoot(Vec<String>),

    #[error("artifact '{id}' has several parents: {parents:?}")]
    MultipleParents { id: String, parents: Vec<String> },

    /// Artifacts not reachable from the root (orphans or cycles).
    #[error("artifacts not reachable from the root: {0:?}")]
    Unreachable(Vec<String>),

    #[error("moving '{id}' under '{parent}' would create a cycle")]
    WouldCycle { id: String, parent: String },

    #[error("no structural relation configured for the edge above '{0}'")]
    NoRelation(String),

    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error(transparent)]
    Relationship(#[from] ArtifactError),
}

impl TreeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Self::Description(err) => err.code(),
            Self::Relationship(err) => err.code(),
            _ => ErrorCode::TreeStructureInvalid,
        }
    }
}

impl From<TreeError> for ToolError {
    fn from(err: TreeError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// One node of a [`ContentTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: String,
    parent: Option<String>,
    children: Vec<String>,
    /// Assigned node type; `None` until assignment.
    pub node_type: Option<NodeTypeId>,
    /// Relation on the edge to the parent.
    pub relation: Option<StructuralRelation>,
    pub byte_stream: bool,
    pub ignored: bool,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            children: Vec::new(),
            node_type: None,
            relation: None,
            byte_stream: false,
            ignored: false,
        }
    }

    #[must_use]
    pub fn typed(mut self, node_type: impl Into<NodeTypeId>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    #[must_use]
    pub fn related_by(mut self, relation: StructuralRelation) -> Self {
        self.relation = Some(relation);
        self
    }

    #[must_use]
    pub const fn file(mut self) -> Self {
        self.byte_stream = true;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    #[must_use]
    pub fn child_ids(&self) -> &[String] {
        &self.children
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Arena-backed content tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTree {
    nodes: BTreeMap<String, Node>,
    root: Option<String>,
}

impl ContentTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the root node of an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::RootExists`] if the tree already has a root.
    pub fn set_root(&mut self, mut node: Node) -> Result<(), TreeError> {
        if let Some(root) = &self.root {
            return Err(TreeError::RootExists(root.clone()));
        }
        node.parent = None;
        node.children.clear();
        self.root = Some(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Append `node` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is missing or `node`'s id is taken.
    pub fn add_child(&mut self, parent: &str, mut node: Node) -> Result<(), TreeError> {
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::DuplicateNode(node.id));
        }
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| TreeError::NodeNotFound(parent.to_string()))?;
        parent_node.children.push(node.id.clone());
        node.parent = Some(parent.to_string());
        node.children.clear();
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref().and_then(|id| self.nodes.get(id))
    }

    #[must_use]
    pub fn root_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&Node> {
        self.nodes
            .get(id)
            .and_then(|n| n.parent.as_deref())
            .and_then(|p| self.nodes.get(p))
    }

    #[must_use]
    pub fn grandparent(&self, id: &str) -> Option<&Node> {
        self.parent(id).and_then(|p| self.parent(&p.id))
    }

    /// Children of `id` in order; empty for unknown ids.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.nodes.get(id).map_or_else(Vec::new, |n| {
            n.children.iter().filter_map(|c| self.nodes.get(c)).collect()
        })
    }

    /// Number of file-bearing children of `id`.
    #[must_use]
    pub fn file_children(&self, id: &str) -> usize {
        self.children(id).iter().filter(|c| c.byte_stream).count()
    }

    /// Ancestors of `id`, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            out.push(node);
            cursor = self.parent(&node.id);
        }
        out
    }

    #[must_use]
    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).len()
    }

    /// `id` and its descendants, parent before children, children in order.
    #[must_use]
    pub fn pre_order(&self, id: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            out.push(node);
            stack.extend(node.children.iter().rev().map(String::as_str));
        }
        out
    }

    /// Whole-tree pre-order from the root.
    #[must_use]
    pub fn iter(&self) -> Vec<&Node> {
        self.root.as_deref().map_or_else(Vec::new, |r| self.pre_order(r))
    }

    /// Whether `ancestor` is `id` or lies above it.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        ancestor == id || self.ancestors(id).iter().any(|a| a.id == ancestor)
    }

    /// Move `id` under `new_parent` as its last child.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids, for moving the root, or for a move
    /// that would put a node below itself.
    pub fn reparent(&mut self, id: &str, new_parent: &str) -> Result<(), TreeError> {
        if !self.contains(new_parent) {
            return Err(TreeError::NodeNotFound(new_parent.to_string()));
        }
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(TreeError::WouldCycle {
                id: id.to_string(),
                parent: new_parent.to_string(),
            });
        }
        let old_parent = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?
            .parent
            .clone()
            .ok_or_else(|| TreeError::WouldCycle {
                id: id.to_string(),
                parent: new_parent.to_string(),
            })?;

        if let Some(parent) = self.nodes.get_mut(&old_parent) {
            parent.children.retain(|c| c != id);
        }
        if let Some(parent) = self.nodes.get_mut(new_parent) {
            parent.children.push(id.to_string());
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(new_parent.to_string());
        }
        Ok(())
    }

    /// Put `new_node` between `id` and its parent, in `id`'s position.
    /// Inserting above the root makes `new_node` the root.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is missing or `new_node`'s id is taken.
    pub fn insert_parent(&mut self, id: &str, mut new_node: Node) -> Result<(), TreeError> {
        if self.nodes.contains_key(&new_node.id) {
            return Err(TreeError::DuplicateNode(new_node.id));
        }
        let old_parent = self
            .nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))?
            .parent
            .clone();

        let new_id = new_node.id.clone();
        new_node.children = vec![id.to_string()];
        new_node.parent.clone_from(&old_parent);

        match &old_parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    for child in &mut parent.children {
                        if child == id {
                            child.clone_from(&new_id);
                        }
                    }
                }
            }
            None => self.root = Some(new_id.clone()),
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(new_id.clone());
        }
        self.nodes.insert(new_id, new_node);
        Ok(())
    }

    /// Remove `id` and all of its descendants. Returns the removed nodes in
    /// pre-order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for unknown ids.
    pub fn remove_subtree(&mut self, id: &str) -> Result<Vec<Node>, TreeError> {
        let ids: Vec<String> = self.pre_order(id).iter().map(|n| n.id.clone()).collect();
        if ids.is_empty() {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }

        if let Some(parent_id) = self.nodes.get(id).and_then(|n| n.parent.clone()) {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| c != id);
            }
        } else {
            self.root = None;
        }

        Ok(ids.iter().filter_map(|i| self.nodes.remove(i)).collect())
    }

    /// Set the ignored flag on `id` and its whole subtree. Returns the
    /// number of nodes touched.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NodeNotFound`] for unknown ids.
    pub fn set_ignored(&mut self, id: &str, ignored: bool) -> Result<usize, TreeError> {
        let ids: Vec<String> = self.pre_order(id).iter().map(|n| n.id.clone()).collect();
        if ids.is_empty() {
            return Err(TreeError::NodeNotFound(id.to_string()));
        }
        for node_id in &ids {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.ignored = ignored;
            }
        }
        Ok(ids.len())
    }
}
