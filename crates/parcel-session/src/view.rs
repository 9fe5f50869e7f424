//! Flattened, expandable rendering of a content tree.
//!
//! A [`TreeView`] is what a presentation layer draws: one row per visible
//! node in pre-order. Which nodes are open is tracked by [`ExpansionState`],
//! keyed by artifact id so it survives tree rebuilds.

use std::collections::BTreeSet;

use parcel_core::ContentTree;
use parcel_core::profile::NodeTypeId;
use serde::{Deserialize, Serialize};

/// Ids of the expanded nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionState {
    expanded: BTreeSet<String>,
}

impl ExpansionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node with children expanded.
    #[must_use]
    pub fn all(tree: &ContentTree) -> Self {
        Self {
            expanded: tree
                .iter()
                .into_iter()
                .filter(|n| !n.child_ids().is_empty())
                .map(|n| n.id().to_string())
                .collect(),
        }
    }

    pub fn expand(&mut self, id: impl Into<String>) {
        self.expanded.insert(id.into());
    }

    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    /// Flip `id`; returns whether it is now expanded.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        }
    }

    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Expand every ancestor of `id` so its row becomes visible.
    pub fn reveal(&mut self, tree: &ContentTree, id: &str) {
        for ancestor in tree.ancestors(id) {
            self.expanded.insert(ancestor.id().to_string());
        }
    }

    /// Forget ids that are no longer in `tree`. Returns how many were dropped.
    pub fn retain_existing(&mut self, tree: &ContentTree) -> usize {
        let before = self.expanded.len();
        self.expanded.retain(|id| tree.contains(id));
        before - self.expanded.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFlags {
    pub byte_stream: bool,
    pub ignored: bool,
    pub has_children: bool,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRow {
    pub id: String,
    pub depth: usize,
    pub node_type: Option<NodeTypeId>,
    pub flags: RowFlags,
}

/// Visible rows of a tree, in pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeView {
    rows: Vec<TreeRow>,
}

impl TreeView {
    /// The root is always visible; children of a node are visible when the
    /// node is expanded and visible itself.
    #[must_use]
    pub fn build(tree: &ContentTree, expansion: &ExpansionState) -> Self {
        let mut rows = Vec::new();
        let Some(root) = tree.root_id() else {
            return Self { rows };
        };

        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = tree.node(id) else {
                continue;
            };
            let has_children = !node.child_ids().is_empty();
            let expanded = has_children && expansion.is_expanded(id);
            rows.push(TreeRow {
                id: id.to_string(),
                depth,
                node_type: node.node_type.clone(),
                flags: RowFlags {
                    byte_stream: node.byte_stream,
                    ignored: node.ignored,
                    has_children,
                    expanded,
                },
            });
            if expanded {
                stack.extend(
                    node.child_ids()
                        .iter()
                        .rev()
                        .map(|c| (c.as_str(), depth + 1)),
                );
            }
        }
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, id: &str) -> Option<&TreeRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::tree::Node;

    fn tree() -> ContentTree {
        let mut tree = ContentTree::new();
        tree.set_root(Node::new("p").typed("Project")).expect("root");
        tree.add_child("p", Node::new("c").typed("Collection"))
            .expect("c");
        tree.add_child("c", Node::new("i").typed("DataItem"))
            .expect("i");
        tree.add_child("i", Node::new("f").typed("DataFile").file())
            .expect("f");
        tree.add_child("p", Node::new("m").typed("Metadata").file())
            .expect("m");
        tree
    }

    fn ids(view: &TreeView) -> Vec<&str> {
        view.rows().iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn collapsed_tree_shows_only_root() {
        let view = TreeView::build(&tree(), &ExpansionState::new());
        assert_eq!(ids(&view), vec!["p"]);
        assert!(view.rows()[0].flags.has_children);
        assert!(!view.rows()[0].flags.expanded);
    }

    #[test]
    fn expanded_rows_are_pre_order_with_depth() {
        let tree = tree();
        let view = TreeView::build(&tree, &ExpansionState::all(&tree));
        assert_eq!(ids(&view), vec!["p", "c", "i", "f", "m"]);
        let depths: Vec<usize> = view.rows().iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 3, 1]);
        assert!(view.row("f").is_some_and(|r| r.flags.byte_stream));
        assert_eq!(view.position("m"), Some(4));
    }

    #[test]
    fn reveal_and_toggle() {
        let tree = tree();
        let mut expansion = ExpansionState::new();
        expansion.reveal(&tree, "f");
        assert_eq!(ids(&TreeView::build(&tree, &expansion)), vec!["p", "c", "i", "f", "m"]);

        assert!(!expansion.toggle("c"));
        assert_eq!(ids(&TreeView::build(&tree, &expansion)), vec!["p", "c", "m"]);
        assert!(expansion.toggle("c"));
    }

    #[test]
    fn expansion_survives_rebuild_by_id() {
        let tree = tree();
        let mut expansion = ExpansionState::all(&tree);

        let mut rebuilt = tree.clone();
        rebuilt.remove_subtree("i").expect("remove");
        let dropped = expansion.retain_existing(&rebuilt);
        assert_eq!(dropped, 1);
        assert!(expansion.is_expanded("c"));
        assert_eq!(ids(&TreeView::build(&rebuilt, &expansion)), vec!["p", "c", "m"]);
    }
}
