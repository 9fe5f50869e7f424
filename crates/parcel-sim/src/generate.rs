//! Random content trees shaped like a directory scan.

use parcel_core::ContentTree;
use parcel_core::tree::{Node, TreeError};
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeConfig {
    /// Deepest level below the root. Nodes at this level are files.
    pub max_depth: usize,
    /// Upper bound on children per directory.
    pub max_children: usize,
    /// Chance that a child above the deepest level is a file.
    pub file_percent: u8,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_children: 4,
            file_percent: 45,
        }
    }
}

/// Build an untyped tree: a directory root, nested directories, and files
/// as leaves. Ids are slash-separated paths from the root.
///
/// # Errors
///
/// Returns an error only if two generated ids collide, which the path
/// naming rules out.
pub fn generate_tree(
    rng: &mut DeterministicRng,
    shape: &ShapeConfig,
) -> Result<ContentTree, TreeError> {
    let mut tree = ContentTree::new();
    tree.set_root(Node::new(ROOT_ID))?;

    let mut pending = vec![(ROOT_ID.to_string(), 0_usize)];
    while let Some((dir, depth)) = pending.pop() {
        let children = rng.below(shape.max_children + 1);
        for index in 0..children {
            let leaf_level = depth + 1 >= shape.max_depth;
            if leaf_level || rng.chance(shape.file_percent) {
                tree.add_child(&dir, Node::new(format!("{dir}/f{index}.dat")).file())?;
            } else {
                let child = format!("{dir}/d{index}");
                tree.add_child(&dir, Node::new(child.clone()))?;
                pending.push((child, depth + 1));
            }
        }
    }
    Ok(tree)
}
