use std::collections::BTreeMap;

use parcel_core::tree::valid_node_types;
use parcel_core::{ContentTree, PackageDescription};
use parcel_session::EditSession;
use serde::{Deserialize, Serialize};

/// Outcome of checking one or more invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Failures accumulate.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "invariant", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// Rebuilding the tree from the description disagrees with the
    /// session's tree about a node's parent, type or ignore flag.
    TreeDrift {
        step: usize,
        node: String,
        detail: String,
    },

    /// A node is untyped or holds a type it could not legally take.
    IllegalType {
        step: usize,
        node: String,
        node_type: Option<String>,
    },

    /// An artifact holds properties its node type does not recognize.
    UnrecognizedProperties {
        step: usize,
        node: String,
        properties: Vec<String>,
    },

    /// A rejected edit changed the package or the tree.
    RejectedStepMutated { step: usize, code: String },

    GenerationRegressed { step: usize, before: u64, after: u64 },

    /// Inheritance replaced a value a descendant already held.
    Overwritten {
        step: usize,
        node: String,
        property: String,
    },

    /// A rebuild was installed over newer state, or refused over unchanged
    /// state.
    StaleGuard {
        step: usize,
        expected_stale: bool,
        was_stale: bool,
    },
}

/// Session state captured before a step.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub hash: String,
    pub tree: ContentTree,
    pub description: PackageDescription,
    pub generation: u64,
}

impl Snapshot {
    #[must_use]
    pub fn of(session: &EditSession) -> Self {
        Self {
            hash: session.content_hash(),
            tree: session.tree().clone(),
            description: session.description().clone(),
            generation: session.generation(),
        }
    }
}

/// Parent, type and ignore flag of every node, by id.
type Shape = BTreeMap<String, (Option<String>, Option<String>, bool)>;

fn shape(tree: &ContentTree) -> Shape {
    tree.iter()
        .into_iter()
        .map(|n| {
            (
                n.id().to_string(),
                (
                    n.parent_id().map(str::to_string),
                    n.node_type.as_ref().map(ToString::to_string),
                    n.ignored,
                ),
            )
        })
        .collect()
}

pub struct SessionOracle;

impl SessionOracle {
    /// Invariants that hold after every step, applied or not.
    #[must_use]
    pub fn check_state(step: usize, session: &EditSession) -> OracleResult {
        Self::check_tree_matches_description(step, session)
            .merge(Self::check_types_legal(step, session))
            .merge(Self::check_properties_recognized(step, session))
    }

    /// The description alone rebuilds the session's tree.
    #[must_use]
    pub fn check_tree_matches_description(step: usize, session: &EditSession) -> OracleResult {
        let rebuilt =
            match ContentTree::from_description(session.description(), session.hierarchy()) {
                Ok(tree) => tree,
                Err(err) => {
                    return OracleResult::from_violations(vec![InvariantViolation::TreeDrift {
                        step,
                        node: String::new(),
                        detail: format!("description no longer forms a tree: {err}"),
                    }]);
                }
            };

        let expected = shape(session.tree());
        let actual = shape(&rebuilt);

        let mut violations = Vec::new();
        for (id, node) in &expected {
            match actual.get(id) {
                None => violations.push(InvariantViolation::TreeDrift {
                    step,
                    node: id.clone(),
                    detail: "missing from rebuilt tree".to_string(),
                }),
                Some(other) if other != node => violations.push(InvariantViolation::TreeDrift {
                    step,
                    node: id.clone(),
                    detail: format!("session has {node:?}, description gives {other:?}"),
                }),
                Some(_) => {}
            }
        }
        for id in actual.keys().filter(|id| !expected.contains_key(*id)) {
            violations.push(InvariantViolation::TreeDrift {
                step,
                node: id.clone(),
                detail: "not in session tree".to_string(),
            });
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_types_legal(step: usize, session: &EditSession) -> OracleResult {
        let tree = session.tree();
        let violations = tree
            .iter()
            .into_iter()
            .filter(|node| {
                let legal =
                    valid_node_types(tree, node.id(), session.profile()).unwrap_or_default();
                node.node_type.as_ref().is_none_or(|t| !legal.contains(&t))
            })
            .map(|node| InvariantViolation::IllegalType {
                step,
                node: node.id().to_string(),
                node_type: node.node_type.as_ref().map(ToString::to_string),
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_properties_recognized(step: usize, session: &EditSession) -> OracleResult {
        let violations = session
            .validate()
            .invalid_properties
            .into_iter()
            .map(|(node, properties)| InvariantViolation::UnrecognizedProperties {
                step,
                node,
                properties,
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    /// A rejected step leaves no trace.
    #[must_use]
    pub fn check_rejected_unchanged(
        step: usize,
        code: &str,
        before: &Snapshot,
        session: &EditSession,
    ) -> OracleResult {
        let unchanged = before.hash == session.content_hash()
            && &before.tree == session.tree()
            && before.generation == session.generation();
        if unchanged {
            OracleResult::pass()
        } else {
            OracleResult::from_violations(vec![InvariantViolation::RejectedStepMutated {
                step,
                code: code.to_string(),
            }])
        }
    }

    #[must_use]
    pub fn check_generation(step: usize, before: &Snapshot, session: &EditSession) -> OracleResult {
        if session.generation() < before.generation {
            OracleResult::from_violations(vec![InvariantViolation::GenerationRegressed {
                step,
                before: before.generation,
                after: session.generation(),
            }])
        } else {
            OracleResult::pass()
        }
    }

    /// Every artifact that held a value for `property` before an
    /// inheritance run still holds the same value.
    #[must_use]
    pub fn check_inheritance_kept_local(
        step: usize,
        property: &str,
        before: &Snapshot,
        session: &EditSession,
    ) -> OracleResult {
        let violations = before
            .description
            .artifacts()
            .filter_map(|old| {
                let held = old.property_values(property).filter(|v| !v.is_empty())?;
                let now = session
                    .description()
                    .artifact(old.id())
                    .and_then(|a| a.property_values(property));
                (now != Some(held)).then(|| InvariantViolation::Overwritten {
                    step,
                    node: old.id().to_string(),
                    property: property.to_string(),
                })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_stale_guard(step: usize, expected_stale: bool, was_stale: bool) -> OracleResult {
        if expected_stale == was_stale {
            OracleResult::pass()
        } else {
            OracleResult::from_violations(vec![InvariantViolation::StaleGuard {
                step,
                expected_stale,
                was_stale,
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parcel_core::config::HierarchyConfig;
    use parcel_core::inherit::InheritanceOptions;
    use parcel_core::profile::builtin::business_object_profile;
    use parcel_core::tree::Node;

    fn session() -> EditSession {
        let mut tree = ContentTree::new();
        tree.set_root(Node::new("root")).expect("root");
        tree.add_child("root", Node::new("item")).expect("item");
        tree.add_child("item", Node::new("item/a.dat").file())
            .expect("file");
        let mut session = EditSession::create(
            Arc::new(business_object_profile().expect("profile")),
            HierarchyConfig::default(),
            InheritanceOptions::default(),
            tree,
        )
        .expect("session");
        session.assign_types().expect("assignment");
        session
    }

    #[test]
    fn consistent_session_passes() {
        let session = session();
        assert!(SessionOracle::check_state(0, &session).passed);
    }

    #[test]
    fn untyped_nodes_are_illegal() {
        let mut tree = ContentTree::new();
        tree.set_root(Node::new("root")).expect("root");
        let session = EditSession::create(
            Arc::new(business_object_profile().expect("profile")),
            HierarchyConfig::default(),
            InheritanceOptions::default(),
            tree,
        )
        .expect("session");
        let result = SessionOracle::check_types_legal(3, &session);
        assert!(!result.passed);
        assert_eq!(
            result.violations,
            vec![InvariantViolation::IllegalType {
                step: 3,
                node: "root".to_string(),
                node_type: None,
            }]
        );
    }

    #[test]
    fn mutation_after_rejection_is_caught() {
        let mut session = session();
        let before = Snapshot::of(&session);
        assert!(SessionOracle::check_rejected_unchanged(1, "E3001", &before, &session).passed);

        session
            .add_simple_property_value("root", "title", "Survey")
            .expect("title");
        let result = SessionOracle::check_rejected_unchanged(1, "E3001", &before, &session);
        assert!(!result.passed);
        assert!(SessionOracle::check_generation(1, &before, &session).passed);
    }

    #[test]
    fn overwritten_values_are_caught() {
        let mut session = session();
        session
            .add_simple_property_value("item", "publisher", "Local")
            .expect("publisher");
        let before = Snapshot::of(&session);
        session
            .add_simple_property_value("item", "publisher", "Other")
            .expect("publisher");

        let result = SessionOracle::check_inheritance_kept_local(2, "publisher", &before, &session);
        assert_eq!(
            result.violations,
            vec![InvariantViolation::Overwritten {
                step: 2,
                node: "item".to_string(),
                property: "publisher".to_string(),
            }]
        );
    }

    #[test]
    fn merge_accumulates_failures() {
        let failing = SessionOracle::check_stale_guard(1, true, false);
        let merged = OracleResult::pass()
            .merge(failing)
            .merge(SessionOracle::check_stale_guard(2, false, false));
        assert!(!merged.passed);
        assert_eq!(merged.violations.len(), 1);
    }
}
