//! Package validation: type-change checks, cardinality, and graph integrity.
//!
//! Every check reports offending property, relationship, or artifact names
//! so the presentation layer can point at the exact problem. None of them
//! mutate anything.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::HierarchyConfig;
use crate::package::{DescriptionError, PackageArtifact, PackageDescription};
use crate::profile::{Cardinality, DomainProfile, FileRequirement, NodeType};

/// Properties set on `artifact` that `target` does not recognise, in name
/// order. These are the properties a retype to `target` would drop.
#[must_use]
pub fn find_invalid_properties(artifact: &PackageArtifact, target: &NodeType) -> Vec<String> {
    artifact
        .properties()
        .iter()
        .filter(|(name, values)| !values.is_empty() && !target.allows_property(name))
        .map(|(name, _)| name.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityViolation {
    pub property: String,
    pub count: usize,
    pub cardinality: Cardinality,
}

/// Property constraints of `node_type` that `artifact` violates.
#[must_use]
pub fn check_cardinality(
    artifact: &PackageArtifact,
    node_type: &NodeType,
) -> Vec<CardinalityViolation> {
    node_type
        .property_constraints
        .iter()
        .filter_map(|constraint| {
            let count = artifact
                .property_values(constraint.property_type.as_str())
                .map_or(0, |v| v.len());
            (!constraint.cardinality.admits(count)).then(|| CardinalityViolation {
                property: constraint.property_type.to_string(),
                count,
                cardinality: constraint.cardinality,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// A relationship names an artifact that is not in the package.
    DanglingTarget {
        artifact: String,
        relationship: String,
        target: String,
    },
    /// The root reference matches zero or several artifacts.
    RootReference { matches: usize },
    /// An artifact has more than one hierarchical parent.
    MultipleParents { artifact: String, parents: Vec<String> },
    /// Artifacts whose hierarchical relationships form a cycle.
    HierarchyCycle { artifacts: Vec<String> },
}

/// Structural problems of the artifact graph.
///
/// Targets of relationships flagged as URI-valued are not artifact ids and
/// are not checked.
#[must_use]
#[instrument(skip_all, fields(artifacts = description.len()))]
pub fn check_integrity(
    description: &PackageDescription,
    hierarchy: &HierarchyConfig,
) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    if let Err(DescriptionError::RootReferenceMismatch { matches, .. }) =
        description.root_artifact()
    {
        issues.push(IntegrityIssue::RootReference { matches });
    }

    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut index: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    for id in description.artifact_ids() {
        index.insert(id, graph.add_node(id.to_string()));
    }

    let mut parents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for artifact in description.artifacts() {
        for relationship in artifact.relationships() {
            if relationship.requires_uri() {
                continue;
            }
            for target in relationship.targets() {
                if !description.contains(target) {
                    issues.push(IntegrityIssue::DanglingTarget {
                        artifact: artifact.id().to_string(),
                        relationship: relationship.name().to_string(),
                        target: target.clone(),
                    });
                    continue;
                }
                let edge = if hierarchy.by_child_to_parent(relationship.name()).is_some() {
                    Some((target.as_str(), artifact.id()))
                } else if hierarchy.by_parent_to_child(relationship.name()).is_some() {
                    Some((artifact.id(), target.as_str()))
                } else {
                    None
                };
                if let Some((parent, child)) = edge {
                    parents.entry(child).or_default().insert(parent);
                }
            }
        }
    }

    for (child, set) in &parents {
        if set.len() > 1 {
            issues.push(IntegrityIssue::MultipleParents {
                artifact: (*child).to_string(),
                parents: set.iter().map(|p| (*p).to_string()).collect(),
            });
        }
        for parent in set {
            if let (Some(&from), Some(&to)) = (index.get(parent), index.get(child)) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| graph.find_edge(*n, *n).is_some())
        })
        .map(|component| {
            let mut ids: Vec<String> = component
                .into_iter()
                .filter_map(|n| graph.node_weight(n).cloned())
                .collect();
            ids.sort_unstable();
            ids
        })
        .collect();
    cycles.sort_unstable();
    issues.extend(
        cycles
            .into_iter()
            .map(|artifacts| IntegrityIssue::HierarchyCycle { artifacts }),
    );

    debug!(issues = issues.len(), "integrity checked");
    issues
}

/// Everything [`validate_package`] found, keyed by artifact id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Artifacts whose type the profile does not declare.
    pub unknown_types: Vec<String>,
    pub invalid_properties: BTreeMap<String, Vec<String>>,
    pub cardinality: BTreeMap<String, Vec<CardinalityViolation>>,
    /// Artifacts whose byte-stream flag contradicts their type's file requirement.
    pub file_requirements: Vec<String>,
    pub integrity: Vec<IntegrityIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unknown_types.is_empty()
            && self.invalid_properties.is_empty()
            && self.cardinality.is_empty()
            && self.file_requirements.is_empty()
            && self.integrity.is_empty()
    }
}

/// Validate every non-ignored artifact against `profile`, plus the graph
/// integrity of the whole package.
#[must_use]
pub fn validate_package(
    description: &PackageDescription,
    profile: &DomainProfile,
    hierarchy: &HierarchyConfig,
) -> ValidationReport {
    let mut report = ValidationReport {
        integrity: check_integrity(description, hierarchy),
        ..ValidationReport::default()
    };

    for artifact in description.artifacts().filter(|a| !a.is_ignored()) {
        let Some(node_type) = profile.node_type(artifact.artifact_type()) else {
            report.unknown_types.push(artifact.id().to_string());
            continue;
        };

        let invalid = find_invalid_properties(artifact, node_type);
        if !invalid.is_empty() {
            report
                .invalid_properties
                .insert(artifact.id().to_string(), invalid);
        }

        let violations = check_cardinality(artifact, node_type);
        if !violations.is_empty() {
            report
                .cardinality
                .insert(artifact.id().to_string(), violations);
        }

        if !node_type.file_requirement.admits(artifact.is_byte_stream())
            || (node_type.file_requirement == FileRequirement::Required
                && artifact.artifact_ref().is_none())
        {
            report.file_requirements.push(artifact.id().to_string());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{ArtifactReference, PackageRelationship};
    use crate::profile::builtin::business_object_profile;

    fn rel(name: &str, targets: &[&str]) -> PackageRelationship {
        PackageRelationship::new(name, targets.iter().copied(), false).expect("relationship")
    }

    #[test]
    fn bad_property_is_reported_once_and_deterministically() {
        let profile = business_object_profile().expect("profile");
        let collection = profile.node_type("Collection").expect("collection");

        let mut artifact = PackageArtifact::new("c", "Collection");
        artifact
            .add_simple_property_value("BadProperty", "x")
            .expect("value");
        artifact
            .add_simple_property_value("title", "Maps")
            .expect("value");

        let first = find_invalid_properties(&artifact, collection);
        let second = find_invalid_properties(&artifact, collection);
        assert_eq!(first, vec!["BadProperty".to_string()]);
        assert_eq!(first, second);

        let empty = PackageArtifact::new("e", "Collection");
        assert!(find_invalid_properties(&empty, collection).is_empty());
    }

    #[test]
    fn retype_preview_lists_dropped_properties() {
        let profile = business_object_profile().expect("profile");
        let metadata = profile.node_type("Metadata").expect("metadata");

        let mut artifact = PackageArtifact::new("f", "DataFile");
        artifact
            .add_simple_property_value("publisher", "Acme")
            .expect("value");
        artifact
            .add_simple_property_value("description", "raw")
            .expect("value");
        assert_eq!(find_invalid_properties(&artifact, metadata), vec!["publisher"]);
    }

    #[test]
    fn cardinality_reports_missing_and_excess() {
        let profile = business_object_profile().expect("profile");
        let collection = profile.node_type("Collection").expect("collection");

        let mut artifact = PackageArtifact::new("c", "Collection");
        artifact.set_simple_property_values("description", ["a", "b"]);

        let violations = check_cardinality(&artifact, collection);
        let names: Vec<&str> = violations.iter().map(|v| v.property.as_str()).collect();
        assert_eq!(names, vec!["title", "description"]);
        assert_eq!(violations[1].count, 2);
    }

    #[test]
    fn integrity_finds_dangling_targets_and_cycles() {
        let mut desc = PackageDescription::new();
        let mut a = PackageArtifact::new("a", "Collection");
        a.add_relationship(rel("isMemberOf", &["b"]));
        let mut b = PackageArtifact::new("b", "Collection");
        b.add_relationship(rel("isMemberOf", &["a"]));
        b.add_relationship(rel("references", &["ghost"]));
        let mut c = PackageArtifact::new("c", "Collection");
        c.add_relationship(
            PackageRelationship::new("seeAlso", ["https://example.org"], true).expect("rel"),
        );
        for artifact in [a, b, c] {
            desc.insert_artifact(artifact).expect("insert");
        }

        let issues = check_integrity(&desc, &HierarchyConfig::default());
        assert!(issues.contains(&IntegrityIssue::DanglingTarget {
            artifact: "b".into(),
            relationship: "references".into(),
            target: "ghost".into(),
        }));
        assert!(issues.contains(&IntegrityIssue::HierarchyCycle {
            artifacts: vec!["a".into(), "b".into()],
        }));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn integrity_flags_root_mismatch_and_two_parents() {
        let mut desc = PackageDescription::new();
        desc.set_root_artifact_ref(Some(ArtifactReference::parse("file:///none").expect("ref")));
        let mut x = PackageArtifact::new("x", "DataFile");
        x.add_relationship(rel("isMemberOf", &["p"]));
        let mut q = PackageArtifact::new("q", "DataItem");
        q.add_relationship(rel("hasMember", &["x"]));
        desc.insert_artifact(PackageArtifact::new("p", "DataItem")).expect("insert");
        desc.insert_artifact(q).expect("insert");
        desc.insert_artifact(x).expect("insert");

        let issues = check_integrity(&desc, &HierarchyConfig::default());
        assert!(issues.contains(&IntegrityIssue::RootReference { matches: 0 }));
        assert!(issues.contains(&IntegrityIssue::MultipleParents {
            artifact: "x".into(),
            parents: vec!["p".into(), "q".into()],
        }));
    }

    #[test]
    fn validate_package_aggregates_findings() {
        let profile = business_object_profile().expect("profile");
        let mut desc = PackageDescription::new();

        let mut project = PackageArtifact::new("p", "Project");
        project
            .add_simple_property_value("title", "Survey")
            .expect("value");
        project.add_relationship(rel("hasMember", &["f", "w"]));
        let mut file = PackageArtifact::new("f", "DataFile");
        file.add_simple_property_value("homepage", "https://example.org")
            .expect("value");
        let mut ignored = PackageArtifact::new("w", "Widget");
        ignored.set_ignored(true);

        for artifact in [project, file, ignored] {
            desc.insert_artifact(artifact).expect("insert");
        }

        let report = validate_package(&desc, &profile, &HierarchyConfig::default());
        assert!(!report.is_clean());
        assert!(report.unknown_types.is_empty());
        assert_eq!(
            report.invalid_properties.get("f"),
            Some(&vec!["homepage".to_string()])
        );
        assert_eq!(report.file_requirements, vec!["f".to_string()]);
        assert!(report.integrity.is_empty());
    }
}
