//! Proptest generators for parcel-core property tests.
//!
//! Trees are generated in the shape of the built-in business-object
//! profile so that every generated package has at least one legal type
//! assignment.

#![allow(dead_code)]

use parcel_core::package::{PackageArtifact, PackageDescription, PackageRelationship};
use parcel_core::profile::{NodeConstraint, NodeTypeId, StructuralRelation};
use proptest::prelude::*;

pub const TYPE_NAMES: [&str; 6] = [
    "Project",
    "Collection",
    "DataItem",
    "DataFile",
    "Metadata",
    "Unlisted",
];

pub fn arb_node_type() -> impl Strategy<Value = NodeTypeId> {
    prop::sample::select(TYPE_NAMES.to_vec()).prop_map(NodeTypeId::new)
}

pub fn arb_relation() -> impl Strategy<Value = Option<StructuralRelation>> {
    prop_oneof![
        Just(None),
        Just(Some(StructuralRelation::new("hasMember", "isMemberOf"))),
        Just(Some(StructuralRelation::new("hasPart", "isPartOf"))),
    ]
}

pub fn arb_constraint() -> impl Strategy<Value = NodeConstraint> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec(arb_node_type(), 0..4),
        prop::collection::vec(arb_relation(), 0..3),
    )
        .prop_map(|(matches_any, matches_none, node_types, relations)| NodeConstraint {
            matches_any,
            matches_none,
            node_types,
            structural_relations: relations.into_iter().flatten().collect(),
        })
}

/// A subtree below a Project or Collection.
#[derive(Debug, Clone)]
pub enum Spec {
    Collection(Vec<Spec>),
    Item { files: usize, metadata: usize },
    Metadata,
}

pub fn arb_spec() -> impl Strategy<Value = Spec> {
    let leaf = prop_oneof![
        (0..3usize, 0..2usize).prop_map(|(files, metadata)| Spec::Item { files, metadata }),
        Just(Spec::Metadata),
    ];
    leaf.prop_recursive(4, 48, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Spec::Collection)
    })
}

/// Local values a generated artifact may carry.
#[derive(Debug, Clone, Default)]
pub struct LocalValues {
    pub publisher: Option<String>,
    pub description: Option<String>,
}

pub fn arb_local_values() -> impl Strategy<Value = LocalValues> {
    (
        prop::option::weighted(0.3, "[A-Z][a-z]{2,8}"),
        prop::option::weighted(0.3, "[a-z ]{4,16}"),
    )
        .prop_map(|(publisher, description)| LocalValues {
            publisher,
            description,
        })
}

/// A whole package: a Project root over generated subtrees, plus local
/// values handed out to artifacts in id order.
pub fn arb_package() -> impl Strategy<Value = PackageDescription> {
    (
        prop::collection::vec(arb_spec(), 0..4),
        prop::collection::vec(arb_local_values(), 64),
    )
        .prop_map(|(children, locals)| build_package(&children, &locals))
}

pub fn build_package(children: &[Spec], locals: &[LocalValues]) -> PackageDescription {
    let mut builder = Builder {
        desc: PackageDescription::new(),
        next: 0,
    };
    let root = builder.add("Project", None, false);
    for child in children {
        builder.add_spec(child, &root);
    }

    let ids: Vec<String> = builder.desc.artifact_ids().map(str::to_string).collect();
    for (id, local) in ids.iter().zip(locals.iter().cycle()) {
        let Some(artifact) = builder.desc.artifact_mut(id) else {
            continue;
        };
        if let Some(publisher) = &local.publisher {
            artifact
                .add_simple_property_value("publisher", publisher.clone())
                .expect("publisher");
        }
        if let Some(description) = &local.description {
            artifact
                .add_simple_property_value("description", description.clone())
                .expect("description");
        }
    }
    builder.desc
}

struct Builder {
    desc: PackageDescription,
    next: usize,
}

impl Builder {
    fn add(&mut self, node_type: &str, parent: Option<&str>, byte_stream: bool) -> String {
        let id = format!("n{:03}", self.next);
        self.next += 1;
        let mut artifact = PackageArtifact::new(&id, node_type).with_byte_stream(byte_stream);
        artifact
            .add_simple_property_value("title", format!("{node_type} {id}"))
            .expect("title");
        if let Some(parent) = parent {
            artifact.add_relationship(
                PackageRelationship::new("isMemberOf", [parent], false).expect("relationship"),
            );
        }
        self.desc.insert_artifact(artifact).expect("insert");
        id
    }

    fn add_spec(&mut self, spec: &Spec, parent: &str) {
        match spec {
            Spec::Collection(children) => {
                let id = self.add("Collection", Some(parent), false);
                for child in children {
                    self.add_spec(child, &id);
                }
            }
            Spec::Item { files, metadata } => {
                let id = self.add("DataItem", Some(parent), false);
                for _ in 0..*files {
                    self.add("DataFile", Some(&id), true);
                }
                for _ in 0..*metadata {
                    self.add("Metadata", Some(&id), true);
                }
            }
            Spec::Metadata => {
                self.add("Metadata", Some(parent), true);
            }
        }
    }
}
