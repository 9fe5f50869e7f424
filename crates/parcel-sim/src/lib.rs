//! parcel-sim library.
//!
//! Seeded simulation of editing sessions. A run generates a content tree
//! shaped like a directory scan, types it with the built-in profile, then
//! performs random edits through an [`EditSession`] and checks the
//! invariants of [`oracle::SessionOracle`] after every step. A seed always
//! replays the same trace.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at run level. A rejected edit is not an
//!   error; it is recorded in the trace with its error code.
//! - **Logging**: `tracing` macros (`info!` per run, `debug!` per step).

#![forbid(unsafe_code)]

pub mod campaign;
pub mod generate;
pub mod oracle;
pub mod rng;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use parcel_core::config::HierarchyConfig;
use parcel_core::inherit::InheritanceOptions;
use parcel_core::package::PropertyValues;
use parcel_core::profile::PropertyValueType;
use parcel_core::profile::builtin::business_object_profile;
use parcel_core::tree::IdMint;
use parcel_session::{EditSession, ExpansionState, RebuildError, SessionError, run_rebuild};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::generate::{ROOT_ID, ShapeConfig, generate_tree};
use crate::oracle::{OracleResult, SessionOracle, Snapshot};
use crate::rng::DeterministicRng;

const VALUE_POOL: &[&str] = &["Acme", "Globex", "Initech", "Umbrella"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Edits performed after the initial type assignment.
    pub steps: usize,
    pub shape: ShapeConfig,
    /// Whether ignored nodes block inheritance.
    pub skip_ignored: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: 40,
            shape: ShapeConfig::default(),
            skip_ignored: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SimAction {
    Transform {
        node: String,
        label: String,
    },
    Retype {
        node: String,
        node_type: String,
    },
    SetProperty {
        node: String,
        property: String,
        value: String,
    },
    RemoveProperty {
        node: String,
        property: String,
    },
    Inherit {
        source: String,
        property: String,
    },
    Ignore {
        node: String,
        ignored: bool,
    },
    /// Snapshot, optionally edit the root, then rebuild from the snapshot
    /// and try to install the result.
    Rebuild {
        edit_first: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Rejected { code: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub step: usize,
    pub action: SimAction,
    pub outcome: StepOutcome,
    pub generation: u64,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub seed: u64,
    /// Nodes in the generated tree.
    pub nodes: usize,
    pub trace: Vec<TraceEvent>,
    pub oracle: OracleResult,
    pub final_hash: String,
}

impl SimulationResult {
    #[must_use]
    pub fn applied(&self) -> usize {
        self.trace
            .iter()
            .filter(|e| e.outcome == StepOutcome::Applied)
            .count()
    }

    #[must_use]
    pub fn rejected(&self) -> usize {
        self.trace.len() - self.applied()
    }
}

#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    session: EditSession,
}

impl Simulator {
    /// Generate and type the starting tree for `config.seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in profile fails to load or the
    /// generated tree cannot be typed.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let tree = generate_tree(&mut DeterministicRng::derive(config.seed, 0), &config.shape)
            .context("generate content tree")?;
        let profile = Arc::new(business_object_profile()?);
        let options = InheritanceOptions {
            skip_ignored: config.skip_ignored,
        };
        let mut session = EditSession::create(profile, HierarchyConfig::default(), options, tree)
            .context("create session")?
            .with_id_mint(IdMint::counter("sim:parent-"));
        session.assign_types().context("assign node types")?;

        Ok(Self {
            config,
            rng: DeterministicRng::derive(config.seed, 1),
            session,
        })
    }

    #[must_use]
    pub const fn session(&self) -> &EditSession {
        &self.session
    }

    /// Perform `config.steps` random edits, checking invariants after each.
    ///
    /// # Errors
    ///
    /// Reserved for harness failures; invariant violations are reported in
    /// the result.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let nodes = self.session.tree().len();
        let mut trace = Vec::with_capacity(self.config.steps);
        let mut oracle = SessionOracle::check_state(0, &self.session);

        for step in 1..=self.config.steps {
            let action = self.choose_action();
            let before = Snapshot::of(&self.session);
            let (result, expected_stale) = self.perform(step, &action);
            oracle =
                oracle.merge(self.check_step(step, &action, &before, &result, expected_stale));

            let outcome = match &result {
                Ok(()) => StepOutcome::Applied,
                Err(err) => StepOutcome::Rejected {
                    code: err.code().code().to_string(),
                    message: err.to_string(),
                },
            };
            debug!(step, ?action, ?outcome, "step performed");
            trace.push(TraceEvent {
                step,
                action,
                outcome,
                generation: self.session.generation(),
                content_hash: self.session.content_hash(),
            });
        }

        info!(
            seed = self.config.seed,
            nodes,
            steps = trace.len(),
            violations = oracle.violations.len(),
            "simulation complete"
        );
        Ok(SimulationResult {
            seed: self.config.seed,
            nodes,
            trace,
            oracle,
            final_hash: self.session.content_hash(),
        })
    }

    fn choose_action(&mut self) -> SimAction {
        let ids: Vec<String> = self
            .session
            .tree()
            .iter()
            .into_iter()
            .map(|n| n.id().to_string())
            .collect();
        let node = self
            .rng
            .pick(&ids)
            .cloned()
            .unwrap_or_else(|| ROOT_ID.to_string());

        match self.rng.below(100) {
            0..30 => {
                let label = self.pick_transform(&node);
                SimAction::Transform { node, label }
            }
            30..45 => {
                let types: Vec<String> = self
                    .session
                    .profile()
                    .node_types()
                    .iter()
                    .map(|t| t.id.to_string())
                    .collect();
                let node_type = self.rng.pick(&types).cloned().unwrap_or_default();
                SimAction::Retype { node, node_type }
            }
            45..65 => {
                let property = self.pick_settable_property(&node);
                let value = (*self.rng.pick(VALUE_POOL).unwrap_or(&"Acme")).to_string();
                SimAction::SetProperty {
                    node,
                    property,
                    value,
                }
            }
            65..70 => {
                let property = self.pick_held_property(&node, "title");
                SimAction::RemoveProperty { node, property }
            }
            70..85 => {
                let property = self.pick_held_property(&node, "publisher");
                SimAction::Inherit {
                    source: node,
                    property,
                }
            }
            85..95 => SimAction::Ignore {
                node,
                ignored: self.rng.chance(50),
            },
            _ => SimAction::Rebuild {
                edit_first: self.rng.chance(50),
            },
        }
    }

    /// Mostly transforms defined for the node's type, which may or may not
    /// apply; now and then any transform at all.
    fn pick_transform(&mut self, node: &str) -> String {
        let profile = self.session.profile();
        let own: Vec<String> = self
            .session
            .tree()
            .node(node)
            .and_then(|n| n.node_type.as_ref())
            .map(|t| profile.transforms_from(t).map(|t| t.label.clone()).collect())
            .unwrap_or_default();
        let labels = if own.is_empty() || self.rng.chance(10) {
            profile
                .node_transforms()
                .iter()
                .map(|t| t.label.clone())
                .collect()
        } else {
            own
        };
        self.rng.pick(&labels).cloned().unwrap_or_default()
    }

    /// A writable string property the node's type recognizes.
    fn pick_settable_property(&mut self, node: &str) -> String {
        let profile = self.session.profile();
        let candidates: Vec<String> = self
            .session
            .tree()
            .node(node)
            .and_then(|n| n.node_type.as_ref())
            .and_then(|t| profile.node_type(t.as_str()))
            .map(|t| {
                t.property_constraints
                    .iter()
                    .filter(|c| {
                        profile
                            .property_type(c.property_type.as_str())
                            .is_some_and(|p| {
                                p.value_type == PropertyValueType::String && !p.read_only
                            })
                    })
                    .map(|c| c.property_type.to_string())
                    .collect()
            })
            .unwrap_or_default();
        self.rng
            .pick(&candidates)
            .cloned()
            .unwrap_or_else(|| "title".to_string())
    }

    fn pick_held_property(&mut self, node: &str, fallback: &str) -> String {
        let held: Vec<String> = self
            .session
            .description()
            .artifact(node)
            .map(|a| a.property_names().map(str::to_string).collect())
            .unwrap_or_default();
        self.rng
            .pick(&held)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Returns the edit's result and, for rebuilds, whether the rebuilt
    /// tree should have been refused as stale.
    fn perform(
        &mut self,
        step: usize,
        action: &SimAction,
    ) -> (Result<(), SessionError>, Option<bool>) {
        let session = &mut self.session;
        let result = match action {
            SimAction::Transform { node, label } => {
                session.apply_transform(node, label).map(drop)
            }
            SimAction::Retype { node, node_type } => {
                session.commit_retype(node, node_type).map(drop)
            }
            SimAction::SetProperty {
                node,
                property,
                value,
            } => session.set_property_values(
                node,
                property,
                PropertyValues::Simple(BTreeSet::from([value.clone()])),
            ),
            SimAction::RemoveProperty { node, property } => {
                session.remove_property(node, property).map(drop)
            }
            SimAction::Inherit { source, property } => {
                session.apply_inheritance(source, property).map(drop)
            }
            SimAction::Ignore { node, ignored } => session.set_ignored(node, *ignored).map(drop),
            SimAction::Rebuild { edit_first } => return self.rebuild(step, *edit_first),
        };
        (result, None)
    }

    fn rebuild(
        &mut self,
        step: usize,
        edit_first: bool,
    ) -> (Result<(), SessionError>, Option<bool>) {
        let request = self
            .session
            .rebuild_request(ExpansionState::all(self.session.tree()));
        if edit_first {
            let title = PropertyValues::Simple(BTreeSet::from([format!("Revision {step}")]));
            if let Err(err) = self.session.set_property_values(ROOT_ID, "title", title) {
                return (Err(err), None);
            }
        }
        let expected_stale = request.description.content_hash() != self.session.content_hash();

        let ticket = u64::try_from(step).unwrap_or(u64::MAX);
        let result = match run_rebuild(ticket, &request) {
            Ok(rebuilt) => self.session.install_rebuild(rebuilt),
            Err(RebuildError::Tree(err)) => Err(SessionError::Tree(err)),
            Err(RebuildError::Assign(err)) => Err(SessionError::Assign(err)),
            Err(err) => Err(SessionError::Rebuild(err)),
        };
        (result, Some(expected_stale))
    }

    fn check_step(
        &self,
        step: usize,
        action: &SimAction,
        before: &Snapshot,
        result: &Result<(), SessionError>,
        expected_stale: Option<bool>,
    ) -> OracleResult {
        let checked = SessionOracle::check_state(step, &self.session)
            .merge(SessionOracle::check_generation(step, before, &self.session));

        match (action, result) {
            (SimAction::Rebuild { .. }, _) => match expected_stale {
                Some(expected) => {
                    let was_stale = matches!(result, Err(SessionError::StaleRebuild { .. }));
                    checked.merge(SessionOracle::check_stale_guard(step, expected, was_stale))
                }
                None => checked,
            },
            (_, Err(err)) => checked.merge(SessionOracle::check_rejected_unchanged(
                step,
                err.code().code(),
                before,
                &self.session,
            )),
            (SimAction::Inherit { property, .. }, Ok(())) => checked.merge(
                SessionOracle::check_inheritance_kept_local(step, property, before, &self.session),
            ),
            _ => checked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            steps: 60,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn run_passes_the_oracle() {
        let mut simulator = Simulator::new(config(3)).expect("simulator");
        let result = simulator.run().expect("run");
        assert_eq!(result.trace.len(), 60);
        assert!(result.oracle.passed, "{:?}", result.oracle.violations);
        assert_eq!(result.applied() + result.rejected(), 60);
    }

    #[test]
    fn same_seed_same_trace() {
        let a = Simulator::new(config(11)).expect("a").run().expect("run a");
        let b = Simulator::new(config(11)).expect("b").run().expect("run b");
        assert_eq!(a, b);
    }

    #[test]
    fn starting_tree_is_fully_typed() {
        let simulator = Simulator::new(config(5)).expect("simulator");
        assert!(
            simulator
                .session()
                .tree()
                .iter()
                .iter()
                .all(|n| n.node_type.is_some())
        );
    }

    #[test]
    fn trace_serializes_with_tags() {
        let event = TraceEvent {
            step: 1,
            action: SimAction::Ignore {
                node: "root/d0".to_string(),
                ignored: true,
            },
            outcome: StepOutcome::Rejected {
                code: "E2005".to_string(),
                message: "node not found".to_string(),
            },
            generation: 2,
            content_hash: "abc".to_string(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"action\":\"ignore\""));
        assert!(json.contains("\"outcome\":\"rejected\""));
    }
}
