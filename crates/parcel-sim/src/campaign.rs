//! Campaigns: one simulation per seed over a seed range.
//!
//! Every seed runs independently; the report lists each failing seed with
//! its violations so the first one can be replayed with [`replay_seed`].

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::generate::ShapeConfig;
use crate::oracle::InvariantViolation;
use crate::{SimulationConfig, SimulationResult, Simulator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub seed_range: Range<u64>,
    /// Edits per seed.
    pub steps: usize,
    pub shape: ShapeConfig,
    pub skip_ignored: bool,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            steps: 40,
            shape: ShapeConfig::default(),
            skip_ignored: false,
        }
    }
}

impl CampaignConfig {
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            steps: self.steps,
            shape: self.shape,
            skip_ignored: self.skip_ignored,
        }
    }

    /// # Errors
    ///
    /// Returns an error if any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.steps == 0 {
            bail!("steps must be > 0");
        }
        if self.shape.max_depth == 0 {
            bail!("shape.max_depth must be > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// Lowest failing seed, the one to replay first.
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    pub steps_applied: usize,
    pub steps_rejected: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// # Errors
///
/// Returns an error if the config is invalid or a simulation cannot start.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport::default();
    for seed in config.seed_range.clone() {
        let result = run_single_seed(seed, config)?;
        report.seeds_run += 1;
        report.steps_applied += result.applied();
        report.steps_rejected += result.rejected();

        if result.oracle.passed {
            report.seeds_passed += 1;
        } else {
            warn!(seed, violations = result.oracle.violations.len(), "seed failed");
            report.first_failure.get_or_insert(seed);
            report.failures.push(SeedFailure {
                seed,
                violations: result
                    .oracle
                    .violations
                    .iter()
                    .map(format_violation)
                    .collect(),
            });
        }
    }

    info!(
        seeds = report.seeds_run,
        passed = report.seeds_passed,
        applied = report.steps_applied,
        rejected = report.steps_rejected,
        "campaign complete"
    );
    Ok(report)
}

/// # Errors
///
/// Returns an error if the simulation cannot start.
pub fn run_single_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}

/// Run one seed again, validating the config first.
///
/// # Errors
///
/// Returns an error when config validation or the simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    config.validate()?;
    run_single_seed(seed, config)
}

#[must_use]
pub fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::TreeDrift { step, node, detail } => {
            format!("TreeDrift at step {step}: node '{node}' {detail}")
        }
        InvariantViolation::IllegalType {
            step,
            node,
            node_type,
        } => format!(
            "IllegalType at step {step}: node '{node}' has type {}",
            node_type.as_deref().unwrap_or("<none>")
        ),
        InvariantViolation::UnrecognizedProperties {
            step,
            node,
            properties,
        } => format!("UnrecognizedProperties at step {step}: node '{node}' holds {properties:?}"),
        InvariantViolation::RejectedStepMutated { step, code } => {
            format!("RejectedStepMutated at step {step}: edit rejected with {code} changed state")
        }
        InvariantViolation::GenerationRegressed {
            step,
            before,
            after,
        } => format!("GenerationRegressed at step {step}: {before} -> {after}"),
        InvariantViolation::Overwritten {
            step,
            node,
            property,
        } => format!("Overwritten at step {step}: inheritance replaced '{property}' on '{node}'"),
        InvariantViolation::StaleGuard {
            step,
            expected_stale,
            was_stale,
        } => format!(
            "StaleGuard at step {step}: expected stale={expected_stale}, was stale={was_stale}"
        ),
    }
}
