#![forbid(unsafe_code)]

use std::env;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use parcel_sim::campaign::{CampaignConfig, format_violation, replay_seed, run_campaign};
use parcel_sim::generate::ShapeConfig;
use parcel_sim::{SimulationConfig, SimulationResult, Simulator};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "parcel-sim", version, about = "Seeded simulation of package editing sessions")]
struct Cli {
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one seed and print its summary.
    Run {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Run every seed in `from..to`.
    Campaign {
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long, default_value_t = 100)]
        to: u64,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Replay one seed and print its full trace.
    Replay {
        seed: u64,
        #[command(flatten)]
        sim: SimArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct SimArgs {
    /// Edits per seed.
    #[arg(long, default_value_t = 40)]
    steps: usize,
    #[arg(long, default_value_t = 4)]
    max_depth: usize,
    #[arg(long, default_value_t = 4)]
    max_children: usize,
    /// Ignored nodes block inheritance.
    #[arg(long)]
    skip_ignored: bool,
}

impl SimArgs {
    fn shape(self) -> ShapeConfig {
        ShapeConfig {
            max_depth: self.max_depth,
            max_children: self.max_children,
            ..ShapeConfig::default()
        }
    }

    fn campaign(self, from: u64, to: u64) -> CampaignConfig {
        CampaignConfig {
            seed_range: from..to,
            steps: self.steps,
            shape: self.shape(),
            skip_ignored: self.skip_ignored,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PARCEL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "parcel_core=debug,parcel_session=debug,parcel_sim=debug,info"
        } else {
            "warn"
        })
    });

    let format = env::var("PARCEL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn print_summary(result: &SimulationResult) {
    println!(
        "seed={} nodes={} applied={} rejected={} violations={} hash={}",
        result.seed,
        result.nodes,
        result.applied(),
        result.rejected(),
        result.oracle.violations.len(),
        result.final_hash
    );
    for violation in &result.oracle.violations {
        println!("  {}", format_violation(violation));
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { seed, sim } => {
            let result = Simulator::new(SimulationConfig {
                seed,
                steps: sim.steps,
                shape: sim.shape(),
                skip_ignored: sim.skip_ignored,
            })?
            .run()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
            if !result.oracle.passed {
                bail!("seed {seed} violated {} invariant(s)", result.oracle.violations.len());
            }
        }
        Command::Campaign { from, to, sim } => {
            let report = run_campaign(&sim.campaign(from, to))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "campaign complete: seeds={} passed={} applied={} rejected={}",
                    report.seeds_run,
                    report.seeds_passed,
                    report.steps_applied,
                    report.steps_rejected
                );
                for failure in &report.failures {
                    println!("seed {}:", failure.seed);
                    for line in &failure.violations {
                        println!("  {line}");
                    }
                }
            }
            if let Some(seed) = report.first_failure {
                bail!(
                    "{} seed(s) failed; replay with `parcel-sim replay {seed}`",
                    report.failures.len()
                );
            }
        }
        Command::Replay { seed, sim } => {
            let result = replay_seed(seed, &sim.campaign(seed, seed.saturating_add(1)))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for event in &result.trace {
                    println!(
                        "{:>4} gen={:<4} {} -> {}",
                        event.step,
                        event.generation,
                        serde_json::to_string(&event.action)?,
                        serde_json::to_string(&event.outcome)?
                    );
                }
                print_summary(&result);
            }
            if !result.oracle.passed {
                bail!("seed {seed} violated {} invariant(s)", result.oracle.violations.len());
            }
        }
    }
    Ok(())
}
