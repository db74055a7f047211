//! Command-line arguments and parameter resolution.

use std::path::PathBuf;

use clap::Parser;
use metapop_components::component_defaults;
use metapop_core::{OverrideOutcome, ParameterSet};
use metapop_types::PatchDataset;
use tracing::{info, warn};

use crate::demo::demo_scenario;
use crate::error::CliError;

/// Run a phase-based metapopulation model.
#[derive(Parser, Debug)]
#[command(name = "metapop", version, about = "Run a phase-based metapopulation model")]
pub struct Cli {
    /// Number of ticks to simulate
    #[arg(long)]
    pub nticks: Option<u32>,

    /// Seed for the model's random generator
    #[arg(long)]
    pub seed: Option<u32>,

    /// Print the timing report and enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Skip rendering figures after the run
    #[arg(long = "no-viz", action = clap::ArgAction::SetFalse)]
    pub viz: bool,

    /// Write figures to a timestamped document instead of the console
    #[arg(long, conflicts_with = "viz")]
    pub pdf: bool,

    /// Directory for the figure document
    #[arg(long, default_value = ".")]
    pub figures_dir: PathBuf,

    /// Write a JSON run summary to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Parameter file (JSON or YAML), merged over the built-in defaults
    #[arg(long, env = "METAPOP_PARAMS", value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Parameter override as key=value; repeatable, applied last
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Scenario file (JSON or YAML); a built-in three-patch demo otherwise
    #[arg(long, env = "METAPOP_SCENARIO", value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Model name, used in logs and document file names
    #[arg(long, default_value = "metapop")]
    pub name: String,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Build the parameter set for this invocation.
    ///
    /// Later sources win: component defaults, the parameter file, the
    /// dedicated flags, then `-p` overrides in the order given.
    pub fn resolve_parameters(&self) -> Result<ParameterSet, CliError> {
        let mut params = component_defaults();

        if let Some(path) = &self.params {
            params.merge(ParameterSet::from_file(path)?);
            info!(path = %path.display(), "Parameters loaded");
        }
        if let Some(nticks) = self.nticks {
            params.set("nticks", i64::from(nticks));
        }
        if let Some(seed) = self.seed {
            params.set("seed", i64::from(seed));
        }
        if self.verbose {
            params.set("verbose", true);
        }

        let outcomes = params.apply_overrides(self.overrides.iter().map(String::as_str))?;
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, OverrideOutcome::Skipped { .. }))
            .count();
        if skipped > 0 {
            warn!(skipped, "Some parameter overrides named unknown parameters");
        }
        Ok(params)
    }

    /// Load the scenario file, or the demo scenario when none is given.
    pub fn load_scenario(&self) -> Result<PatchDataset, CliError> {
        let scenario = match &self.scenario {
            Some(path) => {
                let scenario = PatchDataset::from_file(path)?;
                info!(path = %path.display(), "Scenario loaded");
                scenario
            }
            None => {
                info!("No scenario file given, using the built-in demo");
                demo_scenario()?
            }
        };
        Ok(scenario)
    }
}
