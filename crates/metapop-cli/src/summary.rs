//! JSON summary of a finished run.

use std::path::Path;

use chrono::{DateTime, Local};
use metapop_core::{Metrics, TimingReport, model::Model};
use serde::Serialize;
use tracing::info;

use crate::error::CliError;

/// Final population of one patch.
#[derive(Debug, Serialize)]
pub struct PatchOutcome<'a> {
    /// Patch name.
    pub name: &'a str,
    /// Population at the start of the run.
    pub initial: u64,
    /// Population after the last tick.
    pub last: u64,
}

/// Everything written by `--output`.
#[derive(Debug, Serialize)]
pub struct RunRecord<'a> {
    /// Model name.
    pub model: &'a str,
    /// The seed actually used.
    pub seed: u64,
    /// Ticks requested.
    pub nticks: usize,
    /// Run start.
    pub started: Option<DateTime<Local>>,
    /// Run end.
    pub finished: Option<DateTime<Local>>,
    /// Phase names in execution order.
    pub phases: Vec<String>,
    /// Per-phase totals.
    pub timing: TimingReport,
    /// Per-tick rows.
    pub metrics: &'a Metrics,
    /// Individuals in the population frame, newborns included.
    pub individuals: usize,
    /// Per-patch populations.
    pub patches: Vec<PatchOutcome<'a>>,
}

impl<'a> RunRecord<'a> {
    /// Collect the record from a model after its run.
    pub fn from_model(model: &'a Model) -> Result<Self, CliError> {
        let patches = &model.state().patches;
        let first = patches.row(0)?;
        let last = patches.row(patches.nticks())?;
        let outcomes = model
            .scenario()
            .patches()
            .iter()
            .zip(first.iter().zip(last))
            .map(|(patch, (initial, last))| PatchOutcome {
                name: &patch.name,
                initial: *initial,
                last: *last,
            })
            .collect();

        Ok(Self {
            model: model.name(),
            seed: model.seed(),
            nticks: model.nticks(),
            started: model.tstart(),
            finished: model.tfinish(),
            phases: model.phase_names(),
            timing: model.metrics().report(),
            metrics: model.metrics(),
            individuals: model.state().population.count(),
            patches: outcomes,
        })
    }

    /// Write the record as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<(), CliError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Run summary written");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use metapop_components::{component_defaults, default_components};

    use super::*;
    use crate::demo::demo_scenario;

    #[test]
    fn summary_reflects_the_run() {
        let mut params = component_defaults();
        params.set("nticks", 5_i64);
        params.set("seed", 3_i64);
        let mut model = Model::new(demo_scenario().unwrap(), params, "summary").unwrap();
        model.set_components(default_components()).unwrap();
        model.run().unwrap();

        let record = RunRecord::from_model(&model).unwrap();
        assert_eq!(record.seed, 3);
        assert_eq!(record.timing.ticks, 5);
        assert_eq!(record.patches.len(), 3);
        assert_eq!(record.patches.first().unwrap().initial, 250_000);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        record.write(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["model"], "summary");
        assert_eq!(parsed["phases"][0], "Model");
    }
}
