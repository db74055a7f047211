//! Built-in scenario used when no scenario file is given.

use metapop_types::{Patch, PatchDataset, ScenarioError};

/// Three patches with populations spanning two orders of magnitude.
pub fn demo_scenario() -> Result<PatchDataset, ScenarioError> {
    PatchDataset::new(vec![
        Patch::new("metropolis", 250_000, 9.06, 7.49),
        Patch::new("market-town", 40_000, 10.31, 9.84),
        Patch::new("village", 3_500, 11.85, 13.15),
    ])
}
