//! Patch dataset: the ordered table of regions a simulation runs over.
//!
//! A scenario is produced by an external construction step (population
//! tables merged with geography) and handed to the model as a
//! [`PatchDataset`]. The model never mutates it. Patch order is stable and
//! defines the patch indices used by every per-patch array in the
//! simulation.
//!
//! # Input format
//!
//! Either a bare list of patch records or a mapping with a `patches` list,
//! in JSON or YAML:
//!
//! ```yaml
//! patches:
//!   - name: north
//!     population: 120000
//!     latitude: 11.5
//!     longitude: 8.2
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur when loading or validating a patch dataset.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Failed to read the scenario file from disk.
    #[error("failed to read scenario file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse JSON content.
    #[error("failed to parse scenario JSON: {source}")]
    Json {
        /// The underlying JSON parse error.
        #[from]
        source: serde_json::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse scenario YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// Two patches share the same name.
    #[error("duplicate patch name: {name}")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// A patch has an empty name.
    #[error("patch at index {index} has an empty name")]
    EmptyName {
        /// Index of the offending patch.
        index: usize,
    },
}

/// A single geographic unit of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Unique patch name.
    pub name: String,
    /// Initial population count.
    pub population: u64,
    /// Latitude in degrees (geographic or population centroid).
    pub latitude: f64,
    /// Longitude in degrees (geographic or population centroid).
    pub longitude: f64,
    /// Optional geometry, kept opaque (typically a `GeoJSON` object).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
}

impl Patch {
    /// Create a patch without geometry.
    pub fn new(name: &str, population: u64, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_owned(),
            population,
            latitude,
            longitude,
            geometry: None,
        }
    }
}

/// Accepted on-disk shapes: a bare list, or `{ patches: [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScenario {
    List(Vec<Patch>),
    Table { patches: Vec<Patch> },
}

impl RawScenario {
    fn into_patches(self) -> Vec<Patch> {
        match self {
            Self::List(patches) | Self::Table { patches } => patches,
        }
    }
}

/// Ordered, validated table of patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchDataset {
    patches: Vec<Patch>,
}

impl PatchDataset {
    /// Build a dataset from patch records, validating name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::EmptyName`] or [`ScenarioError::DuplicateName`]
    /// if the names do not uniquely identify the patches.
    pub fn new(patches: Vec<Patch>) -> Result<Self, ScenarioError> {
        let mut seen = BTreeSet::new();
        for (index, patch) in patches.iter().enumerate() {
            if patch.name.trim().is_empty() {
                return Err(ScenarioError::EmptyName { index });
            }
            if !seen.insert(patch.name.as_str()) {
                return Err(ScenarioError::DuplicateName {
                    name: patch.name.clone(),
                });
            }
        }
        Ok(Self { patches })
    }

    /// Parse a dataset from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Json`] on malformed input, or a validation
    /// error from [`PatchDataset::new`].
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        let raw: RawScenario = serde_json::from_str(json)?;
        Self::new(raw.into_patches())
    }

    /// Parse a dataset from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Yaml`] on malformed input, or a validation
    /// error from [`PatchDataset::new`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ScenarioError> {
        let raw: RawScenario = serde_yml::from_str(yaml)?;
        Self::new(raw.into_patches())
    }

    /// Load a dataset from a file. Files ending in `.json` are parsed as
    /// JSON, everything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Io`] if the file cannot be read, or a parse
    /// or validation error.
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    /// Number of patches.
    pub const fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether the dataset has no patches.
    pub const fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// All patches in index order.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// The patch at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Patch> {
        self.patches.get(index)
    }

    /// Initial population of every patch, in index order.
    pub fn populations(&self) -> Vec<u64> {
        self.patches.iter().map(|p| p.population).collect()
    }

    /// Total initial population, saturating at `u64::MAX`.
    pub fn total_population(&self) -> u64 {
        self.patches
            .iter()
            .fold(0_u64, |acc, p| acc.saturating_add(p.population))
    }

    /// Whether any patch carries geometry.
    pub fn has_geometry(&self) -> bool {
        self.patches.iter().any(|p| p.geometry.is_some())
    }
}
