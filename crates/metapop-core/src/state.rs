//! Shared simulation state: the arena every phase reads and writes.
//!
//! The arena holds three things:
//!
//! - [`PatchPopulations`] -- a `(nticks + 1) x npatches` matrix of counts.
//!   Row 0 is the scenario's initial population; row `t + 1` starts each
//!   tick as a copy of row `t` and is then adjusted in place.
//! - [`PopulationFrame`] -- per-individual columns (structure of arrays):
//!   the built-in patch index and date of birth, plus named `i64`
//!   properties that components register for their own state.
//! - The model's seeded random number generator.
//!
//! Execution is single-threaded, so phases get `&mut SimulationState`
//! directly with no locking. All accessors are bounds-checked and return
//! [`StateError`] instead of panicking.

use std::collections::BTreeMap;
use std::ops::Range;

use metapop_types::PatchDataset;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Errors that can occur when reading or writing simulation state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A tick index is outside the population matrix.
    #[error("tick {tick} out of range (matrix holds ticks 0..={max_tick})")]
    TickOutOfRange {
        /// The requested tick.
        tick: usize,
        /// Last valid tick row.
        max_tick: usize,
    },

    /// A patch index is outside the dataset.
    #[error("patch {patch} out of range ({npatches} patches)")]
    PatchOutOfRange {
        /// The requested patch.
        patch: usize,
        /// Number of patches.
        npatches: usize,
    },

    /// A named per-individual property has not been registered.
    #[error("unknown population property `{name}`")]
    UnknownProperty {
        /// The requested property.
        name: String,
    },

    /// A property with this name is already registered.
    #[error("population property `{name}` already exists")]
    DuplicateProperty {
        /// The conflicting property.
        name: String,
    },

    /// The scenario's initial population is too large to materialise.
    #[error("initial population {total} exceeds the limit of {limit} individuals")]
    PopulationTooLarge {
        /// Total requested.
        total: u64,
        /// Maximum supported.
        limit: u64,
    },

    /// A count or index computation overflowed.
    #[error("arithmetic overflow: {context}")]
    Overflow {
        /// What was being computed.
        context: String,
    },
}

fn overflow(context: &str) -> StateError {
    StateError::Overflow {
        context: context.to_owned(),
    }
}

/// Per-tick, per-patch population counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPopulations {
    npatches: usize,
    nticks: usize,
    counts: Vec<u64>,
}

impl PatchPopulations {
    /// Allocate `nticks + 1` rows and fill row 0 with `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Overflow`] if the matrix size overflows `usize`
    /// or cannot be allocated.
    pub fn new(initial: &[u64], nticks: usize) -> Result<Self, StateError> {
        let npatches = initial.len();
        let rows = nticks
            .checked_add(1)
            .ok_or_else(|| overflow("population matrix rows"))?;
        let cells = rows
            .checked_mul(npatches)
            .ok_or_else(|| overflow("population matrix cells"))?;
        let bytes = cells
            .checked_mul(std::mem::size_of::<u64>())
            .ok_or_else(|| overflow("population matrix bytes"))?;
        if isize::try_from(bytes).is_err() {
            return Err(overflow("population matrix bytes"));
        }
        let mut counts = Vec::new();
        counts
            .try_reserve_exact(cells)
            .map_err(|_err| overflow("population matrix allocation"))?;
        counts.resize(cells, 0_u64);
        if let Some(row0) = counts.get_mut(..npatches) {
            row0.copy_from_slice(initial);
        }
        Ok(Self {
            npatches,
            nticks,
            counts,
        })
    }

    /// Number of patches (columns).
    pub const fn npatches(&self) -> usize {
        self.npatches
    }

    /// Number of simulated ticks; the matrix has `nticks + 1` rows.
    pub const fn nticks(&self) -> usize {
        self.nticks
    }

    fn row_range(&self, tick: usize) -> Result<Range<usize>, StateError> {
        if tick > self.nticks {
            return Err(StateError::TickOutOfRange {
                tick,
                max_tick: self.nticks,
            });
        }
        let start = tick
            .checked_mul(self.npatches)
            .ok_or_else(|| overflow("population row offset"))?;
        let end = start
            .checked_add(self.npatches)
            .ok_or_else(|| overflow("population row end"))?;
        Ok(start..end)
    }

    fn out_of_range(&self, tick: usize) -> StateError {
        StateError::TickOutOfRange {
            tick,
            max_tick: self.nticks,
        }
    }

    /// Counts for every patch at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TickOutOfRange`] if `tick > nticks`.
    pub fn row(&self, tick: usize) -> Result<&[u64], StateError> {
        let range = self.row_range(tick)?;
        self.counts.get(range).ok_or_else(|| self.out_of_range(tick))
    }

    /// Mutable counts for every patch at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TickOutOfRange`] if `tick > nticks`.
    pub fn row_mut(&mut self, tick: usize) -> Result<&mut [u64], StateError> {
        let range = self.row_range(tick)?;
        let err = self.out_of_range(tick);
        self.counts.get_mut(range).ok_or(err)
    }

    /// Count for one patch at one tick.
    ///
    /// # Errors
    ///
    /// Returns a range error for an invalid tick or patch.
    pub fn get(&self, tick: usize, patch: usize) -> Result<u64, StateError> {
        let npatches = self.npatches;
        self.row(tick)?
            .get(patch)
            .copied()
            .ok_or(StateError::PatchOutOfRange { patch, npatches })
    }

    /// Overwrite the count for one patch at one tick.
    ///
    /// # Errors
    ///
    /// Returns a range error for an invalid tick or patch.
    pub fn set(&mut self, tick: usize, patch: usize, value: u64) -> Result<(), StateError> {
        let npatches = self.npatches;
        let slot = self
            .row_mut(tick)?
            .get_mut(patch)
            .ok_or(StateError::PatchOutOfRange { patch, npatches })?;
        *slot = value;
        Ok(())
    }

    /// Copy row `tick` into row `tick + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TickOutOfRange`] if `tick + 1 > nticks`.
    pub fn carry_forward(&mut self, tick: usize) -> Result<(), StateError> {
        let next = tick.checked_add(1).ok_or_else(|| overflow("next tick"))?;
        let current = self.row_range(tick)?;
        let target = self.row_range(next)?;
        self.counts.copy_within(current, target.start);
        Ok(())
    }

    /// Total population across patches at `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TickOutOfRange`] if `tick > nticks`.
    pub fn total(&self, tick: usize) -> Result<u64, StateError> {
        Ok(self
            .row(tick)?
            .iter()
            .fold(0_u64, |acc, n| acc.saturating_add(*n)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Property {
    default: i64,
    values: Vec<i64>,
}

/// Per-individual state stored column-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationFrame {
    nodeid: Vec<u32>,
    dob: Vec<i64>,
    properties: BTreeMap<String, Property>,
}

impl PopulationFrame {
    /// Upper bound on the number of individuals materialised from a scenario.
    pub const MAX_INITIAL_AGENTS: u64 = 50_000_000;

    /// An empty frame.
    pub const fn new() -> Self {
        Self {
            nodeid: Vec::new(),
            dob: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// One individual per unit of initial population, grouped by patch in
    /// patch order, all born at day 0.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::PopulationTooLarge`] above
    /// [`PopulationFrame::MAX_INITIAL_AGENTS`].
    pub fn from_scenario(scenario: &PatchDataset) -> Result<Self, StateError> {
        let total = scenario.total_population();
        if total > Self::MAX_INITIAL_AGENTS {
            return Err(StateError::PopulationTooLarge {
                total,
                limit: Self::MAX_INITIAL_AGENTS,
            });
        }
        let mut frame = Self::new();
        for (index, patch) in scenario.patches().iter().enumerate() {
            let nodeid = u32::try_from(index).map_err(|_err| overflow("patch index"))?;
            frame.add_agents(patch.population, nodeid, 0)?;
        }
        Ok(frame)
    }

    /// Number of individuals.
    pub fn count(&self) -> usize {
        self.nodeid.len()
    }

    /// Patch index of every individual.
    pub fn nodeids(&self) -> &[u32] {
        &self.nodeid
    }

    /// Date of birth (tick; 0 or negative for the initial population).
    pub fn dobs(&self) -> &[i64] {
        &self.dob
    }

    /// Mutable dates of birth.
    pub fn dobs_mut(&mut self) -> &mut [i64] {
        &mut self.dob
    }

    /// Append `count` individuals in patch `nodeid` born at `dob`. Every
    /// registered property is extended with its default value.
    ///
    /// Returns the index range of the new individuals.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Overflow`] if the frame would exceed `usize`.
    pub fn add_agents(&mut self, count: u64, nodeid: u32, dob: i64) -> Result<Range<usize>, StateError> {
        let count = usize::try_from(count).map_err(|_err| overflow("agent count"))?;
        let start = self.count();
        let end = start
            .checked_add(count)
            .ok_or_else(|| overflow("population frame size"))?;
        self.nodeid.resize(end, nodeid);
        self.dob.resize(end, dob);
        for property in self.properties.values_mut() {
            property.values.resize(end, property.default);
        }
        Ok(start..end)
    }

    /// Register a new `i64` property, filled with `default` for every
    /// existing and future individual.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DuplicateProperty`] if the name is taken.
    pub fn add_property(&mut self, name: &str, default: i64) -> Result<(), StateError> {
        if self.properties.contains_key(name) {
            return Err(StateError::DuplicateProperty {
                name: name.to_owned(),
            });
        }
        self.properties.insert(
            name.to_owned(),
            Property {
                default,
                values: vec![default; self.count()],
            },
        );
        Ok(())
    }

    /// Whether a property is registered.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Names of registered properties in name order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Values of a property, one per individual.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownProperty`] if the name is not registered.
    pub fn property(&self, name: &str) -> Result<&[i64], StateError> {
        self.properties
            .get(name)
            .map(|p| p.values.as_slice())
            .ok_or_else(|| StateError::UnknownProperty {
                name: name.to_owned(),
            })
    }

    /// Mutable values of a property alongside the dates of birth.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownProperty`] if the name is not registered.
    pub fn property_mut_with_dobs(&mut self, name: &str) -> Result<(&mut [i64], &[i64]), StateError> {
        let values = self
            .properties
            .get_mut(name)
            .map(|p| p.values.as_mut_slice())
            .ok_or_else(|| StateError::UnknownProperty {
                name: name.to_owned(),
            })?;
        Ok((values, &self.dob))
    }

    /// Mutable values of a property.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownProperty`] if the name is not registered.
    pub fn property_mut(&mut self, name: &str) -> Result<&mut [i64], StateError> {
        self.properties
            .get_mut(name)
            .map(|p| p.values.as_mut_slice())
            .ok_or_else(|| StateError::UnknownProperty {
                name: name.to_owned(),
            })
    }
}

/// Everything phases share.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Per-tick patch counts.
    pub patches: PatchPopulations,
    /// Per-individual columns.
    pub population: PopulationFrame,
    /// The model's seeded generator.
    pub rng: StdRng,
}

impl SimulationState {
    /// Build the initial state for `scenario` over `nticks` ticks.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] if the matrix or frame cannot be allocated.
    pub fn new(scenario: &PatchDataset, nticks: usize, seed: u64) -> Result<Self, StateError> {
        Ok(Self {
            patches: PatchPopulations::new(&scenario.populations(), nticks)?,
            population: PopulationFrame::from_scenario(scenario)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}
