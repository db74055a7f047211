//! The orchestrator: owns the scenario, parameters, state, and components.
//!
//! A [`Model`] is created from a scenario and a resolved parameter set, then
//! wired with an ordered list of [`ComponentFactory`] values. Wiring builds
//! every component against a fresh state arena and derives:
//!
//! - the phase list -- the built-in carry-forward step first, then every
//!   component that is a [`Phase`](crate::component::Phase), in order;
//! - the births authority -- the single component that creates newborns;
//! - the birth listeners -- every birth-aware component, in order.
//!
//! Wiring is all-or-nothing. If any factory fails or the birth roles are
//! inconsistent, the previous wiring stays in place.
//!
//! The tick loop lives in [`crate::tick`].

use chrono::{DateTime, Local};
use metapop_types::PatchDataset;
use tracing::{debug, info};

use crate::component::{Component, ComponentError, ComponentFactory, ModelContext, ModelView, Plottable};
use crate::error::ModelError;
use crate::metrics::Metrics;
use crate::params::{ParameterError, ParameterSet};
use crate::state::{SimulationState, StateError};
use crate::visualize::{self, ModelPlots, VisualizationError, VisualizationReport, VisualizeMode};

/// Name of the built-in carry-forward phase and of the model's own plots.
pub const MODEL_PHASE_NAME: &str = "Model";

/// Errors that can occur while wiring components.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Birth-aware components are registered but nothing creates births.
    #[error("birth-aware components {birth_aware:?} registered without a births authority")]
    MissingBirthsAuthority {
        /// Names of the birth-aware components.
        birth_aware: Vec<String>,
    },

    /// More than one component claims to create births.
    #[error("multiple births authorities registered: {names:?}")]
    MultipleBirthsAuthorities {
        /// Names of the competing authorities.
        names: Vec<String>,
    },

    /// The births authority never runs, so its batches would never be drained.
    #[error("births authority `{name}` is not a phase")]
    AuthorityNotAPhase {
        /// Name of the authority.
        name: String,
    },

    /// A component factory failed.
    #[error("failed to construct component `{component}`: {source}")]
    Construction {
        /// Name of the factory.
        component: String,
        /// The constructor's error.
        source: ComponentError,
    },

    /// Model parameters are unusable.
    #[error("parameter error: {source}")]
    Parameter {
        /// The underlying parameter error.
        #[from]
        source: ParameterError,
    },

    /// The fresh state arena could not be built.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },
}

/// One entry of the phase list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSlot {
    /// The built-in step that copies populations forward one tick.
    CarryForward,
    /// The component at this index.
    Component(usize),
}

/// Derived execution structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wiring {
    /// Phases in execution order; always starts with [`PhaseSlot::CarryForward`].
    pub phases: Vec<PhaseSlot>,
    /// Index of the births authority, if any.
    pub births_authority: Option<usize>,
    /// Indices of birth-aware components in notification order.
    pub birth_listeners: Vec<usize>,
}

impl Wiring {
    /// Wiring with only the carry-forward phase.
    pub fn new() -> Self {
        Self {
            phases: vec![PhaseSlot::CarryForward],
            births_authority: None,
            birth_listeners: Vec::new(),
        }
    }
}

impl Default for Wiring {
    fn default() -> Self {
        Self::new()
    }
}

/// A metapopulation model.
pub struct Model {
    pub(crate) name: String,
    pub(crate) scenario: PatchDataset,
    pub(crate) params: ParameterSet,
    pub(crate) state: SimulationState,
    pub(crate) components: Vec<Box<dyn Component>>,
    pub(crate) factories: Vec<ComponentFactory>,
    pub(crate) wiring: Wiring,
    pub(crate) metrics: Metrics,
    pub(crate) tinit: DateTime<Local>,
    pub(crate) tstart: Option<DateTime<Local>>,
    pub(crate) tfinish: Option<DateTime<Local>>,
    pub(crate) seed: u64,
    pub(crate) nticks: usize,
    pub(crate) verbose: bool,
}

impl Model {
    /// Create a model over `scenario` with resolved `params`.
    ///
    /// Reads `nticks`, `seed`, and `verbose` from the parameters. A missing
    /// or null seed is replaced by the sub-second microseconds of the
    /// creation time.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Parameter`] if a core parameter is missing or
    /// mistyped, or [`ModelError::State`] if the state arena cannot be built.
    pub fn new(scenario: PatchDataset, params: ParameterSet, name: &str) -> Result<Self, ModelError> {
        let tinit = Local::now();
        info!(model = name, patches = scenario.len(), "Creating model");

        let nticks = params.nticks()?;
        let verbose = params.verbose()?;
        let seed = params
            .seed()?
            .unwrap_or_else(|| u64::from(tinit.timestamp_subsec_micros()));
        debug!(model = name, seed, nticks, "Seeded model");

        let state = SimulationState::new(&scenario, nticks, seed)?;
        let wiring = Wiring::new();
        let metrics = Metrics::new(vec![MODEL_PHASE_NAME.to_owned()]);

        Ok(Self {
            name: name.to_owned(),
            scenario,
            params,
            state,
            components: Vec::new(),
            factories: Vec::new(),
            wiring,
            metrics,
            tinit,
            tstart: None,
            tfinish: None,
            seed,
            nticks,
            verbose,
        })
    }

    /// Build and wire components, replacing any previous wiring.
    ///
    /// Every call starts from a fresh state arena, so assigning the same
    /// factory list twice yields identical wiring.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if a factory fails or the births
    /// roles are inconsistent. The model is unchanged on error.
    pub fn set_components(&mut self, factories: Vec<ComponentFactory>) -> Result<(), ConfigurationError> {
        let mut state = SimulationState::new(&self.scenario, self.nticks, self.seed)?;
        let mut components: Vec<Box<dyn Component>> = Vec::with_capacity(factories.len());
        let mut wiring = Wiring::new();
        let mut authorities = Vec::new();

        {
            let mut ctx = ModelContext::new(&self.params, &self.scenario, &mut state, self.verbose);
            for (index, factory) in factories.iter().enumerate() {
                let mut component =
                    factory
                        .build(&mut ctx)
                        .map_err(|source| ConfigurationError::Construction {
                            component: factory.name().to_owned(),
                            source,
                        })?;
                if component.as_phase().is_some() {
                    wiring.phases.push(PhaseSlot::Component(index));
                }
                if component.as_births_authority().is_some() {
                    authorities.push(index);
                }
                if component.as_birth_aware().is_some() {
                    wiring.birth_listeners.push(index);
                }
                debug!(component = component.name(), index, "Component constructed");
                components.push(component);
            }
        }

        let names_of = |indices: &[usize]| -> Vec<String> {
            indices
                .iter()
                .filter_map(|i| components.get(*i).map(|c| c.name().to_owned()))
                .collect()
        };

        wiring.births_authority = match authorities.as_slice() {
            [] if !wiring.birth_listeners.is_empty() => {
                return Err(ConfigurationError::MissingBirthsAuthority {
                    birth_aware: names_of(&wiring.birth_listeners),
                });
            }
            [] => None,
            [only] => Some(*only),
            _ => {
                return Err(ConfigurationError::MultipleBirthsAuthorities {
                    names: names_of(&authorities),
                });
            }
        };

        if let Some(authority) = wiring.births_authority {
            if !wiring.phases.contains(&PhaseSlot::Component(authority)) {
                return Err(ConfigurationError::AuthorityNotAPhase {
                    name: names_of(&[authority]).concat(),
                });
            }
        }

        self.state = state;
        self.components = components;
        self.factories = factories;
        self.wiring = wiring;
        self.tstart = None;
        self.tfinish = None;
        self.metrics.reset(self.phase_names());

        info!(
            model = %self.name,
            phases = ?self.phase_names(),
            birth_listeners = ?self.birth_listener_names(),
            "Components wired"
        );
        Ok(())
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The patch dataset.
    pub const fn scenario(&self) -> &PatchDataset {
        &self.scenario
    }

    /// The resolved parameters.
    pub const fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Current simulation state.
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Timing metrics of the last run.
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The derived phase and listener structure.
    pub const fn wiring(&self) -> &Wiring {
        &self.wiring
    }

    /// The factory list of the current wiring.
    pub fn factories(&self) -> &[ComponentFactory] {
        &self.factories
    }

    /// Creation time.
    pub const fn tinit(&self) -> DateTime<Local> {
        self.tinit
    }

    /// Start time of the last run.
    pub const fn tstart(&self) -> Option<DateTime<Local>> {
        self.tstart
    }

    /// Finish time of the last successful run.
    pub const fn tfinish(&self) -> Option<DateTime<Local>> {
        self.tfinish
    }

    /// The seed actually used.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of ticks a run executes.
    pub const fn nticks(&self) -> usize {
        self.nticks
    }

    /// Whether the model runs verbosely.
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Display name of a phase slot.
    pub(crate) fn slot_name(&self, slot: PhaseSlot) -> String {
        slot_name(&self.components, slot)
    }

    /// Names of the phases in execution order.
    pub fn phase_names(&self) -> Vec<String> {
        self.wiring
            .phases
            .iter()
            .map(|slot| self.slot_name(*slot))
            .collect()
    }

    /// Names of the birth listeners in notification order.
    pub fn birth_listener_names(&self) -> Vec<String> {
        self.wiring
            .birth_listeners
            .iter()
            .map(|i| slot_name(&self.components, PhaseSlot::Component(*i)))
            .collect()
    }

    /// Names of all components in registration order.
    pub fn component_names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name().to_owned()).collect()
    }

    /// Name of the births authority, if one is wired.
    pub fn births_authority_name(&self) -> Option<String> {
        self.wiring
            .births_authority
            .map(|i| slot_name(&self.components, PhaseSlot::Component(i)))
    }

    /// Read-only view for plotting.
    pub fn view(&self) -> ModelView<'_> {
        ModelView {
            name: &self.name,
            params: &self.params,
            scenario: &self.scenario,
            state: &self.state,
            metrics: &self.metrics,
        }
    }

    /// Collect figures from the model and every plottable component.
    ///
    /// The model's own diagnostics come first, then components in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns a [`VisualizationError`] only if the figure document cannot
    /// be written. Individual plot failures are reported in the returned
    /// [`VisualizationReport`].
    pub fn visualize(&self, mode: VisualizeMode<'_>) -> Result<VisualizationReport, VisualizationError> {
        let mut sources: Vec<(&str, &dyn Plottable)> = vec![(MODEL_PHASE_NAME, &ModelPlots)];
        sources.extend(
            self.components
                .iter()
                .filter_map(|c| c.as_plottable().map(|p| (c.name(), p))),
        );
        info!(model = %self.name, sources = sources.len(), "Visualizing model");
        visualize::render(&sources, self.view(), self.tstart.unwrap_or(self.tinit), mode)
    }
}

pub(crate) fn slot_name(components: &[Box<dyn Component>], slot: PhaseSlot) -> String {
    match slot {
        PhaseSlot::CarryForward => MODEL_PHASE_NAME.to_owned(),
        PhaseSlot::Component(i) => components
            .get(i)
            .map_or_else(|| format!("component #{i}"), |c| c.name().to_owned()),
    }
}
