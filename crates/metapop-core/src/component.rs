//! Component contract: the capabilities a simulation component may offer.
//!
//! A component is any object built by a [`ComponentFactory`] during wiring.
//! What it takes part in is declared through capability accessors on
//! [`Component`] rather than discovered at run time:
//!
//! - [`Phase`] -- invoked once per tick, in registration order.
//! - [`BirthAware`] -- notified of every batch of newborns.
//! - [`Plottable`] -- yields diagnostic figures on demand.
//! - [`BirthsAuthority`] -- the single phase that creates newborns and
//!   hands the batch to the orchestrator for fan-out.
//!
//! Components receive a [`ModelContext`] wherever they may touch state and a
//! read-only [`ModelView`] when plotting.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use metapop_types::{Figure, PatchDataset};

use crate::metrics::Metrics;
use crate::params::{ParameterError, ParameterSet};
use crate::state::{SimulationState, StateError};
use crate::visualize::PlotError;

/// Errors raised by a component while being built, stepping, or handling
/// a birth notification.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// A required parameter is missing or has the wrong type.
    #[error("parameter error: {source}")]
    Parameter {
        /// The underlying parameter error.
        #[from]
        source: ParameterError,
    },

    /// Reading or writing shared state failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },

    /// A birth listener failed while handling a notification.
    #[error("birth listener `{listener}` failed: {source}")]
    Listener {
        /// Name of the failing listener.
        listener: String,
        /// What went wrong inside the listener.
        source: Box<ComponentError>,
    },

    /// Any other component-specific failure.
    #[error("{message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Read/write access handed to factories, phases, and birth listeners.
///
/// The parameter set and scenario are shared read-only; the state arena is
/// the only thing a component may mutate.
pub struct ModelContext<'a> {
    /// Resolved parameters.
    pub params: &'a ParameterSet,
    /// The patch dataset.
    pub scenario: &'a PatchDataset,
    /// The mutable state arena.
    pub state: &'a mut SimulationState,
    /// Whether the model runs verbosely.
    pub verbose: bool,
}

impl<'a> ModelContext<'a> {
    /// Bundle the model's pieces into a context.
    pub const fn new(
        params: &'a ParameterSet,
        scenario: &'a PatchDataset,
        state: &'a mut SimulationState,
        verbose: bool,
    ) -> Self {
        Self {
            params,
            scenario,
            state,
            verbose,
        }
    }

    /// Number of patches in the scenario.
    pub const fn npatches(&self) -> usize {
        self.scenario.len()
    }
}

/// Read-only view of a model, handed to plotting code.
#[derive(Clone, Copy)]
pub struct ModelView<'a> {
    /// Model name.
    pub name: &'a str,
    /// Resolved parameters.
    pub params: &'a ParameterSet,
    /// The patch dataset.
    pub scenario: &'a PatchDataset,
    /// Current state.
    pub state: &'a SimulationState,
    /// Timing metrics of the last run.
    pub metrics: &'a Metrics,
}

/// The individuals created by the births authority during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthBatch {
    /// Tick during which the births happened.
    pub tick: usize,
    /// Index range of the new individuals in the population frame.
    pub agents: Range<usize>,
    /// Births per patch, in patch order.
    pub per_patch: Vec<u64>,
}

impl BirthBatch {
    /// An empty batch for `tick` over `npatches` patches.
    pub fn empty(tick: usize, npatches: usize, at: usize) -> Self {
        Self {
            tick,
            agents: at..at,
            per_patch: vec![0; npatches],
        }
    }

    /// Number of newborns in the batch.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the batch holds no newborns.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Births summed over patches.
    pub fn total(&self) -> u64 {
        self.per_patch
            .iter()
            .fold(0_u64, |acc, n| acc.saturating_add(*n))
    }
}

/// Lazily produced figures; an `Err` item ends that component's sequence.
pub type FigureIter<'a> = Box<dyn Iterator<Item = Result<Figure, PlotError>> + 'a>;

/// A step executed once per tick.
pub trait Phase {
    /// Advance the component's part of the simulation for `tick`.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn step(&mut self, ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError>;
}

/// A component that initialises per-individual state for newborns.
pub trait BirthAware {
    /// Handle the newborns of one tick. Called even when the batch is empty.
    ///
    /// # Errors
    ///
    /// Any error aborts the run and is attributed to the births authority.
    fn on_birth(&mut self, ctx: &mut ModelContext<'_>, births: &BirthBatch) -> Result<(), ComponentError>;
}

/// A component that can produce diagnostic figures.
pub trait Plottable {
    /// A fresh sequence of figures for the current model state.
    fn plots<'a>(&'a self, view: ModelView<'a>) -> FigureIter<'a>;
}

/// The phase that creates newborns.
pub trait BirthsAuthority {
    /// Hand over the batch recorded by the last `step`, if any.
    fn take_births(&mut self) -> Option<BirthBatch>;
}

/// A simulation component.
///
/// Every accessor defaults to "not supported"; implementors override the
/// ones matching the roles they play.
pub trait Component {
    /// Display name used in phase lists and timing reports.
    fn name(&self) -> &str;

    /// Per-tick step, if this component is a phase.
    fn as_phase(&mut self) -> Option<&mut dyn Phase> {
        None
    }

    /// Birth handler, if this component wants birth notifications.
    fn as_birth_aware(&mut self) -> Option<&mut dyn BirthAware> {
        None
    }

    /// Figure source, if this component can plot.
    fn as_plottable(&self) -> Option<&dyn Plottable> {
        None
    }

    /// Birth batch source, if this component is the births authority.
    fn as_births_authority(&mut self) -> Option<&mut dyn BirthsAuthority> {
        None
    }
}

type BuildFn = dyn Fn(&mut ModelContext<'_>) -> Result<Box<dyn Component>, ComponentError>;

/// A named constructor for a component, invoked during wiring.
///
/// Factories are cheap to clone so the same list can be assigned more than
/// once.
#[derive(Clone)]
pub struct ComponentFactory {
    name: String,
    build: Arc<BuildFn>,
}

impl ComponentFactory {
    /// Wrap a constructor closure.
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn(&mut ModelContext<'_>) -> Result<Box<dyn Component>, ComponentError> + 'static,
    {
        Self {
            name: name.to_owned(),
            build: Arc::new(build),
        }
    }

    /// Name of the component this factory builds.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct a new instance.
    ///
    /// # Errors
    ///
    /// Propagates the constructor's error.
    pub fn build(&self, ctx: &mut ModelContext<'_>) -> Result<Box<dyn Component>, ComponentError> {
        (self.build)(ctx)
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A component type with a well-known name and a standard constructor.
pub trait ComponentType: Component + Sized + 'static {
    /// Name reported by instances of this type.
    const NAME: &'static str;

    /// Build an instance against the model being wired.
    ///
    /// # Errors
    ///
    /// Returns an error if required parameters or state are unavailable.
    fn construct(ctx: &mut ModelContext<'_>) -> Result<Self, ComponentError>;

    /// A factory that calls [`ComponentType::construct`].
    fn factory() -> ComponentFactory {
        ComponentFactory::new(Self::NAME, |ctx| {
            let component: Box<dyn Component> = Box::new(Self::construct(ctx)?);
            Ok(component)
        })
    }
}
