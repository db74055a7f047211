//! Phase-based orchestrator for discrete-time metapopulation models.
//!
//! A [`Model`] owns a patch scenario, a resolved parameter set, and a shared
//! state arena. Components are registered as factories and wired into an
//! ordered list of per-tick phases, a births authority, and birth listeners.
//! Each run executes every phase once per tick and records how long each one
//! took.
//!
//! # Modules
//!
//! - [`params`] -- Typed parameter set with file loading and `key=value`
//!   overrides.
//! - [`state`] -- Patch population matrix, per-individual frame, seeded RNG.
//! - [`component`] -- Component capability traits, contexts, and factories.
//! - [`model`] -- The orchestrator and component wiring.
//! - [`tick`] -- The tick loop, birth fan-out, and tick observers.
//! - [`metrics`] -- Per-tick, per-phase timings and the end-of-run report.
//! - [`visualize`] -- Figure collection from plottable components.
//! - [`error`] -- [`ModelError`], wrapping every stage's error.
//!
//! [`Model`]: model::Model
//! [`ModelError`]: error::ModelError

pub mod component;
pub mod error;
pub mod metrics;
pub mod model;
pub mod params;
pub mod state;
pub mod tick;
pub mod visualize;

pub use component::{
    BirthAware, BirthBatch, BirthsAuthority, Component, ComponentError, ComponentFactory, ComponentType,
    FigureIter, ModelContext, ModelView, Phase, Plottable,
};
pub use error::ModelError;
pub use metrics::{Metrics, TickTiming, TimingReport};
pub use model::{ConfigurationError, MODEL_PHASE_NAME, Model, PhaseSlot, Wiring};
pub use params::{OverrideOutcome, ParamValue, ParameterError, ParameterSet};
pub use state::{PatchPopulations, PopulationFrame, SimulationState, StateError};
pub use tick::{NoOpObserver, RunError, RunSummary, TickObserver};
pub use visualize::{
    CollectingSink, ConsoleSink, FigureSink, PlotError, VisualizationError, VisualizationReport, VisualizeMode,
};
