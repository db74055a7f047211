//! Error type covering the whole model lifecycle.
//!
//! Each stage has its own error enum; [`ModelError`] wraps them for callers
//! that drive a model end to end and want a single error type.

use metapop_types::ScenarioError;

use crate::model::ConfigurationError;
use crate::params::ParameterError;
use crate::state::StateError;
use crate::tick::RunError;
use crate::visualize::VisualizationError;

/// Errors from building, wiring, running, or visualizing a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The scenario could not be loaded.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying scenario error.
        #[from]
        source: ScenarioError,
    },

    /// A parameter is missing, mistyped, or malformed.
    #[error("parameter error: {source}")]
    Parameter {
        /// The underlying parameter error.
        #[from]
        source: ParameterError,
    },

    /// The state arena could not be built.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },

    /// Component wiring failed.
    #[error("configuration error: {source}")]
    Configuration {
        /// The underlying configuration error.
        #[from]
        source: ConfigurationError,
    },

    /// A phase failed during the run.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: RunError,
    },

    /// The figure document could not be written.
    #[error("visualization error: {source}")]
    Visualization {
        /// The underlying visualization error.
        #[from]
        source: VisualizationError,
    },
}
