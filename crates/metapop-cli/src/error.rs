//! Error types for the `metapop` binary.
//!
//! [`CliError`] wraps every failure mode between argument parsing and the
//! final summary, so `main` can propagate with `?`.

use metapop_core::{ConfigurationError, ModelError, ParameterError, RunError, StateError, VisualizationError};
use metapop_types::ScenarioError;

/// Top-level error for the `metapop` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The scenario file could not be loaded.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying scenario error.
        #[from]
        source: ScenarioError,
    },

    /// Parameter loading or an override failed.
    #[error("parameter error: {source}")]
    Parameter {
        /// The underlying parameter error.
        #[from]
        source: ParameterError,
    },

    /// The model could not be created.
    #[error("model error: {source}")]
    Model {
        /// The underlying model error.
        #[from]
        source: ModelError,
    },

    /// Component wiring failed.
    #[error("configuration error: {source}")]
    Configuration {
        /// The underlying configuration error.
        #[from]
        source: ConfigurationError,
    },

    /// The run aborted.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: RunError,
    },

    /// Reading the final state failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },

    /// Figures could not be written.
    #[error("visualization error: {source}")]
    Visualization {
        /// The underlying visualization error.
        #[from]
        source: VisualizationError,
    },

    /// Writing the run summary failed.
    #[error("failed to write run summary: {source}")]
    Output {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serializing the run summary failed.
    #[error("failed to serialize run summary: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
