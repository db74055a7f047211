//! Shared type definitions for the metapop simulation.
//!
//! This crate holds the plain data that flows between the orchestrator,
//! the components, and whatever renders their output. It contains no
//! simulation logic.
//!
//! # Modules
//!
//! - [`scenario`] -- The ordered patch dataset a model runs over
//! - [`figure`] -- Backend-neutral figure artifacts produced by plottable components

pub mod figure;
pub mod scenario;

// Re-export all public types at crate root for convenience.
pub use figure::{Figure, FigureKind, GeometryLayer, HistogramBin, PieSlice, ScatterPoint, Series};
pub use scenario::{Patch, PatchDataset, ScenarioError};
