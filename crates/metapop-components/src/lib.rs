//! Reference components for metapop models.
//!
//! These components exercise every role of the component contract: a
//! births authority, an aggregate mortality phase, and two birth listeners
//! that initialise per-individual state for newborns.
//!
//! # Modules
//!
//! - [`births`] -- [`Births`], the births authority
//! - [`deaths`] -- [`NonDiseaseDeaths`], aggregate mortality
//! - [`susceptibility`] -- [`Susceptibility`], the `susceptibility` property
//! - [`maternal_antibodies`] -- [`MaternalAntibodies`], waning newborn protection
//! - [`config`] -- Demographic rates and [`component_defaults`]
//! - [`stochastic`] -- Stochastic rounding of expected event counts

pub mod births;
pub mod config;
pub mod deaths;
pub mod maternal_antibodies;
pub mod stochastic;
pub mod susceptibility;

pub use births::Births;
pub use config::{DemographyConfig, component_defaults};
pub use deaths::NonDiseaseDeaths;
pub use maternal_antibodies::MaternalAntibodies;
pub use susceptibility::Susceptibility;

use metapop_core::{ComponentFactory, ComponentType};

/// The standard component list, in execution order.
pub fn default_components() -> Vec<ComponentFactory> {
    vec![
        Births::factory(),
        NonDiseaseDeaths::factory(),
        Susceptibility::factory(),
        MaternalAntibodies::factory(),
    ]
}
