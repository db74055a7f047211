//! Maternal antibodies: temporary protection for newborns.
//!
//! Registers the `ma_timer` property. A newborn's timer is set to
//! `ma_duration` and its susceptibility to 0. Each tick every running timer
//! counts down by one, starting the tick after birth; when it reaches zero
//! the individual becomes susceptible. A newborn is therefore protected for
//! `ma_duration` ticks after its birth tick.
//!
//! Must be registered after [`Susceptibility`](crate::Susceptibility),
//! whose property it writes.

use metapop_core::{
    BirthAware, BirthBatch, Component, ComponentError, ComponentType, ModelContext, Phase, StateError,
};
use tracing::debug;

use crate::susceptibility::SUSCEPTIBILITY;

/// Name of the maternal antibody timer property.
pub const MA_TIMER: &str = "ma_timer";

/// Counts down newborn protection and releases individuals to susceptible.
#[derive(Debug, Clone)]
pub struct MaternalAntibodies {
    duration: i64,
}

impl MaternalAntibodies {
    /// Protection lasting `duration` ticks.
    pub const fn new(duration: i64) -> Self {
        Self { duration }
    }
}

impl Component for MaternalAntibodies {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_phase(&mut self) -> Option<&mut dyn Phase> {
        Some(self)
    }

    fn as_birth_aware(&mut self) -> Option<&mut dyn BirthAware> {
        Some(self)
    }
}

impl ComponentType for MaternalAntibodies {
    const NAME: &'static str = "MaternalAntibodies";

    fn construct(ctx: &mut ModelContext<'_>) -> Result<Self, ComponentError> {
        let duration = ctx.params.int("ma_duration")?;
        ctx.state.population.add_property(MA_TIMER, 0)?;
        Ok(Self::new(duration))
    }
}

impl Phase for MaternalAntibodies {
    fn step(&mut self, ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError> {
        // Fail on a missing property even when no timer expires this tick.
        ctx.state.population.property(SUSCEPTIBILITY)?;

        let today = i64::try_from(tick).map_err(|_err| StateError::Overflow {
            context: "maternal antibody tick".to_owned(),
        })?;
        let mut expired = Vec::new();
        let (timers, dobs) = ctx.state.population.property_mut_with_dobs(MA_TIMER)?;
        for (index, (timer, dob)) in timers.iter_mut().zip(dobs).enumerate() {
            if *timer > 0 && *dob != today {
                *timer = timer.saturating_sub(1);
                if *timer == 0 {
                    expired.push(index);
                }
            }
        }

        if !expired.is_empty() {
            let susceptibility = ctx.state.population.property_mut(SUSCEPTIBILITY)?;
            for index in &expired {
                if let Some(value) = susceptibility.get_mut(*index) {
                    *value = 1;
                }
            }
            debug!(tick, expired = expired.len(), "Maternal antibodies waned");
        }
        Ok(())
    }
}

impl BirthAware for MaternalAntibodies {
    fn on_birth(&mut self, ctx: &mut ModelContext<'_>, births: &BirthBatch) -> Result<(), ComponentError> {
        if births.is_empty() {
            return Ok(());
        }
        let out_of_range = || ComponentError::Internal {
            message: format!("birth range {:?} outside population", births.agents),
        };
        ctx.state
            .population
            .property_mut(MA_TIMER)?
            .get_mut(births.agents.clone())
            .ok_or_else(out_of_range)?
            .fill(self.duration);
        ctx.state
            .population
            .property_mut(SUSCEPTIBILITY)?
            .get_mut(births.agents.clone())
            .ok_or_else(out_of_range)?
            .fill(0);
        Ok(())
    }
}
