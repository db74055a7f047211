//! Non-disease deaths, applied to patch counts only.
//!
//! Each tick removes `population * cdr / 1000 / 365` people from every
//! patch in expectation, rounded stochastically and clamped to the people
//! available in the next tick's row. Individuals in the population frame are
//! not removed.

use metapop_core::{
    Component, ComponentError, ComponentType, FigureIter, ModelContext, ModelView, Phase, Plottable,
    StateError,
};
use metapop_types::{Figure, FigureKind, Series};
use tracing::debug;

use crate::config::daily_rate;
use crate::stochastic::{expected_events, stochastic_round};

/// Aggregate mortality from causes other than the modelled disease.
#[derive(Debug, Clone)]
pub struct NonDiseaseDeaths {
    rate: f64,
    history: Vec<u64>,
}

impl NonDiseaseDeaths {
    /// A deaths phase with the given crude death rate (per 1000 per year).
    pub fn new(cdr: f64) -> Self {
        Self {
            rate: daily_rate(cdr),
            history: Vec::new(),
        }
    }

    /// Total deaths recorded for each completed tick of the latest run.
    pub fn history(&self) -> &[u64] {
        &self.history
    }
}

impl Component for NonDiseaseDeaths {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_phase(&mut self) -> Option<&mut dyn Phase> {
        Some(self)
    }

    fn as_plottable(&self) -> Option<&dyn Plottable> {
        Some(self)
    }
}

impl ComponentType for NonDiseaseDeaths {
    const NAME: &'static str = "NonDiseaseDeaths";

    fn construct(ctx: &mut ModelContext<'_>) -> Result<Self, ComponentError> {
        Ok(Self::new(ctx.params.float("cdr")?))
    }
}

impl Phase for NonDiseaseDeaths {
    fn step(&mut self, ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError> {
        let next = tick.checked_add(1).ok_or_else(|| StateError::Overflow {
            context: "deaths target tick".to_owned(),
        })?;

        if tick == 0 {
            self.history.clear();
        }

        let mut total = 0_u64;
        for patch in 0..ctx.npatches() {
            let current = ctx.state.patches.get(tick, patch)?;
            let available = ctx.state.patches.get(next, patch)?;
            let deaths = stochastic_round(expected_events(current, self.rate), &mut ctx.state.rng).min(available);
            ctx.state
                .patches
                .set(next, patch, available.saturating_sub(deaths))?;
            total = total.saturating_add(deaths);
        }

        debug!(tick, deaths = total, "Non-disease deaths");
        self.history.push(total);
        Ok(())
    }
}

impl Plottable for NonDiseaseDeaths {
    #[allow(clippy::cast_precision_loss)]
    fn plots<'a>(&'a self, _view: ModelView<'a>) -> FigureIter<'a> {
        Box::new(std::iter::once_with(move || {
            let points = self
                .history
                .iter()
                .enumerate()
                .map(|(tick, n)| (tick as f64, *n as f64))
                .collect();
            Ok(Figure::new(
                "Non-Disease Deaths per Tick",
                FigureKind::Line {
                    series: vec![Series {
                        label: "deaths".to_owned(),
                        points,
                    }],
                },
            )
            .with_x_label("Tick")
            .with_y_label("Deaths"))
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use metapop_core::SimulationState;
    use metapop_types::{Patch, PatchDataset};

    use super::*;

    #[test]
    fn deaths_reduce_next_row() {
        let scenario = PatchDataset::new(vec![Patch::new("a", 365_000, 0.0, 0.0)]).unwrap();
        let mut state = SimulationState::new(&scenario, 1, 5).unwrap();
        let params = crate::component_defaults();
        let mut ctx = ModelContext::new(&params, &scenario, &mut state, false);
        let mut deaths = NonDiseaseDeaths::construct(&mut ctx).unwrap();

        ctx.state.patches.carry_forward(0).unwrap();
        deaths.step(&mut ctx, 0).unwrap();

        // 365,000 * 17 / 1000 / 365 = 17 exactly.
        assert_eq!(deaths.history(), &[17]);
        assert_eq!(ctx.state.patches.get(1, 0).unwrap(), 365_000 - 17);
    }

    #[test]
    fn history_restarts_with_each_run() {
        let scenario = PatchDataset::new(vec![Patch::new("a", 365_000, 0.0, 0.0)]).unwrap();
        let mut state = SimulationState::new(&scenario, 2, 5).unwrap();
        let params = crate::component_defaults();
        let mut ctx = ModelContext::new(&params, &scenario, &mut state, false);
        let mut deaths = NonDiseaseDeaths::construct(&mut ctx).unwrap();

        for tick in [0, 1, 0, 1] {
            ctx.state.patches.carry_forward(tick).unwrap();
            deaths.step(&mut ctx, tick).unwrap();
        }
        assert_eq!(deaths.history().len(), 2);
    }

    #[test]
    fn deaths_never_exceed_population() {
        let scenario = PatchDataset::new(vec![Patch::new("tiny", 3, 0.0, 0.0)]).unwrap();
        let mut state = SimulationState::new(&scenario, 1, 5).unwrap();
        let mut params = crate::component_defaults();
        params.set("cdr", 1_000_000.0);
        let mut ctx = ModelContext::new(&params, &scenario, &mut state, false);
        let mut deaths = NonDiseaseDeaths::construct(&mut ctx).unwrap();

        ctx.state.patches.carry_forward(0).unwrap();
        deaths.step(&mut ctx, 0).unwrap();
        assert_eq!(ctx.state.patches.get(1, 0).unwrap(), 0);
        assert_eq!(deaths.history(), &[3]);
    }
}
