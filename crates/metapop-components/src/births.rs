//! Births: the component that creates newborns.
//!
//! Each tick, every patch produces `population * cbr / 1000 / 365` births
//! in expectation, rounded stochastically with the model's generator. The
//! newborns are added to the next tick's patch count and appended to the
//! population frame (patch `p`, born at tick `t`). The tick's batch is then
//! handed to the orchestrator, which notifies every birth listener.

use metapop_core::{
    BirthBatch, BirthsAuthority, Component, ComponentError, ComponentType, FigureIter, ModelContext,
    ModelView, Phase, Plottable, StateError,
};
use metapop_types::{Figure, FigureKind, Series};
use tracing::debug;

use crate::config::daily_rate;
use crate::stochastic::{expected_events, stochastic_round};

/// The births authority.
#[derive(Debug, Clone)]
pub struct Births {
    rate: f64,
    pending: Option<BirthBatch>,
    history: Vec<u64>,
}

impl Births {
    /// A births phase with the given crude birth rate (per 1000 per year).
    pub fn new(cbr: f64) -> Self {
        Self {
            rate: daily_rate(cbr),
            pending: None,
            history: Vec::new(),
        }
    }

    /// Total births recorded for each completed tick of the latest run.
    pub fn history(&self) -> &[u64] {
        &self.history
    }
}

impl Component for Births {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn as_phase(&mut self) -> Option<&mut dyn Phase> {
        Some(self)
    }

    fn as_plottable(&self) -> Option<&dyn Plottable> {
        Some(self)
    }

    fn as_births_authority(&mut self) -> Option<&mut dyn BirthsAuthority> {
        Some(self)
    }
}

impl ComponentType for Births {
    const NAME: &'static str = "Births";

    fn construct(ctx: &mut ModelContext<'_>) -> Result<Self, ComponentError> {
        let cbr = ctx.params.float("cbr")?;
        if ctx.verbose {
            debug!(cbr, "Births configured");
        }
        Ok(Self::new(cbr))
    }
}

impl Phase for Births {
    fn step(&mut self, ctx: &mut ModelContext<'_>, tick: usize) -> Result<(), ComponentError> {
        let next = tick.checked_add(1).ok_or_else(|| StateError::Overflow {
            context: "births target tick".to_owned(),
        })?;
        let dob = i64::try_from(tick).map_err(|_err| StateError::Overflow {
            context: "births date of birth".to_owned(),
        })?;

        if tick == 0 {
            self.history.clear();
        }

        let start = ctx.state.population.count();
        let mut per_patch = Vec::with_capacity(ctx.npatches());
        for patch in 0..ctx.npatches() {
            let current = ctx.state.patches.get(tick, patch)?;
            let births = stochastic_round(expected_events(current, self.rate), &mut ctx.state.rng);
            if births > 0 {
                let nodeid = u32::try_from(patch).map_err(|_err| StateError::Overflow {
                    context: "births patch index".to_owned(),
                })?;
                ctx.state.population.add_agents(births, nodeid, dob)?;
                let upcoming = ctx.state.patches.get(next, patch)?;
                let updated = upcoming.checked_add(births).ok_or_else(|| StateError::Overflow {
                    context: "births patch population".to_owned(),
                })?;
                ctx.state.patches.set(next, patch, updated)?;
            }
            per_patch.push(births);
        }

        let batch = BirthBatch {
            tick,
            agents: start..ctx.state.population.count(),
            per_patch,
        };
        debug!(tick, births = batch.total(), "Births");
        self.history.push(batch.total());
        self.pending = Some(batch);
        Ok(())
    }
}

impl BirthsAuthority for Births {
    fn take_births(&mut self) -> Option<BirthBatch> {
        self.pending.take()
    }
}

impl Plottable for Births {
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
                "Births per Tick",
                FigureKind::Line {
                    series: vec![Series {
                        label: "births".to_owned(),
                        points,
                    }],
                },
            )
            .with_x_label("Tick")
            .with_y_label("Births"))
        }))
    }
}
