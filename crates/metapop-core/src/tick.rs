//! Tick loop: runs every phase once per tick and records its wall-clock cost.
//!
//! For each tick `t` in `0..nticks` the phases run in wiring order. The
//! first phase is always the carry-forward step, which copies the patch
//! populations of row `t` into row `t + 1` so later phases can adjust the
//! next tick in place.
//!
//! When the slot being run is the births authority, its batch of newborns
//! is drained right after its step and handed to every birth listener in
//! registration order. The notification time counts toward the authority's
//! phase.
//!
//! A phase error stops the run immediately. Timings of completed ticks are
//! kept; the failing tick's partial row is dropped.

use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::component::{BirthBatch, Component, ComponentError, ModelContext};
use crate::metrics::{TickTiming, TimingReport};
use crate::model::{Model, PhaseSlot, Wiring, slot_name};

/// Errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A phase (or a birth listener it notified) failed.
    #[error("phase `{phase}` failed at tick {tick}: {source}")]
    Phase {
        /// Tick being executed.
        tick: usize,
        /// Name of the failing phase.
        phase: String,
        /// The phase's error.
        source: ComponentError,
    },
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of ticks executed.
    pub ticks: usize,
    /// Per-phase timing totals.
    pub report: TimingReport,
}

/// Hook invoked around the tick loop.
///
/// Implementations can drive a progress display or collect timings as
/// they are produced.
pub trait TickObserver {
    /// Called once before the first tick.
    fn on_run_start(&mut self, _nticks: usize) {}

    /// Called after each completed tick.
    fn on_tick(&mut self, tick: usize, timing: &TickTiming);

    /// Called once after the last tick of a successful run.
    fn on_run_end(&mut self, _report: &TimingReport) {}
}

/// An observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl TickObserver for NoOpObserver {
    fn on_tick(&mut self, _tick: usize, _timing: &TickTiming) {}
}

impl Model {
    /// Run every tick with no observer.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Phase`] if any phase fails.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        self.run_with(&mut NoOpObserver)
    }

    /// Run every tick, reporting progress to `observer`.
    ///
    /// Metrics are cleared first. With `nticks == 0` no phase is invoked.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Phase`] if any phase fails. Metrics of completed
    /// ticks are kept and `tfinish` stays unset.
    pub fn run_with(&mut self, observer: &mut dyn TickObserver) -> Result<RunSummary, RunError> {
        let phase_names = self.phase_names();
        let tstart = Local::now();
        self.tstart = Some(tstart);
        self.tfinish = None;
        self.metrics.reset(phase_names);
        info!(
            model = %self.name,
            nticks = self.nticks,
            phases = self.wiring.phases.len(),
            started = %tstart,
            "Running model"
        );
        observer.on_run_start(self.nticks);

        let Self {
            params,
            scenario,
            state,
            components,
            wiring,
            metrics,
            nticks,
            verbose,
            ..
        } = self;

        for tick in 0..*nticks {
            let mut elapsed_us = Vec::with_capacity(wiring.phases.len());
            for slot in &wiring.phases {
                let started = Instant::now();
                let mut ctx = ModelContext::new(&*params, &*scenario, &mut *state, *verbose);
                if let Err(source) = run_slot(*slot, tick, &mut ctx, components, wiring) {
                    let phase = slot_name(components, *slot);
                    warn!(tick, phase = %phase, %source, "Phase failed, aborting run");
                    return Err(RunError::Phase { tick, phase, source });
                }
                elapsed_us.push(micros(started.elapsed()));
            }
            let row = TickTiming { tick, elapsed_us };
            debug!(tick, "Tick complete");
            observer.on_tick(tick, &row);
            metrics.push(row);
        }

        let tfinish = Local::now();
        self.tfinish = Some(tfinish);
        let report = self.metrics.report();
        info!(
            model = %self.name,
            ticks = report.ticks,
            total_us = report.total_us,
            finished = %tfinish,
            "Model run completed"
        );
        if self.verbose {
            for phase in &report.phases {
                info!(phase = %phase.phase, elapsed_us = phase.elapsed_us, "Phase time");
            }
            info!(total_us = report.total_us, "Total phase time");
        }
        observer.on_run_end(&report);

        Ok(RunSummary {
            ticks: report.ticks,
            report,
        })
    }
}

fn run_slot(
    slot: PhaseSlot,
    tick: usize,
    ctx: &mut ModelContext<'_>,
    components: &mut [Box<dyn Component>],
    wiring: &Wiring,
) -> Result<(), ComponentError> {
    let index = match slot {
        PhaseSlot::CarryForward => {
            ctx.state.patches.carry_forward(tick)?;
            return Ok(());
        }
        PhaseSlot::Component(index) => index,
    };

    let component = components.get_mut(index).ok_or_else(|| ComponentError::Internal {
        message: format!("no component at index {index}"),
    })?;
    if let Some(phase) = component.as_phase() {
        phase.step(ctx, tick)?;
    }

    if wiring.births_authority == Some(index) {
        let batch = component
            .as_births_authority()
            .and_then(|authority| authority.take_births())
            .unwrap_or_else(|| BirthBatch::empty(tick, ctx.npatches(), ctx.state.population.count()));
        notify_births(components, &wiring.birth_listeners, ctx, &batch)?;
    }
    Ok(())
}

fn notify_births(
    components: &mut [Box<dyn Component>],
    listeners: &[usize],
    ctx: &mut ModelContext<'_>,
    batch: &BirthBatch,
) -> Result<(), ComponentError> {
    debug!(tick = batch.tick, births = batch.len(), listeners = listeners.len(), "Notifying birth listeners");
    for &index in listeners {
        let Some(component) = components.get_mut(index) else {
            continue;
        };
        let Some(listener) = component.as_birth_aware() else {
            continue;
        };
        if let Err(source) = listener.on_birth(ctx, batch) {
            return Err(ComponentError::Listener {
                listener: component.name().to_owned(),
                source: Box::new(source),
            });
        }
    }
    Ok(())
}

fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}
