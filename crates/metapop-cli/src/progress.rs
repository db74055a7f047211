//! Tick observer that drives a terminal progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use metapop_core::{TickObserver, TickTiming, TimingReport};
use tracing::debug;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ticks ({eta})";

/// Shows run progress on stderr.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    /// A progress bar with no length yet; the run sets it.
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style);
        }
        Self { bar }
    }

    /// A progress observer that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TickObserver for ProgressObserver {
    fn on_run_start(&mut self, nticks: usize) {
        self.bar.set_length(u64::try_from(nticks).unwrap_or(u64::MAX));
        self.bar.set_position(0);
    }

    fn on_tick(&mut self, tick: usize, timing: &TickTiming) {
        debug!(tick, phases = timing.elapsed_us.len(), "Tick progress");
        self.bar.inc(1);
    }

    fn on_run_end(&mut self, report: &TimingReport) {
        self.bar
            .finish_with_message(format!("{} ticks in {} µs", report.ticks, report.total_us));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_ticks() {
        let mut observer = ProgressObserver::hidden();
        observer.on_run_start(3);
        for tick in 0..3 {
            observer.on_tick(
                tick,
                &TickTiming {
                    tick,
                    elapsed_us: vec![1],
                },
            );
        }
        observer.on_run_end(&TimingReport::default());
        assert_eq!(observer.bar.position(), 3);
    }
}
