//! Per-tick, per-phase wall-clock timings.
//!
//! Every completed tick contributes one [`TickTiming`] row holding the
//! elapsed microseconds of each phase in registration order. A
//! [`TimingReport`] sums the columns for the end-of-run summary.

use std::fmt;

use serde::Serialize;

/// Elapsed time of every phase during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickTiming {
    /// The tick.
    pub tick: usize,
    /// Microseconds per phase, in phase order.
    pub elapsed_us: Vec<u64>,
}

/// Timing rows for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    phase_names: Vec<String>,
    rows: Vec<TickTiming>,
}

impl Metrics {
    /// Empty metrics for the given phase columns.
    pub const fn new(phase_names: Vec<String>) -> Self {
        Self {
            phase_names,
            rows: Vec::new(),
        }
    }

    /// Column names.
    pub fn phase_names(&self) -> &[String] {
        &self.phase_names
    }

    /// Completed tick rows.
    pub fn rows(&self) -> &[TickTiming] {
        &self.rows
    }

    /// Number of completed ticks.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no tick has completed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a completed tick.
    pub fn push(&mut self, row: TickTiming) {
        self.rows.push(row);
    }

    /// Drop all rows and adopt new column names.
    pub fn reset(&mut self, phase_names: Vec<String>) {
        self.phase_names = phase_names;
        self.rows.clear();
    }

    /// Total microseconds per phase, in phase order.
    pub fn totals(&self) -> Vec<u64> {
        let mut totals = vec![0_u64; self.phase_names.len()];
        for row in &self.rows {
            for (sum, us) in totals.iter_mut().zip(&row.elapsed_us) {
                *sum = sum.saturating_add(*us);
            }
        }
        totals
    }

    /// Summarise the run.
    pub fn report(&self) -> TimingReport {
        let phases: Vec<PhaseTotal> = self
            .phase_names
            .iter()
            .zip(self.totals())
            .map(|(phase, elapsed_us)| PhaseTotal {
                phase: phase.clone(),
                elapsed_us,
            })
            .collect();
        let total_us = phases
            .iter()
            .fold(0_u64, |acc, p| acc.saturating_add(p.elapsed_us));
        TimingReport {
            ticks: self.rows.len(),
            phases,
            total_us,
        }
    }
}

/// Summed time for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTotal {
    /// Phase name.
    pub phase: String,
    /// Total microseconds across all ticks.
    pub elapsed_us: u64,
}

/// Per-phase totals and the grand total of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    /// Number of ticks summed.
    pub ticks: usize,
    /// Totals in phase order.
    pub phases: Vec<PhaseTotal>,
    /// Sum over all phases.
    pub total_us: u64,
}

const VALUE_WIDTH: usize = 13;

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .phases
            .iter()
            .map(|p| p.phase.chars().count())
            .max()
            .unwrap_or(0);
        for p in &self.phases {
            writeln!(
                f,
                "{:width$}: {:>VALUE_WIDTH$} µs",
                p.phase,
                group_thousands(p.elapsed_us)
            )?;
        }
        writeln!(f, "{}", "=".repeat(width.saturating_add(VALUE_WIDTH).saturating_add(5)))?;
        write!(
            f,
            "{:w$} {:>VALUE_WIDTH$} microseconds",
            "Total:",
            group_thousands(self.total_us),
            w = width.saturating_add(1)
        )
    }
}

/// Format `n` with `,` between groups of three digits.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len().saturating_add(digits.len() / 3));
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len().saturating_sub(i)) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
