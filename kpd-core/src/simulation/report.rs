//! Per-tick and whole-run counters.

use std::time::Duration;

/// What happened during one tick.
///
/// Counts describe the tick alone except `seen_*`, which are running totals,
/// and `pool_*`, which describe the pool once the tick finished.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Zero-based tick index.
    pub tick: u64,
    /// Pairs that arrived.
    pub arrived_pairs: usize,
    /// Altruists that arrived.
    pub arrived_altruists: usize,
    /// Pairs that have arrived since the run started.
    pub seen_pairs: usize,
    /// Altruists that have arrived since the run started.
    pub seen_altruists: usize,
    /// Patients who received a kidney.
    pub matched: usize,
    /// Pending groupings voided by an edge failure.
    pub failed: usize,
    /// Pending groupings dropped because a member departed first.
    pub discarded: usize,
    /// Pairs that left the pool unmatched.
    pub deceased: usize,
    /// Altruists whose patience ran out.
    pub expired: usize,
    /// Pairs turned into bridge donors.
    pub bridges: usize,
    /// Pairs left in the pool.
    pub pool_pairs: usize,
    /// Altruists left in the pool.
    pub pool_altruists: usize,
    /// Groupings offered to the optimizer.
    pub groupings: usize,
    /// Groupings committed for resolution next tick.
    pub selected: usize,
    /// Objective value of the committed selection.
    pub objective: f64,
    /// Wall-clock time spent on the tick.
    pub elapsed: Duration,
}

/// Totals accumulated over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationSummary {
    /// Ticks completed.
    pub ticks: u64,
    /// Pairs that arrived.
    pub seen_pairs: usize,
    /// Altruists that arrived.
    pub seen_altruists: usize,
    /// Patients who received a kidney.
    pub matched: usize,
    /// Groupings voided by an edge failure.
    pub failed: usize,
    /// Groupings dropped because a member departed first.
    pub discarded: usize,
    /// Pairs that left unmatched.
    pub deceased: usize,
    /// Altruists whose patience ran out.
    pub expired: usize,
    /// Bridge donors created.
    pub bridges: usize,
    /// Pairs in the pool at the end of the run.
    pub pool_pairs: usize,
    /// Altruists in the pool at the end of the run.
    pub pool_altruists: usize,
    /// Whether the wall-clock limit ended the run before every tick ran.
    pub timed_out: bool,
    /// Wall-clock time spent in ticks.
    pub elapsed: Duration,
}

impl SimulationSummary {
    /// Folds one tick into the totals.
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.seen_pairs = report.seen_pairs;
        self.seen_altruists = report.seen_altruists;
        self.matched += report.matched;
        self.failed += report.failed;
        self.discarded += report.discarded;
        self.deceased += report.deceased;
        self.expired += report.expired;
        self.bridges += report.bridges;
        self.pool_pairs = report.pool_pairs;
        self.pool_altruists = report.pool_altruists;
        self.elapsed += report.elapsed;
    }

    /// Returns the share of arrived pairs whose patient was matched, or
    /// `None` before any pair arrived.
    #[must_use]
    pub fn match_rate(&self) -> Option<f64> {
        let seen = u32::try_from(self.seen_pairs).ok().filter(|seen| *seen > 0)?;
        let matched = u32::try_from(self.matched).ok()?;
        Some(f64::from(matched) / f64::from(seen))
    }
}
