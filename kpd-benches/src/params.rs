//! Benchmark parameter types.

use std::fmt;

/// Parameters for an enumeration or selection benchmark.
#[derive(Clone, Debug)]
pub struct PoolBenchParams {
    /// Pairs in the pool.
    pub pairs: usize,
    /// Altruists in the pool.
    pub altruists: usize,
    /// Cap applied to both cycle and chain length.
    pub max_length: usize,
}

impl fmt::Display for PoolBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pairs={},alt={},len={}", self.pairs, self.altruists, self.max_length)
    }
}

/// Parameters for a whole-loop benchmark.
#[derive(Clone, Debug)]
pub struct LoopBenchParams {
    /// Ticks per run.
    pub iterations: u64,
    /// Mean pair arrivals per tick.
    pub pair_arrival_rate: f64,
}

impl fmt::Display for LoopBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticks={},rate={}", self.iterations, self.pair_arrival_rate)
    }
}
