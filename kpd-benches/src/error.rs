//! Benchmark setup error type.
//!
//! Lets setup functions propagate failures with `?` rather than panicking
//! inside Criterion closures.

use kpd_core::{ConfigError, OptimizerError, PoolError, SimulationError};

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Generator or optimizer configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Populating the synthetic pool failed.
    #[error("pool construction failed: {0}")]
    Pool(#[from] PoolError),
    /// Selection failed while preparing a fixture.
    #[error("optimizer failed: {0}")]
    Optimizer(#[from] OptimizerError),
    /// The simulation loop could not be constructed.
    #[error("simulation setup failed: {0}")]
    Simulation(#[from] SimulationError),
}
