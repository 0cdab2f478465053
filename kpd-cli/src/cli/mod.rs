//! Command-line interface for the kidney paired donation simulator.
//!
//! The single `simulate` command builds a [`kpd_core::SimulationConfig`] from
//! its flags, runs the loop with the standard blood-type generator and the
//! exhaustive optimizer, and renders a per-tick table plus a run summary.

mod commands;

pub use commands::{
    Cli, CliError, Command, ExecutionSummary, FailureMode, SimulateCommand, StrategyArg, emit,
    render_summary, render_ticks, run_cli,
};
