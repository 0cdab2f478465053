//! Support library for the `kpd` binary.
//!
//! Exposes the command and logging modules so tests can drive a simulation
//! without spawning a subprocess.

pub mod cli;
pub mod logging;
