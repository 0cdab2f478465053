//! Benchmark support crate for the kidney paired donation simulator.
//!
//! Provides seeded synthetic pools and parameter types used by the Criterion
//! benchmarks for enumeration, selection and the full simulation loop.

pub mod error;
pub mod params;
pub mod pool;
