//! Seeded synthetic pools.

use kpd_core::{BloodTypeGenerator, Pool, VertexGenerator};
use rand::{SeedableRng, rngs::SmallRng};

use crate::error::BenchSetupError;

/// Shape of a synthetic pool.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticPool {
    /// Pairs to insert.
    pub pairs: usize,
    /// Altruists to insert.
    pub altruists: usize,
    /// Seed for vertex attributes and edges.
    pub seed: u64,
}

impl SyntheticPool {
    /// Builds the pool with the standard population tables.
    ///
    /// # Errors
    /// Returns [`BenchSetupError`] if the generator tables are invalid or the
    /// pool rejects a generated vertex.
    pub fn generate(&self) -> Result<Pool, BenchSetupError> {
        let mut generator = BloodTypeGenerator::standard()?;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut pool = Pool::new();
        generator.generate(&mut pool, self.pairs, self.altruists, &mut rng)?;
        Ok(pool)
    }
}
