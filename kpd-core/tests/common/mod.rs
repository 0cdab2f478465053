use kpd_core::{
    AltruistVertex, Arrivals, BloodType, PairVertex, Pool, PoolError, VertexGenerator,
};
use rand::RngCore;

/// Generator where every donor suits every patient.
///
/// Each arrival is wired to and from every pair already in the pool, so
/// matches depend only on the simulation's own draws.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniversalGenerator;

impl VertexGenerator for UniversalGenerator {
    fn generate(
        &mut self,
        pool: &mut Pool,
        pairs: usize,
        altruists: usize,
        _rng: &mut dyn RngCore,
    ) -> Result<Arrivals, PoolError> {
        let mut arrivals = Arrivals::default();
        for _ in 0..pairs {
            let id = pool.add_pair(PairVertex::new(BloodType::O, BloodType::A, 0.0)?)?;
            let others: Vec<_> = pool.pair_ids().filter(|other| *other != id).collect();
            for other in others {
                pool.add_edge(id, other, 1.0)?;
                pool.add_edge(other, id, 1.0)?;
                arrivals.edges += 2;
            }
            for altruist in pool.altruist_ids().collect::<Vec<_>>() {
                pool.add_edge(altruist, id, 1.0)?;
                arrivals.edges += 1;
            }
            arrivals.pairs.push(id);
        }
        for _ in 0..altruists {
            let id = pool.add_altruist(AltruistVertex::new(BloodType::O));
            for pair in pool.pair_ids().collect::<Vec<_>>() {
                pool.add_edge(id, pair, 1.0)?;
                arrivals.edges += 1;
            }
            arrivals.altruists.push(id);
        }
        Ok(arrivals)
    }
}
