//! Instantiation of arriving vertices and their compatibility edges.
//!
//! The simulation decides how many pairs and altruists arrive each tick; a
//! [`VertexGenerator`] decides who they are and which edges they bring. The
//! bundled [`BloodTypeGenerator`] draws ABO types and sensitization levels
//! from population tables and creates an edge whenever the donor's blood
//! type suits the patient and an independent crossmatch passes.

use rand::{
    Rng, RngCore,
    distributions::{Distribution, WeightedIndex},
};
use tracing::{debug, instrument};

use crate::{
    error::{ConfigError, PoolError},
    pool::{AltruistVertex, BloodType, PairVertex, Pool, Vertex, VertexId},
};

/// Population frequencies of O, A, B and AB, in that order.
pub const STANDARD_BLOOD_TYPE_FREQUENCIES: [f64; 4] = [0.4814, 0.3373, 0.1428, 0.0385];

/// Self-compatible draws tolerated for one arriving pair before generation
/// gives up.
pub const MAX_SELF_COMPATIBLE_REDRAWS: usize = 10_000;

/// Sensitization levels and their frequencies: low, medium and high.
pub const STANDARD_SENSITIZATION_LEVELS: [SensitizationLevel; 3] = [
    SensitizationLevel {
        sensitization: 0.05,
        frequency: 0.7019,
    },
    SensitizationLevel {
        sensitization: 0.45,
        frequency: 0.2,
    },
    SensitizationLevel {
        sensitization: 0.90,
        frequency: 0.0981,
    },
];

/// One row of a sensitization table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensitizationLevel {
    /// Probability that a crossmatch against a random donor fails.
    pub sensitization: f64,
    /// Relative frequency of the level in the patient population.
    pub frequency: f64,
}

/// Vertices added to the pool by one [`VertexGenerator::generate`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Arrivals {
    /// New pairs in insertion order.
    pub pairs: Vec<VertexId>,
    /// New altruists in insertion order.
    pub altruists: Vec<VertexId>,
    /// Compatibility edges created, including edges to existing vertices.
    pub edges: usize,
    /// Self-compatible pairs that were discarded and redrawn.
    pub self_compatible_redraws: usize,
}

impl Arrivals {
    /// Iterates over every new vertex in ascending identifier order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        let mut all: Vec<VertexId> = self.pairs.iter().chain(&self.altruists).copied().collect();
        all.sort_unstable();
        all.into_iter()
    }

    /// Returns the number of new vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len() + self.altruists.len()
    }

    /// Returns whether nothing arrived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.altruists.is_empty()
    }
}

/// Creates arriving vertices and wires their compatibility edges.
pub trait VertexGenerator {
    /// Inserts `pairs` pairs and `altruists` altruists into `pool`, with
    /// every compatibility edge between them and the existing vertices.
    ///
    /// # Errors
    /// Propagates any [`PoolError`] raised while mutating the pool.
    fn generate(
        &mut self,
        pool: &mut Pool,
        pairs: usize,
        altruists: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Arrivals, PoolError>;
}

/// Generator drawing blood types and sensitization from population tables.
///
/// # Examples
/// ```
/// use kpd_core::{BloodTypeGenerator, Pool, VertexGenerator};
/// use rand::{SeedableRng, rngs::SmallRng};
///
/// let mut generator = BloodTypeGenerator::standard()?;
/// let mut pool = Pool::new();
/// let mut rng = SmallRng::seed_from_u64(7);
///
/// let arrivals = generator.generate(&mut pool, 10, 1, &mut rng)?;
/// assert_eq!(arrivals.pairs.len(), 10);
/// assert_eq!(pool.altruist_count(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct BloodTypeGenerator {
    blood_types: WeightedIndex<f64>,
    levels: Vec<f64>,
    level_index: WeightedIndex<f64>,
}

impl BloodTypeGenerator {
    /// Builds a generator from custom tables.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidFrequencies`] when a table cannot be
    /// sampled, [`ConfigError::InvalidProbability`] when a sensitization
    /// level lies outside `[0, 1]` and
    /// [`ConfigError::OnlySelfCompatiblePairs`] when every pair the tables
    /// can produce would be self-compatible.
    pub fn new(
        blood_type_frequencies: [f64; 4],
        sensitization_levels: &[SensitizationLevel],
    ) -> Result<Self, ConfigError> {
        let blood_types = WeightedIndex::new(blood_type_frequencies).map_err(|_| {
            ConfigError::InvalidFrequencies {
                table: "blood type",
            }
        })?;
        if let Some(level) = sensitization_levels
            .iter()
            .find(|level| !(0.0..=1.0).contains(&level.sensitization))
        {
            return Err(ConfigError::InvalidProbability {
                parameter: "sensitization",
                got: level.sensitization,
            });
        }
        let level_index = WeightedIndex::new(sensitization_levels.iter().map(|level| level.frequency))
            .map_err(|_| ConfigError::InvalidFrequencies {
                table: "sensitization",
            })?;
        if !admits_incompatible_pair(&blood_type_frequencies, sensitization_levels) {
            return Err(ConfigError::OnlySelfCompatiblePairs);
        }
        Ok(Self {
            blood_types,
            levels: sensitization_levels
                .iter()
                .map(|level| level.sensitization)
                .collect(),
            level_index,
        })
    }

    /// Builds a generator from the standard population tables.
    ///
    /// # Errors
    /// Never fails for the bundled tables; the `Result` mirrors [`Self::new`].
    pub fn standard() -> Result<Self, ConfigError> {
        Self::new(STANDARD_BLOOD_TYPE_FREQUENCIES, &STANDARD_SENSITIZATION_LEVELS)
    }

    fn blood_type<R: Rng + ?Sized>(&self, rng: &mut R) -> BloodType {
        BloodType::ALL
            .get(self.blood_types.sample(rng))
            .copied()
            .unwrap_or(BloodType::O)
    }

    fn sensitization<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.levels
            .get(self.level_index.sample(rng))
            .copied()
            .unwrap_or_default()
    }

    fn crossmatch<R: Rng + ?Sized>(rng: &mut R, sensitization: f64) -> bool {
        rng.gen_bool((1.0 - sensitization).clamp(0.0, 1.0))
    }

    fn compatible<R: Rng + ?Sized>(rng: &mut R, donor: BloodType, patient: &PairVertex) -> bool {
        donor.can_donate_to(patient.patient()) && Self::crossmatch(rng, patient.sensitization())
    }

    /// Draws pairs until one is not self-compatible.
    ///
    /// Gives up with [`PoolError::SelfCompatiblePair`] after
    /// [`MAX_SELF_COMPATIBLE_REDRAWS`] consecutive self-compatible draws.
    fn draw_pair<R: Rng + ?Sized>(&self, rng: &mut R, redraws: &mut usize) -> Result<PairVertex, PoolError> {
        for _ in 0..=MAX_SELF_COMPATIBLE_REDRAWS {
            let pair = PairVertex::new(self.blood_type(rng), self.blood_type(rng), self.sensitization(rng))?;
            if !Self::compatible(rng, pair.donor(), &pair) {
                return Ok(pair);
            }
            *redraws += 1;
        }
        Err(PoolError::SelfCompatiblePair)
    }

    /// Adds every compatibility edge between `id` and the rest of the pool.
    fn wire<R: Rng + ?Sized>(pool: &mut Pool, id: VertexId, rng: &mut R) -> Result<usize, PoolError> {
        let vertex = *pool.vertex(id)?;
        let others: Vec<(VertexId, Vertex)> = pool
            .vertices()
            .filter(|(other, _)| *other != id)
            .map(|(other, vertex)| (other, *vertex))
            .collect();
        let mut created = 0;
        for (other, other_vertex) in others {
            if let Some(patient) = other_vertex.as_pair() {
                if Self::compatible(rng, vertex.donor(), patient) {
                    pool.add_edge(id, other, 1.0)?;
                    created += 1;
                }
            }
            if let Some(patient) = vertex.as_pair() {
                if Self::compatible(rng, other_vertex.donor(), patient) {
                    pool.add_edge(other, id, 1.0)?;
                    created += 1;
                }
            }
        }
        Ok(created)
    }
}

/// Returns whether some drawable pair is not self-compatible: either two
/// weighted blood types where the donor cannot give to the patient, or a
/// weighted sensitization level a crossmatch can fail against.
fn admits_incompatible_pair(blood_type_frequencies: &[f64; 4], levels: &[SensitizationLevel]) -> bool {
    let weighted: Vec<BloodType> = BloodType::ALL
        .iter()
        .zip(blood_type_frequencies)
        .filter(|(_, frequency)| **frequency > 0.0)
        .map(|(blood_type, _)| *blood_type)
        .collect();
    let abo_mismatch = weighted
        .iter()
        .any(|donor| weighted.iter().any(|patient| !donor.can_donate_to(*patient)));
    abo_mismatch
        || levels
            .iter()
            .any(|level| level.frequency > 0.0 && level.sensitization > 0.0)
}

impl VertexGenerator for BloodTypeGenerator {
    #[instrument(name = "arrivals.generate", level = "debug", skip(self, pool, rng), err)]
    fn generate(
        &mut self,
        pool: &mut Pool,
        pairs: usize,
        altruists: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Arrivals, PoolError> {
        let mut arrivals = Arrivals::default();
        for _ in 0..pairs {
            let pair = self.draw_pair(rng, &mut arrivals.self_compatible_redraws)?;
            let id = pool.add_pair(pair)?;
            arrivals.edges += Self::wire(pool, id, rng)?;
            arrivals.pairs.push(id);
        }
        for _ in 0..altruists {
            let id = pool.add_altruist(AltruistVertex::new(self.blood_type(rng)));
            arrivals.edges += Self::wire(pool, id, rng)?;
            arrivals.altruists.push(id);
        }
        debug!(
            edges = arrivals.edges,
            redraws = arrivals.self_compatible_redraws,
            "arrivals wired"
        );
        Ok(arrivals)
    }
}

#[cfg(test)]
mod tests;
