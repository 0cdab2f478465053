//! Edge failure-probability and weight policies.
//!
//! Both policies only touch compatibility edges. Dummy edges always keep a
//! weight of zero and a failure probability of zero, so chains can always
//! stop without cost or risk.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::debug;

use crate::{
    error::ConfigError,
    grouping::Grouping,
    pool::{Pool, Vertex, VertexId},
};

/// Probability of the low-risk band under [`FailurePolicy::Bimodal`].
pub const BIMODAL_LOW_BAND_PROBABILITY: f64 = 0.25;
/// Upper bound of the low-risk band.
pub const BIMODAL_LOW_BAND_MAX: f64 = 0.2;
/// Lower bound of the high-risk band.
pub const BIMODAL_HIGH_BAND_MIN: f64 = 0.8;

/// How failure probabilities are assigned to compatibility edges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum FailurePolicy {
    /// Every transplant goes ahead.
    #[default]
    None,
    /// Every edge fails with the same probability.
    Constant(f64),
    /// A quarter of edges draw from `U[0, 0.2]`, the rest from `U[0.8, 1.0]`.
    Bimodal,
}

impl FailurePolicy {
    pub(crate) fn validate(self) -> Result<(), ConfigError> {
        match self {
            Self::Constant(p) if !(0.0..=1.0).contains(&p) => Err(ConfigError::InvalidProbability {
                parameter: "failure_probability",
                got: p,
            }),
            _ => Ok(()),
        }
    }

    fn draw<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Constant(p) => p,
            Self::Bimodal => {
                if rng.gen_bool(BIMODAL_LOW_BAND_PROBABILITY) {
                    rng.gen_range(0.0..=BIMODAL_LOW_BAND_MAX)
                } else {
                    rng.gen_range(BIMODAL_HIGH_BAND_MIN..=1.0)
                }
            }
        }
    }
}

/// Which vertices receive the priority bump.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecialVertices {
    /// Pairs whose patient sensitization is at least the threshold.
    HighlySensitised {
        /// Inclusive sensitization threshold.
        min_sensitization: f64,
    },
    /// An explicit set of vertices.
    Explicit(BTreeSet<VertexId>),
}

impl SpecialVertices {
    /// Returns whether `vertex` (identified by `id`) is special.
    #[must_use]
    pub fn contains(&self, id: VertexId, vertex: &Vertex) -> bool {
        match self {
            Self::HighlySensitised { min_sensitization } => vertex
                .as_pair()
                .is_some_and(|pair| pair.sensitization() >= *min_sensitization),
            Self::Explicit(ids) => ids.contains(&id),
        }
    }
}

/// How weights are assigned to compatibility edges.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum WeightPolicy {
    /// Every transplant is worth one.
    #[default]
    Unit,
    /// Transplants into special vertices are worth `1 + bump`.
    Prioritised {
        /// Extra weight for edges into special vertices.
        bump: f64,
        /// Vertices that receive the bump.
        special: SpecialVertices,
    },
}

impl WeightPolicy {
    /// Returns whether selection must use the two-phase objective.
    #[must_use]
    pub const fn is_prioritised(&self) -> bool {
        matches!(self, Self::Prioritised { .. })
    }

    /// Returns the weight `grouping` would carry after [`assign_weights`]
    /// applied this policy to `pool`.
    ///
    /// Only transplant edges count; a target that left the pool is treated as
    /// not special.
    #[must_use]
    pub fn grouping_weight(&self, pool: &Pool, grouping: &Grouping) -> f64 {
        grouping
            .transplant_edges()
            .iter()
            .map(|edge| self.edge_weight(pool, edge.target))
            .sum()
    }

    fn edge_weight(&self, pool: &Pool, target: VertexId) -> f64 {
        match self {
            Self::Unit => 1.0,
            Self::Prioritised { bump, special } => {
                let is_special = pool
                    .vertex(target)
                    .is_ok_and(|vertex| special.contains(target, vertex));
                if is_special { 1.0 + bump } else { 1.0 }
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Prioritised { bump, .. } if !bump.is_finite() || *bump < 0.0 => {
                Err(ConfigError::InvalidBump { got: *bump })
            }
            Self::Prioritised {
                special: SpecialVertices::HighlySensitised { min_sensitization },
                ..
            } if !(0.0..=1.0).contains(min_sensitization) => Err(ConfigError::InvalidProbability {
                parameter: "min_sensitization",
                got: *min_sensitization,
            }),
            _ => Ok(()),
        }
    }
}

/// Draws a failure probability for every compatibility edge in `pool`,
/// replacing whatever an earlier round assigned.
///
/// Edges are visited in source-then-target order, so equal seeds yield
/// equal assignments.
pub fn assign_failure_probabilities<R: Rng + ?Sized>(
    pool: &mut Pool,
    policy: FailurePolicy,
    rng: &mut R,
) {
    let mut assigned = 0_usize;
    for edge in pool.edges_mut() {
        edge.failure_probability = if edge.dummy {
            0.0
        } else {
            assigned += 1;
            policy.draw(rng)
        };
    }
    debug!(?policy, edges = assigned, "assigned failure probabilities");
}

/// Sets the weight of every compatibility edge in `pool`.
pub fn assign_weights(pool: &mut Pool, policy: &WeightPolicy) {
    let targets: BTreeMap<VertexId, f64> = pool
        .pair_ids()
        .map(|id| (id, policy.edge_weight(pool, id)))
        .collect();
    for edge in pool.edges_mut() {
        edge.weight = if edge.dummy {
            0.0
        } else {
            targets.get(&edge.target).copied().unwrap_or(1.0)
        };
    }
    let bumped = targets.values().filter(|weight| **weight > 1.0).count();
    debug!(bumped, prioritised = policy.is_prioritised(), "assigned edge weights");
}
