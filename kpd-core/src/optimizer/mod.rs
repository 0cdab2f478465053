//! Selection of a vertex-disjoint subset of groupings.
//!
//! The simulation only depends on the [`Optimizer`] trait. The bundled
//! [`ExhaustiveOptimizer`] solves the weighted set-packing problem exactly
//! by branch and bound, which is practical for the pool sizes a tick leaves
//! behind; a larger deployment would plug an integer-programming solver in
//! behind the same trait.

mod exhaustive;

use std::time::Duration;

use tracing::debug;

use crate::{
    error::OptimizerError,
    grouping::Grouping,
    membership::CycleMembership,
    policy::WeightPolicy,
    pool::Pool,
};

pub use self::exhaustive::{DEFAULT_NODE_BUDGET, ExhaustiveOptimizer};

/// Input handed to an [`Optimizer`].
#[derive(Clone, Copy, Debug)]
pub struct SelectionRequest<'a> {
    groupings: &'a [Grouping],
    membership: &'a CycleMembership,
    min_transplants: usize,
}

impl<'a> SelectionRequest<'a> {
    /// Creates an unconstrained request over `groupings`.
    ///
    /// `membership` must have been built from the same groupings.
    #[must_use]
    pub const fn new(groupings: &'a [Grouping], membership: &'a CycleMembership) -> Self {
        Self {
            groupings,
            membership,
            min_transplants: 0,
        }
    }

    /// Requires the selection to cover at least `floor` transplants.
    #[must_use]
    pub const fn with_min_transplants(mut self, floor: usize) -> Self {
        self.min_transplants = floor;
        self
    }

    /// Returns the candidate groupings.
    #[must_use]
    #[rustfmt::skip]
    pub const fn groupings(&self) -> &'a [Grouping] { self.groupings }

    /// Returns the vertex index over the candidates.
    #[must_use]
    #[rustfmt::skip]
    pub const fn membership(&self) -> &'a CycleMembership { self.membership }

    /// Returns the minimum number of transplants a selection must cover.
    #[must_use]
    #[rustfmt::skip]
    pub const fn min_transplants(&self) -> usize { self.min_transplants }
}

/// Outcome of a successful solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    chosen: Vec<usize>,
    objective: f64,
    transplants: usize,
    elapsed: Duration,
}

impl Selection {
    /// Assembles a selection from ascending grouping indices.
    ///
    /// Objective and transplant count are recomputed from `groupings`.
    #[must_use]
    pub fn from_indices(groupings: &[Grouping], mut chosen: Vec<usize>, elapsed: Duration) -> Self {
        chosen.sort_unstable();
        chosen.dedup();
        let picked = || chosen.iter().filter_map(|index| groupings.get(*index));
        let objective = picked().map(Grouping::weight).sum();
        let transplants = picked().map(Grouping::transplant_count).sum();
        Self {
            chosen,
            objective,
            transplants,
            elapsed,
        }
    }

    /// Returns the indices of the chosen groupings in ascending order.
    #[must_use]
    #[rustfmt::skip]
    pub fn chosen(&self) -> &[usize] { &self.chosen }

    /// Returns the summed weight of the chosen groupings.
    #[must_use]
    #[rustfmt::skip]
    pub const fn objective(&self) -> f64 { self.objective }

    /// Returns the number of transplants the selection would perform.
    #[must_use]
    #[rustfmt::skip]
    pub const fn transplants(&self) -> usize { self.transplants }

    /// Returns the wall-clock time spent solving.
    #[must_use]
    #[rustfmt::skip]
    pub const fn elapsed(&self) -> Duration { self.elapsed }

    /// Returns whether nothing was chosen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// Chooses a vertex-disjoint subset of groupings maximising total weight.
pub trait Optimizer {
    /// Solves `request`.
    ///
    /// # Errors
    /// Returns [`OptimizerError::Infeasible`] when no disjoint selection
    /// covers the requested floor and
    /// [`OptimizerError::SearchBudgetExhausted`] when the solver gives up.
    /// An empty selection is a valid answer, never an error.
    fn solve(&self, request: &SelectionRequest<'_>) -> Result<Selection, OptimizerError>;
}

impl<O: Optimizer + ?Sized> Optimizer for &O {
    fn solve(&self, request: &SelectionRequest<'_>) -> Result<Selection, OptimizerError> {
        (**self).solve(request)
    }
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn solve(&self, request: &SelectionRequest<'_>) -> Result<Selection, OptimizerError> {
        (**self).solve(request)
    }
}

/// Solves for the maximum number of transplants first, then maximises
/// `policy` weights among the selections that keep that count.
///
/// Both phases weigh the groupings from `pool` directly, so the caller's
/// cached grouping weights do not matter. The returned selection reports the
/// second-phase objective.
///
/// # Errors
/// Propagates any [`OptimizerError`] from either phase.
///
/// # Examples
/// ```
/// use kpd_core::{
///     BloodType, CycleGenerator, CycleMembership, ExhaustiveOptimizer, PairVertex, Pool,
///     SpecialVertices, WeightPolicy, select_lexicographic,
/// };
///
/// let mut pool = Pool::new();
/// let first = pool.add_pair(PairVertex::new(BloodType::A, BloodType::B, 0.05)?)?;
/// let second = pool.add_pair(PairVertex::new(BloodType::B, BloodType::A, 0.9)?)?;
/// pool.add_edge(first, second, 1.0)?;
/// pool.add_edge(second, first, 1.0)?;
/// let groupings = CycleGenerator::new(&pool).generate(2, 0, false);
/// let membership = CycleMembership::build(&pool, &groupings);
/// let policy = WeightPolicy::Prioritised {
///     bump: 1.0,
///     special: SpecialVertices::HighlySensitised { min_sensitization: 0.8 },
/// };
///
/// let selection = select_lexicographic(
///     &ExhaustiveOptimizer::default(),
///     &pool,
///     &groupings,
///     &membership,
///     &policy,
/// )
/// .expect("a two-cycle is always selectable");
/// assert_eq!(selection.transplants(), 2);
/// assert_eq!(selection.objective(), 3.0);
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
pub fn select_lexicographic<O: Optimizer + ?Sized>(
    optimizer: &O,
    pool: &Pool,
    groupings: &[Grouping],
    membership: &CycleMembership,
    policy: &WeightPolicy,
) -> Result<Selection, OptimizerError> {
    let weighed = |policy: &WeightPolicy| -> Vec<Grouping> {
        groupings
            .iter()
            .map(|grouping| grouping.with_weight(policy.grouping_weight(pool, grouping)))
            .collect()
    };

    let unit = weighed(&WeightPolicy::Unit);
    let cardinality = optimizer.solve(&SelectionRequest::new(&unit, membership))?;
    let prioritised = weighed(policy);
    let selection = optimizer.solve(
        &SelectionRequest::new(&prioritised, membership)
            .with_min_transplants(cardinality.transplants()),
    )?;
    debug!(
        floor = cardinality.transplants(),
        unit_objective = cardinality.objective(),
        objective = selection.objective(),
        "two-phase selection complete"
    );
    Ok(selection)
}

#[cfg(test)]
mod tests;
