//! Exact branch-and-bound set packing.

use std::time::Instant;

use tracing::{debug, instrument};

use super::{Optimizer, Selection, SelectionRequest};
use crate::{
    error::{ConfigError, OptimizerError},
    grouping::Grouping,
};

/// Node budget used by [`ExhaustiveOptimizer::default`].
pub const DEFAULT_NODE_BUDGET: u64 = 5_000_000;

/// Exact solver enumerating disjoint selections with bound pruning.
///
/// Candidates are explored in descending weight order. A branch is cut when
/// the weight of every remaining candidate cannot beat the incumbent, or when
/// their transplants cannot reach the requested floor.
///
/// # Examples
/// ```
/// use kpd_core::{
///     BloodType, CycleGenerator, CycleMembership, ExhaustiveOptimizer, Optimizer, PairVertex,
///     Pool, SelectionRequest,
/// };
///
/// let mut pool = Pool::new();
/// let first = pool.add_pair(PairVertex::new(BloodType::A, BloodType::B, 0.05)?)?;
/// let second = pool.add_pair(PairVertex::new(BloodType::B, BloodType::A, 0.05)?)?;
/// pool.add_edge(first, second, 1.0)?;
/// pool.add_edge(second, first, 1.0)?;
/// let groupings = CycleGenerator::new(&pool).generate(2, 0, false);
/// let membership = CycleMembership::build(&pool, &groupings);
///
/// let selection = ExhaustiveOptimizer::default()
///     .solve(&SelectionRequest::new(&groupings, &membership))
///     .expect("search fits the budget");
/// assert_eq!(selection.chosen(), &[0]);
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExhaustiveOptimizer {
    node_budget: u64,
}

impl Default for ExhaustiveOptimizer {
    fn default() -> Self {
        Self {
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }
}

impl ExhaustiveOptimizer {
    /// Creates a solver that visits at most `node_budget` search nodes per
    /// solve.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroSearchBudget`] when `node_budget` is zero.
    pub const fn new(node_budget: u64) -> Result<Self, ConfigError> {
        if node_budget == 0 {
            return Err(ConfigError::ZeroSearchBudget);
        }
        Ok(Self { node_budget })
    }

    /// Returns the node budget.
    #[must_use]
    #[rustfmt::skip]
    pub const fn node_budget(&self) -> u64 { self.node_budget }

    fn search(
        &self,
        request: &SelectionRequest<'_>,
        value: fn(&Grouping) -> f64,
        floor: usize,
    ) -> Result<Option<Incumbent>, OptimizerError> {
        let mut search = Search::new(request, value, floor, self.node_budget);
        search.explore(0)?;
        debug!(nodes = search.nodes, "branch and bound finished");
        Ok(search.best)
    }
}

impl Optimizer for ExhaustiveOptimizer {
    #[instrument(
        name = "optimizer.solve",
        level = "debug",
        skip(self, request),
        fields(candidates = request.groupings().len(), floor = request.min_transplants()),
        err,
    )]
    fn solve(&self, request: &SelectionRequest<'_>) -> Result<Selection, OptimizerError> {
        let started = Instant::now();
        let floor = request.min_transplants();
        match self.search(request, Grouping::weight, floor)? {
            Some(best) => Ok(Selection::from_indices(
                request.groupings(),
                best.chosen,
                started.elapsed(),
            )),
            None => {
                let reachable = self
                    .search(request, transplant_value, 0)?
                    .map_or(0, |best| best.transplants);
                Err(OptimizerError::Infeasible { floor, reachable })
            }
        }
    }
}

fn transplant_value(grouping: &Grouping) -> f64 {
    f64::from(u32::try_from(grouping.transplant_count()).unwrap_or(u32::MAX))
}

#[derive(Clone, Debug)]
struct Incumbent {
    chosen: Vec<usize>,
    value: f64,
    transplants: usize,
}

/// A grouping with its objective value cached.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    index: usize,
    value: f64,
    transplants: usize,
}

/// Upper bounds on what the candidates from a position onwards can add.
#[derive(Clone, Copy, Debug, Default)]
struct Bound {
    value: f64,
    transplants: usize,
}

struct Search<'r> {
    groupings: &'r [Grouping],
    request: &'r SelectionRequest<'r>,
    floor: usize,
    budget: u64,
    nodes: u64,
    /// Candidates in exploration order.
    candidates: Vec<Candidate>,
    /// `bounds[p]` covers `candidates[p..]`; the final entry is empty.
    bounds: Vec<Bound>,
    /// Number of chosen groupings sharing a vertex with each grouping.
    blocked: Vec<usize>,
    chosen: Vec<usize>,
    current_value: f64,
    current_transplants: usize,
    best: Option<Incumbent>,
}

impl<'r> Search<'r> {
    fn new(
        request: &'r SelectionRequest<'r>,
        value: fn(&Grouping) -> f64,
        floor: usize,
        budget: u64,
    ) -> Self {
        let groupings = request.groupings();
        let mut candidates: Vec<Candidate> = groupings
            .iter()
            .enumerate()
            .map(|(index, grouping)| Candidate {
                index,
                value: value(grouping),
                transplants: grouping.transplant_count(),
            })
            .collect();
        candidates.sort_by(|left, right| {
            right
                .value
                .total_cmp(&left.value)
                .then(left.index.cmp(&right.index))
        });
        let mut bounds: Vec<Bound> = candidates
            .iter()
            .rev()
            .scan(Bound::default(), |tail, candidate| {
                tail.value += candidate.value.max(0.0);
                tail.transplants += candidate.transplants;
                Some(*tail)
            })
            .collect();
        bounds.reverse();
        bounds.push(Bound::default());
        Self {
            groupings,
            request,
            floor,
            budget,
            nodes: 0,
            candidates,
            bounds,
            blocked: vec![0; groupings.len()],
            chosen: Vec::new(),
            current_value: 0.0,
            current_transplants: 0,
            best: None,
        }
    }

    fn explore(&mut self, start: usize) -> Result<(), OptimizerError> {
        self.nodes += 1;
        if self.nodes > self.budget {
            return Err(OptimizerError::SearchBudgetExhausted {
                budget: self.budget,
            });
        }
        self.consider_current();
        for position in start..self.candidates.len() {
            if self.cannot_improve(position) {
                break;
            }
            let Some(candidate) = self.candidates.get(position).copied() else {
                break;
            };
            if self.blocked.get(candidate.index).is_some_and(|count| *count > 0) {
                continue;
            }
            self.toggle(candidate, true);
            let outcome = self.explore(position + 1);
            self.toggle(candidate, false);
            outcome?;
        }
        Ok(())
    }

    fn cannot_improve(&self, position: usize) -> bool {
        let bound = self.bounds.get(position).copied().unwrap_or_default();
        if self.current_transplants + bound.transplants < self.floor {
            return true;
        }
        self.best
            .as_ref()
            .is_some_and(|best| self.current_value + bound.value <= best.value)
    }

    fn consider_current(&mut self) {
        if self.current_transplants < self.floor {
            return;
        }
        let improves = self
            .best
            .as_ref()
            .is_none_or(|best| self.current_value > best.value);
        if improves {
            self.best = Some(Incumbent {
                chosen: self.chosen.clone(),
                value: self.current_value,
                transplants: self.current_transplants,
            });
        }
    }

    fn toggle(&mut self, candidate: Candidate, include: bool) {
        let groupings = self.groupings;
        if let Some(grouping) = groupings.get(candidate.index) {
            for vertex in grouping.vertices() {
                for other in self.request.membership().groupings_containing(vertex) {
                    if let Some(count) = self.blocked.get_mut(*other) {
                        if include {
                            *count += 1;
                        } else {
                            *count -= 1;
                        }
                    }
                }
            }
        }
        if include {
            self.chosen.push(candidate.index);
            self.current_value += candidate.value;
            self.current_transplants += candidate.transplants;
        } else {
            self.chosen.pop();
            self.current_value -= candidate.value;
            self.current_transplants -= candidate.transplants;
        }
    }
}
