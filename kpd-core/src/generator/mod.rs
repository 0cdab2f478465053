//! Bounded enumeration of cycles and chains in the pool.
//!
//! Every vertex seeds a depth-first search along its outgoing edges. Pairs
//! seed cycle searches that only visit identifiers at or above the seed, so
//! each cycle is reported once from its smallest vertex. Altruists seed chain
//! searches that finish on the dummy edge back to the same altruist, which
//! yields chains of every length up to the cap rather than only maximal
//! ones. The search is exponential in the caps, which the simulation keeps
//! small (cycles of 2–3, chains of 3–4).

use tracing::{debug, instrument};

use crate::{
    error::PoolError,
    grouping::{EdgeRef, Grouping, GroupingKind},
    pool::{Pool, Vertex, VertexId},
};

/// Enumerates eligible groupings in a borrowed [`Pool`].
///
/// # Examples
/// ```
/// use kpd_core::{AltruistVertex, BloodType, CycleGenerator, PairVertex, Pool};
///
/// let mut pool = Pool::new();
/// let altruist = pool.add_altruist(AltruistVertex::new(BloodType::O));
/// let pair = pool.add_pair(PairVertex::new(BloodType::A, BloodType::B, 0.05)?)?;
/// pool.add_edge(altruist, pair, 1.0)?;
///
/// let chains = CycleGenerator::new(&pool).generate(3, 2, false);
/// assert_eq!(chains.len(), 1);
/// assert_eq!(chains[0].altruist(), Some(altruist));
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CycleGenerator<'p> {
    pool: &'p Pool,
}

impl<'p> CycleGenerator<'p> {
    /// Creates a generator reading from `pool`.
    #[must_use]
    pub const fn new(pool: &'p Pool) -> Self {
        Self { pool }
    }

    /// Enumerates every simple cycle with at most `max_cycle_length` edges and
    /// every chain with at most `max_chain_length` transplants.
    ///
    /// With `allow_empty_chain` each altruist also yields a chain with no
    /// transplants, letting the optimizer leave it unmatched explicitly.
    /// A zero cap disables the corresponding kind entirely.
    #[must_use]
    #[instrument(
        name = "generator.generate",
        level = "debug",
        skip(self),
        fields(vertices = self.pool.len(), edges = self.pool.edge_count()),
    )]
    pub fn generate(
        &self,
        max_cycle_length: usize,
        max_chain_length: usize,
        allow_empty_chain: bool,
    ) -> Vec<Grouping> {
        let mut found = Vec::new();
        for (id, vertex) in self.pool.vertices() {
            match vertex {
                Vertex::Pair(_) => {
                    found.extend(Search::new(self.pool, id, max_cycle_length).cycles(true));
                }
                Vertex::Altruist(_) => {
                    found.extend(
                        Search::new(self.pool, id, max_chain_length).chains(allow_empty_chain),
                    );
                }
            }
        }
        debug!(groupings = found.len(), "enumeration complete");
        found
    }

    /// Enumerates only the groupings that contain `vertex`.
    ///
    /// Cycles are seeded from `vertex` itself; because the start is fixed the
    /// canonical-ordering filter is not needed to report each cycle once.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] when `vertex` is not in the pool.
    #[instrument(name = "generator.generate_containing", level = "debug", skip(self))]
    pub fn generate_containing(
        &self,
        vertex: VertexId,
        max_cycle_length: usize,
        max_chain_length: usize,
        allow_empty_chain: bool,
    ) -> Result<Vec<Grouping>, PoolError> {
        let mut found = Vec::new();
        match self.pool.vertex(vertex)? {
            Vertex::Altruist(_) => {
                found.extend(
                    Search::new(self.pool, vertex, max_chain_length).chains(allow_empty_chain),
                );
            }
            Vertex::Pair(_) => {
                found.extend(Search::new(self.pool, vertex, max_cycle_length).cycles(false));
                for altruist in self.pool.altruist_ids() {
                    found.extend(
                        Search::new(self.pool, altruist, max_chain_length)
                            .chains(false)
                            .into_iter()
                            .filter(|chain| chain.contains(vertex)),
                    );
                }
            }
        }
        Ok(found)
    }
}

/// Depth-first search state for one seed vertex.
struct Search<'p> {
    pool: &'p Pool,
    start: VertexId,
    limit: usize,
    path: Vec<EdgeRef>,
    visited: Vec<VertexId>,
    found: Vec<Grouping>,
}

impl<'p> Search<'p> {
    fn new(pool: &'p Pool, start: VertexId, limit: usize) -> Self {
        Self {
            pool,
            start,
            limit,
            path: Vec::with_capacity(limit),
            visited: vec![start],
            found: Vec::new(),
        }
    }

    fn cycles(mut self, canonical: bool) -> Vec<Grouping> {
        if self.limit >= 2 {
            self.extend_cycle(self.start, 0.0, canonical);
        }
        self.found
    }

    fn chains(mut self, allow_empty_chain: bool) -> Vec<Grouping> {
        if self.limit == 0 {
            return self.found;
        }
        if allow_empty_chain {
            self.found.push(Grouping::new(
                GroupingKind::Chain,
                self.start,
                Vec::new(),
                0.0,
            ));
        }
        self.extend_chain(self.start, 0.0);
        self.found
    }

    fn extend_cycle(&mut self, current: VertexId, weight: f64, canonical: bool) {
        let pool = self.pool;
        let Ok(edges) = pool.outgoing(current) else {
            return;
        };
        for edge in edges {
            let target = edge.target();
            let step = EdgeRef {
                source: current,
                target,
            };
            if target == self.start {
                if self.path.len() < self.limit {
                    self.record(GroupingKind::Cycle, step, weight + edge.weight());
                }
                continue;
            }
            if self.visited.contains(&target) || self.path.len() + 2 > self.limit {
                continue;
            }
            if edge.is_dummy() || (canonical && target < self.start) {
                continue;
            }
            self.descend(step, |search| {
                search.extend_cycle(target, weight + edge.weight(), canonical);
            });
        }
    }

    fn extend_chain(&mut self, current: VertexId, weight: f64) {
        let pool = self.pool;
        let Ok(edges) = pool.outgoing(current) else {
            return;
        };
        for edge in edges {
            let target = edge.target();
            let step = EdgeRef {
                source: current,
                target,
            };
            if edge.is_dummy() {
                // Only the dummy edge home completes the chain; any other
                // altruist is a dead end.
                if target == self.start && !self.path.is_empty() {
                    self.record(GroupingKind::Chain, step, weight + edge.weight());
                }
                continue;
            }
            if self.visited.contains(&target) || self.path.len() >= self.limit {
                continue;
            }
            self.descend(step, |search| {
                search.extend_chain(target, weight + edge.weight());
            });
        }
    }

    fn descend(&mut self, step: EdgeRef, explore: impl FnOnce(&mut Self)) {
        self.path.push(step);
        self.visited.push(step.target);
        explore(self);
        self.visited.pop();
        self.path.pop();
    }

    fn record(&mut self, kind: GroupingKind, closing: EdgeRef, weight: f64) {
        let mut edges = Vec::with_capacity(self.path.len() + 1);
        edges.extend_from_slice(&self.path);
        edges.push(closing);
        self.found
            .push(Grouping::new(kind, self.start, edges, weight));
    }
}


#[cfg(test)]
mod property;
