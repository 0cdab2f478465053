//! Cycles and chains discovered by the [`crate::CycleGenerator`].
//!
//! A [`Grouping`] references pool vertices by identifier only. The pool stays
//! the sole owner of vertices and edges; a grouping is an immutable snapshot
//! of a path plus its aggregate weight at generation time.

use std::fmt;

use crate::{
    error::PoolError,
    pool::{Pool, VertexId},
};

/// Whether a grouping closes on itself or hangs off an altruist.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum GroupingKind {
    /// Closed exchange among pairs only.
    Cycle,
    /// Open sequence started by an altruist.
    Chain,
}

impl fmt::Display for GroupingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cycle => "cycle",
            Self::Chain => "chain",
        })
    }
}

/// Identity of an edge in the pool.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EdgeRef {
    /// Donating vertex.
    pub source: VertexId,
    /// Receiving vertex.
    pub target: VertexId,
}

/// An ordered sequence of edges forming a cycle or a chain.
///
/// For a chain the final edge is the dummy edge back to the starting
/// altruist, so the edge list always closes on its first vertex.
///
/// # Examples
/// ```
/// use kpd_core::{BloodType, CycleGenerator, GroupingKind, PairVertex, Pool};
///
/// let mut pool = Pool::new();
/// let first = pool.add_pair(PairVertex::new(BloodType::A, BloodType::B, 0.05)?)?;
/// let second = pool.add_pair(PairVertex::new(BloodType::B, BloodType::A, 0.05)?)?;
/// pool.add_edge(first, second, 1.0)?;
/// pool.add_edge(second, first, 1.0)?;
///
/// let groupings = CycleGenerator::new(&pool).generate(2, 0, false);
/// let cycle = &groupings[0];
/// assert_eq!(cycle.kind(), GroupingKind::Cycle);
/// assert_eq!(cycle.transplant_count(), 2);
/// assert_eq!(cycle.weight(), 2.0);
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Grouping {
    kind: GroupingKind,
    edges: Vec<EdgeRef>,
    anchor: VertexId,
    weight: f64,
}

impl Grouping {
    pub(crate) fn new(kind: GroupingKind, anchor: VertexId, edges: Vec<EdgeRef>, weight: f64) -> Self {
        Self {
            kind,
            edges,
            anchor,
            weight,
        }
    }

    /// Returns whether this is a cycle or a chain.
    #[must_use]
    #[rustfmt::skip]
    pub const fn kind(&self) -> GroupingKind { self.kind }

    /// Returns the edges in path order.
    #[must_use]
    #[rustfmt::skip]
    pub fn edges(&self) -> &[EdgeRef] { &self.edges }

    /// Returns the aggregate weight cached at generation time.
    #[must_use]
    #[rustfmt::skip]
    pub const fn weight(&self) -> f64 { self.weight }

    /// Returns the vertex the path starts from (the altruist for a chain).
    #[must_use]
    #[rustfmt::skip]
    pub const fn anchor(&self) -> VertexId { self.anchor }

    /// Returns whether this is a chain.
    #[must_use]
    pub fn is_chain(&self) -> bool {
        self.kind == GroupingKind::Chain
    }

    /// Returns the altruist that starts the chain, if this is a chain.
    #[must_use]
    pub fn altruist(&self) -> Option<VertexId> {
        self.is_chain().then_some(self.anchor)
    }

    /// Returns the edges that carry a kidney, excluding a chain's dummy edge.
    #[must_use]
    pub fn transplant_edges(&self) -> &[EdgeRef] {
        match self.kind {
            GroupingKind::Cycle => &self.edges,
            GroupingKind::Chain => match self.edges.split_last() {
                Some((_, transplants)) => transplants,
                None => &[],
            },
        }
    }

    /// Returns the number of patients who receive a kidney.
    #[must_use]
    pub fn transplant_count(&self) -> usize {
        self.transplant_edges().len()
    }

    /// Iterates over the vertices in path order, each exactly once.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        let head = self.edges.is_empty().then_some(self.anchor);
        head.into_iter()
            .chain(self.edges.iter().map(|edge| edge.source))
    }

    /// Iterates over the pair vertices (every vertex except a chain's altruist).
    pub fn pairs(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.transplant_edges().iter().map(|edge| edge.target)
    }

    /// Returns whether `id` appears anywhere in the grouping.
    #[must_use]
    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices().any(|vertex| vertex == id)
    }

    /// Returns the probability that every transplant edge goes ahead.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when an edge left the pool.
    pub fn success_probability(&self, pool: &Pool) -> Result<f64, PoolError> {
        self.transplant_edges()
            .iter()
            .try_fold(1.0, |acc, edge| {
                let failure = pool.failure_probability(edge.source, edge.target)?;
                Ok::<f64, PoolError>(acc * (1.0 - failure))
            })
    }

    /// Returns a copy carrying `weight` instead of the cached weight.
    #[must_use]
    pub fn with_weight(&self, weight: f64) -> Self {
        Self {
            weight,
            ..self.clone()
        }
    }

    /// Returns a copy whose weight is recomputed from the pool's current
    /// edge weights.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when an edge left the pool.
    pub fn reweighed(&self, pool: &Pool) -> Result<Self, PoolError> {
        let weight = self.edges.iter().try_fold(0.0, |acc, edge| {
            Ok::<f64, PoolError>(acc + pool.edge_weight(edge.source, edge.target)?)
        })?;
        Ok(self.with_weight(weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{AltruistVertex, BloodType, PairVertex};

    fn pair(pool: &mut Pool) -> VertexId {
        let vertex = PairVertex::new(BloodType::A, BloodType::A, 0.0).expect("valid pair");
        pool.add_pair(vertex).expect("pair must insert")
    }

    fn edge(source: VertexId, target: VertexId) -> EdgeRef {
        EdgeRef { source, target }
    }

    #[test]
    fn chain_excludes_dummy_edge_from_transplants() {
        let mut pool = Pool::new();
        let altruist = pool.add_altruist(AltruistVertex::new(BloodType::O));
        let first = pair(&mut pool);
        let second = pair(&mut pool);
        let chain = Grouping::new(
            GroupingKind::Chain,
            altruist,
            vec![edge(altruist, first), edge(first, second), edge(second, altruist)],
            2.0,
        );

        assert_eq!(chain.transplant_count(), 2);
        assert_eq!(chain.pairs().collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(
            chain.vertices().collect::<Vec<_>>(),
            vec![altruist, first, second]
        );
        assert_eq!(chain.altruist(), Some(altruist));
    }

    #[test]
    fn empty_chain_still_reports_its_altruist() {
        let altruist = VertexId::new(3);
        let chain = Grouping::new(GroupingKind::Chain, altruist, Vec::new(), 0.0);

        assert_eq!(chain.transplant_count(), 0);
        assert_eq!(chain.vertices().collect::<Vec<_>>(), vec![altruist]);
        assert!(chain.contains(altruist));
    }

    #[test]
    fn success_probability_multiplies_survival_of_transplant_edges() {
        let mut pool = Pool::new();
        let first = pair(&mut pool);
        let second = pair(&mut pool);
        pool.add_edge(first, second, 1.0).expect("edge must insert");
        pool.add_edge(second, first, 1.0).expect("edge must insert");
        pool.set_failure_probability(first, second, 0.5)
            .expect("edge exists");
        pool.set_failure_probability(second, first, 0.2)
            .expect("edge exists");
        let cycle = Grouping::new(
            GroupingKind::Cycle,
            first,
            vec![edge(first, second), edge(second, first)],
            2.0,
        );

        let probability = cycle.success_probability(&pool).expect("edges exist");
        assert!((probability - 0.4).abs() < 1e-12);
    }

    #[test]
    fn reweighed_reads_current_pool_weights() {
        let mut pool = Pool::new();
        let first = pair(&mut pool);
        let second = pair(&mut pool);
        pool.add_edge(first, second, 1.0).expect("edge must insert");
        pool.add_edge(second, first, 1.0).expect("edge must insert");
        let cycle = Grouping::new(
            GroupingKind::Cycle,
            first,
            vec![edge(first, second), edge(second, first)],
            2.0,
        );
        pool.set_edge_weight(second, first, 3.5).expect("edge exists");

        let reweighed = cycle.reweighed(&pool).expect("edges exist");
        assert_eq!(reweighed.weight(), 4.5);
        assert_eq!(cycle.weight(), 2.0);
    }
}
