//! Index from each pool vertex to the groupings that contain it.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    grouping::Grouping,
    pool::{Pool, VertexId},
};

/// Maps every vertex to the ascending indices of the groupings containing it.
///
/// Built fresh from a pool snapshot and the groupings enumerated from it;
/// vertices that appear in no grouping still have an (empty) entry.
///
/// # Examples
/// ```
/// use kpd_core::{BloodType, CycleGenerator, CycleMembership, PairVertex, Pool};
///
/// let mut pool = Pool::new();
/// let first = pool.add_pair(PairVertex::new(BloodType::A, BloodType::B, 0.05)?)?;
/// let second = pool.add_pair(PairVertex::new(BloodType::B, BloodType::A, 0.05)?)?;
/// let lonely = pool.add_pair(PairVertex::new(BloodType::AB, BloodType::AB, 0.05)?)?;
/// pool.add_edge(first, second, 1.0)?;
/// pool.add_edge(second, first, 1.0)?;
///
/// let groupings = CycleGenerator::new(&pool).generate(2, 0, false);
/// let membership = CycleMembership::build(&pool, &groupings);
/// assert_eq!(membership.groupings_containing(first), &[0]);
/// assert!(membership.groupings_containing(lonely).is_empty());
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleMembership {
    entries: BTreeMap<VertexId, Vec<usize>>,
}

impl CycleMembership {
    /// Indexes `groupings` against the vertices of `pool`.
    ///
    /// Grouping vertices missing from the pool are indexed as well, so a
    /// stale grouping can still be detected through its membership.
    #[must_use]
    pub fn build(pool: &Pool, groupings: &[Grouping]) -> Self {
        let mut entries: BTreeMap<VertexId, Vec<usize>> =
            pool.vertices().map(|(id, _)| (id, Vec::new())).collect();
        for (index, grouping) in groupings.iter().enumerate() {
            for vertex in grouping.vertices() {
                entries.entry(vertex).or_default().push(index);
            }
        }
        Self { entries }
    }

    /// Returns the indices of the groupings containing `vertex`, ascending.
    ///
    /// Unknown vertices belong to no grouping.
    #[must_use]
    pub fn groupings_containing(&self, vertex: VertexId) -> &[usize] {
        self.entries
            .get(&vertex)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates over `(vertex, grouping indices)` in ascending vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (VertexId, &[usize])> + '_ {
        self.entries
            .iter()
            .map(|(vertex, indices)| (*vertex, indices.as_slice()))
    }

    /// Returns the number of indexed vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no vertex is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether the groupings at `selection` share no vertex.
    ///
    /// Duplicate indices count as overlapping.
    #[must_use]
    pub fn is_disjoint(&self, selection: &[usize]) -> bool {
        let chosen: BTreeSet<usize> = selection.iter().copied().collect();
        if chosen.len() != selection.len() {
            return false;
        }
        self.entries.values().all(|indices| {
            indices
                .iter()
                .filter(|index| chosen.contains(*index))
                .count()
                <= 1
        })
    }
}
