//! The exchange pool: an owned arena of vertices and compatibility edges.
//!
//! Vertices are keyed by [`VertexId`] and stored in ordered maps so every
//! iteration (and therefore every enumeration and random draw that follows
//! it) is reproducible. Dummy edges from each pair to each altruist are
//! maintained here whenever a vertex is inserted; callers only add
//! compatibility edges.

mod vertex;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::PoolError;

pub use self::vertex::{AltruistVertex, BloodType, Edge, PairVertex, Vertex, VertexId};

/// Directed compatibility graph owning every vertex and edge.
///
/// # Examples
/// ```
/// use kpd_core::{AltruistVertex, BloodType, PairVertex, Pool};
///
/// let mut pool = Pool::new();
/// let first = pool.add_pair(PairVertex::new(BloodType::A, BloodType::B, 0.05)?)?;
/// let second = pool.add_pair(PairVertex::new(BloodType::B, BloodType::A, 0.05)?)?;
/// pool.add_edge(first, second, 1.0)?;
/// pool.add_edge(second, first, 1.0)?;
/// let altruist = pool.add_altruist(AltruistVertex::new(BloodType::O));
///
/// assert_eq!(pool.len(), 3);
/// // Two compatibility edges plus one dummy edge per pair.
/// assert_eq!(pool.edge_count(), 4);
/// assert!(pool.edge(first, altruist)?.is_dummy());
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Pool {
    vertices: BTreeMap<VertexId, Vertex>,
    outgoing: BTreeMap<VertexId, BTreeMap<VertexId, Edge>>,
    incoming: BTreeMap<VertexId, BTreeSet<VertexId>>,
    next_id: u64,
}

impl Pool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns whether the pool holds no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns the number of pair vertices.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.vertices.values().filter(|vertex| vertex.is_pair()).count()
    }

    /// Returns the number of altruist vertices.
    #[must_use]
    pub fn altruist_count(&self) -> usize {
        self.vertices
            .values()
            .filter(|vertex| vertex.is_altruist())
            .count()
    }

    /// Returns the number of edges, dummy edges included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeMap::len).sum()
    }

    /// Returns whether `id` is currently in the pool.
    #[must_use]
    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Looks up a vertex.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] when `id` is not in the pool.
    pub fn vertex(&self, id: VertexId) -> Result<&Vertex, PoolError> {
        self.vertices.get(&id).ok_or(PoolError::UnknownVertex { id })
    }

    /// Iterates over every vertex in ascending identifier order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.vertices.iter().map(|(id, vertex)| (*id, vertex))
    }

    /// Iterates over pair identifiers in ascending order.
    pub fn pair_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices()
            .filter(|(_, vertex)| vertex.is_pair())
            .map(|(id, _)| id)
    }

    /// Iterates over altruist identifiers in ascending order.
    pub fn altruist_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices()
            .filter(|(_, vertex)| vertex.is_altruist())
            .map(|(id, _)| id)
    }

    /// Iterates over every edge, ordered by source then target.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing.values().flat_map(BTreeMap::values)
    }

    pub(crate) fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> + '_ {
        self.outgoing.values_mut().flat_map(BTreeMap::values_mut)
    }

    /// Iterates over the edges leaving `id`, ordered by target.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] when `id` is not in the pool.
    pub fn outgoing(&self, id: VertexId) -> Result<impl Iterator<Item = &Edge> + '_, PoolError> {
        self.outgoing
            .get(&id)
            .map(BTreeMap::values)
            .ok_or(PoolError::UnknownVertex { id })
    }

    /// Looks up the edge `source -> target`.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when no such edge exists.
    pub fn edge(&self, source: VertexId, target: VertexId) -> Result<&Edge, PoolError> {
        self.outgoing
            .get(&source)
            .and_then(|edges| edges.get(&target))
            .ok_or(PoolError::UnknownEdge {
                source_id: source,
                target,
            })
    }

    fn edge_mut(&mut self, source: VertexId, target: VertexId) -> Result<&mut Edge, PoolError> {
        self.outgoing
            .get_mut(&source)
            .and_then(|edges| edges.get_mut(&target))
            .ok_or(PoolError::UnknownEdge {
                source_id: source,
                target,
            })
    }

    /// Returns the weight of `source -> target`.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when no such edge exists.
    pub fn edge_weight(&self, source: VertexId, target: VertexId) -> Result<f64, PoolError> {
        self.edge(source, target).map(Edge::weight)
    }

    /// Overwrites the weight of `source -> target`.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when no such edge exists.
    pub fn set_edge_weight(
        &mut self,
        source: VertexId,
        target: VertexId,
        weight: f64,
    ) -> Result<(), PoolError> {
        self.edge_mut(source, target)?.weight = weight;
        Ok(())
    }

    /// Returns the failure probability of `source -> target`.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when no such edge exists.
    pub fn failure_probability(&self, source: VertexId, target: VertexId) -> Result<f64, PoolError> {
        self.edge(source, target).map(Edge::failure_probability)
    }

    /// Overwrites the failure probability of `source -> target`.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownEdge`] when no such edge exists and
    /// [`PoolError::InvalidFailureProbability`] when `probability` is outside
    /// `[0, 1]`.
    pub fn set_failure_probability(
        &mut self,
        source: VertexId,
        target: VertexId,
        probability: f64,
    ) -> Result<(), PoolError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(PoolError::InvalidFailureProbability {
                source_id: source,
                target,
                got: probability,
            });
        }
        self.edge_mut(source, target)?.failure_probability = probability;
        Ok(())
    }

    /// Inserts a patient-donor pair and wires dummy edges to every altruist.
    ///
    /// # Errors
    /// Returns [`PoolError::SelfCompatiblePair`] when the pair could
    /// transplant directly.
    pub fn add_pair(&mut self, pair: PairVertex) -> Result<VertexId, PoolError> {
        if pair.is_self_compatible() {
            return Err(PoolError::SelfCompatiblePair);
        }
        let id = self.insert_vertex(Vertex::Pair(pair));
        let altruists: Vec<VertexId> = self.altruist_ids().collect();
        for altruist in altruists {
            self.insert_edge(Edge::dummy(id, altruist));
        }
        Ok(id)
    }

    /// Inserts an altruist and wires dummy edges from every pair.
    pub fn add_altruist(&mut self, altruist: AltruistVertex) -> VertexId {
        let id = self.insert_vertex(Vertex::Altruist(altruist));
        let pairs: Vec<VertexId> = self.pair_ids().collect();
        for pair in pairs {
            self.insert_edge(Edge::dummy(pair, id));
        }
        id
    }

    /// Adds a compatibility edge from `source`'s donor to `target`'s patient.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] for a missing endpoint,
    /// [`PoolError::SelfLoop`] when `source == target`,
    /// [`PoolError::EdgeIntoAltruist`] when `target` is an altruist and
    /// [`PoolError::DuplicateEdge`] when the edge already exists.
    pub fn add_edge(
        &mut self,
        source: VertexId,
        target: VertexId,
        weight: f64,
    ) -> Result<(), PoolError> {
        self.vertex(source)?;
        if source == target {
            return Err(PoolError::SelfLoop { id: source });
        }
        if self.vertex(target)?.is_altruist() {
            return Err(PoolError::EdgeIntoAltruist {
                source_id: source,
                target,
            });
        }
        if self.edge(source, target).is_ok() {
            return Err(PoolError::DuplicateEdge {
                source_id: source,
                target,
            });
        }
        self.insert_edge(Edge::compatible(source, target, weight));
        Ok(())
    }

    /// Removes a vertex and every edge touching it.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] when `id` is not in the pool.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<Vertex, PoolError> {
        let vertex = self
            .vertices
            .remove(&id)
            .ok_or(PoolError::UnknownVertex { id })?;
        if let Some(edges) = self.outgoing.remove(&id) {
            for target in edges.keys() {
                if let Some(sources) = self.incoming.get_mut(target) {
                    sources.remove(&id);
                }
            }
        }
        if let Some(sources) = self.incoming.remove(&id) {
            for source in sources {
                if let Some(edges) = self.outgoing.get_mut(&source) {
                    edges.remove(&id);
                }
            }
        }
        Ok(vertex)
    }

    /// Removes a set of vertices as one step.
    ///
    /// Every identifier is validated before anything is removed, so a failing
    /// call leaves the pool untouched.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] for the first identifier that is
    /// not in the pool.
    pub fn remove_vertices(
        &mut self,
        ids: &BTreeSet<VertexId>,
    ) -> Result<Vec<(VertexId, Vertex)>, PoolError> {
        for id in ids {
            self.vertex(*id)?;
        }
        ids.iter()
            .map(|id| self.remove_vertex(*id).map(|vertex| (*id, vertex)))
            .collect()
    }

    /// Turns a pair whose patient has received a kidney into a bridge donor.
    ///
    /// The pair leaves the pool and a fresh altruist with the donor's blood
    /// type takes its place, inheriting the donor's compatibility edges (their
    /// weights and failure probabilities are kept; feasibility is never
    /// re-derived).
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] when `id` is missing and
    /// [`PoolError::NotAPair`] when it is an altruist.
    pub fn convert_to_bridge(&mut self, id: VertexId) -> Result<VertexId, PoolError> {
        let Vertex::Pair(pair) = *self.vertex(id)? else {
            return Err(PoolError::NotAPair { id });
        };
        let inherited: Vec<Edge> = self
            .outgoing(id)?
            .filter(|edge| !edge.is_dummy())
            .copied()
            .collect();
        self.remove_vertex(id)?;
        let bridge = self.add_altruist(AltruistVertex::bridge(pair.donor()));
        for edge in inherited {
            self.insert_edge(Edge {
                source: bridge,
                ..edge
            });
        }
        Ok(bridge)
    }

    /// Extracts the sub-pool induced by `ids`.
    ///
    /// The result keeps the original identifiers and only the edges whose
    /// endpoints are both selected.
    ///
    /// # Errors
    /// Returns [`PoolError::UnknownVertex`] for an identifier that is not in
    /// the pool.
    pub fn sub_pool(&self, ids: &BTreeSet<VertexId>) -> Result<Self, PoolError> {
        let mut sub = Self {
            next_id: self.next_id,
            ..Self::default()
        };
        for id in ids {
            sub.vertices.insert(*id, *self.vertex(*id)?);
            sub.outgoing.insert(*id, BTreeMap::new());
            sub.incoming.insert(*id, BTreeSet::new());
        }
        for edge in self.edges() {
            if ids.contains(&edge.source) && ids.contains(&edge.target) {
                sub.insert_edge(*edge);
            }
        }
        Ok(sub)
    }

    fn insert_vertex(&mut self, vertex: Vertex) -> VertexId {
        let id = VertexId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.vertices.insert(id, vertex);
        self.outgoing.insert(id, BTreeMap::new());
        self.incoming.insert(id, BTreeSet::new());
        id
    }

    fn insert_edge(&mut self, edge: Edge) {
        self.outgoing
            .entry(edge.source)
            .or_default()
            .insert(edge.target, edge);
        self.incoming
            .entry(edge.target)
            .or_default()
            .insert(edge.source);
    }
}
