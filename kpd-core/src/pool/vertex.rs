//! Vertex and edge value types stored by the [`super::Pool`].

use std::fmt;

use crate::error::PoolError;

/// Stable identifier assigned by the pool when a vertex is inserted.
///
/// Identifiers increase monotonically and are never reused, so a stored
/// grouping cannot alias a vertex that arrived after it was generated.
///
/// # Examples
/// ```
/// use kpd_core::VertexId;
///
/// let id = VertexId::new(7);
/// assert_eq!(id.get(), 7);
/// assert_eq!(id.to_string(), "7");
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VertexId(u64);

impl VertexId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ABO compatibility class of a patient or donor.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum BloodType {
    /// Universal donor.
    O,
    /// Type A.
    A,
    /// Type B.
    B,
    /// Universal recipient.
    AB,
}

impl BloodType {
    /// Every blood type in declaration order.
    pub const ALL: [Self; 4] = [Self::O, Self::A, Self::B, Self::AB];

    /// Returns whether a donor of this type may give to `recipient`.
    ///
    /// # Examples
    /// ```
    /// use kpd_core::BloodType;
    ///
    /// assert!(BloodType::O.can_donate_to(BloodType::AB));
    /// assert!(BloodType::A.can_donate_to(BloodType::AB));
    /// assert!(!BloodType::A.can_donate_to(BloodType::B));
    /// assert!(!BloodType::AB.can_donate_to(BloodType::O));
    /// ```
    #[must_use]
    pub const fn can_donate_to(self, recipient: Self) -> bool {
        matches!(
            (self, recipient),
            (Self::O, _) | (Self::A, Self::A | Self::AB) | (Self::B, Self::B | Self::AB) | (Self::AB, Self::AB)
        )
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::O => "O",
            Self::A => "A",
            Self::B => "B",
            Self::AB => "AB",
        })
    }
}

/// A patient who arrived together with an incompatible willing donor.
///
/// # Examples
/// ```
/// use kpd_core::{BloodType, PairVertex};
///
/// let pair = PairVertex::new(BloodType::A, BloodType::B, 0.45)?;
/// assert_eq!(pair.patient(), BloodType::A);
/// assert!(!pair.is_self_compatible());
/// # Ok::<(), kpd_core::PoolError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairVertex {
    patient: BloodType,
    donor: BloodType,
    sensitization: f64,
    self_compatible: bool,
}

impl PairVertex {
    /// Creates an incompatible pair.
    ///
    /// # Errors
    /// Returns [`PoolError::InvalidSensitization`] when `sensitization` is not a
    /// finite value in `[0, 1]`.
    pub fn new(patient: BloodType, donor: BloodType, sensitization: f64) -> Result<Self, PoolError> {
        if !(0.0..=1.0).contains(&sensitization) {
            return Err(PoolError::InvalidSensitization { got: sensitization });
        }
        Ok(Self {
            patient,
            donor,
            sensitization,
            self_compatible: false,
        })
    }

    /// Marks whether the donor could transplant directly into the patient.
    #[must_use]
    pub const fn with_self_compatible(mut self, self_compatible: bool) -> Self {
        self.self_compatible = self_compatible;
        self
    }

    /// Returns the patient's blood type.
    #[must_use]
    #[rustfmt::skip]
    pub const fn patient(&self) -> BloodType { self.patient }

    /// Returns the attached donor's blood type.
    #[must_use]
    #[rustfmt::skip]
    pub const fn donor(&self) -> BloodType { self.donor }

    /// Returns the patient's sensitization (cPRA) in `[0, 1]`.
    #[must_use]
    #[rustfmt::skip]
    pub const fn sensitization(&self) -> f64 { self.sensitization }

    /// Returns whether the pair is self-compatible.
    #[must_use]
    #[rustfmt::skip]
    pub const fn is_self_compatible(&self) -> bool { self.self_compatible }
}

/// A donor with no attached patient; the origin of every chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AltruistVertex {
    donor: BloodType,
    bridge: bool,
}

impl AltruistVertex {
    /// Creates a non-directed donor arriving from outside the pool.
    #[must_use]
    pub const fn new(donor: BloodType) -> Self {
        Self {
            donor,
            bridge: false,
        }
    }

    /// Creates a bridge donor left over from a partially executed chain.
    #[must_use]
    pub const fn bridge(donor: BloodType) -> Self {
        Self { donor, bridge: true }
    }

    /// Returns the donor's blood type.
    #[must_use]
    #[rustfmt::skip]
    pub const fn donor(&self) -> BloodType { self.donor }

    /// Returns whether the donor was converted from a pair.
    #[must_use]
    #[rustfmt::skip]
    pub const fn is_bridge(&self) -> bool { self.bridge }
}

/// A vertex in the pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Vertex {
    /// A patient-donor pair.
    Pair(PairVertex),
    /// An unattached donor.
    Altruist(AltruistVertex),
}

impl Vertex {
    /// Returns whether the vertex is a patient-donor pair.
    #[must_use]
    pub const fn is_pair(&self) -> bool {
        matches!(self, Self::Pair(_))
    }

    /// Returns whether the vertex is an unattached donor.
    #[must_use]
    pub const fn is_altruist(&self) -> bool {
        matches!(self, Self::Altruist(_))
    }

    /// Returns the blood type of whoever donates from this vertex.
    #[must_use]
    pub const fn donor(&self) -> BloodType {
        match self {
            Self::Pair(pair) => pair.donor(),
            Self::Altruist(altruist) => altruist.donor(),
        }
    }

    /// Returns the pair payload, if any.
    #[must_use]
    pub const fn as_pair(&self) -> Option<&PairVertex> {
        match self {
            Self::Pair(pair) => Some(pair),
            Self::Altruist(_) => None,
        }
    }
}

/// A directed donation opportunity from `source`'s donor to `target`'s patient.
///
/// Dummy edges point from a pair back to an altruist and mark the point where
/// a chain may stop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub(crate) source: VertexId,
    pub(crate) target: VertexId,
    pub(crate) weight: f64,
    pub(crate) failure_probability: f64,
    pub(crate) dummy: bool,
}

impl Edge {
    pub(crate) const fn compatible(source: VertexId, target: VertexId, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
            failure_probability: 0.0,
            dummy: false,
        }
    }

    pub(crate) const fn dummy(source: VertexId, target: VertexId) -> Self {
        Self {
            source,
            target,
            weight: 0.0,
            failure_probability: 0.0,
            dummy: true,
        }
    }

    /// Returns the donating vertex.
    #[must_use]
    #[rustfmt::skip]
    pub const fn source(&self) -> VertexId { self.source }

    /// Returns the receiving vertex.
    #[must_use]
    #[rustfmt::skip]
    pub const fn target(&self) -> VertexId { self.target }

    /// Returns the edge weight.
    #[must_use]
    #[rustfmt::skip]
    pub const fn weight(&self) -> f64 { self.weight }

    /// Returns the probability that the transplant falls through.
    #[must_use]
    #[rustfmt::skip]
    pub const fn failure_probability(&self) -> f64 { self.failure_probability }

    /// Returns whether this is a chain-terminating dummy edge.
    #[must_use]
    #[rustfmt::skip]
    pub const fn is_dummy(&self) -> bool { self.dummy }
}
