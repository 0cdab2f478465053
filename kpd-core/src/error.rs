//! Error types for the kpd core library.
//!
//! Each public error enum carries a stable machine-readable code so callers
//! (the CLI, log pipelines) can branch on failures without matching on
//! display strings.

use std::fmt;

use thiserror::Error;

use crate::{grouping::GroupingKind, pool::VertexId};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident
                    $( { $($pattern:tt)* } )? $( ( $($tuple:tt)* ) )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(
                        Self::$ErrVariant $( { $($pattern)* } )? $( ( $($tuple)* ) )?
                            => $CodeTy::$CodeVariant,
                    )+
                }
            }
        }
    };
}

/// An error produced by [`crate::Pool`] operations.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PoolError {
    /// The referenced vertex is not in the pool.
    #[error("vertex {id} is not in the pool")]
    UnknownVertex {
        /// Identifier that failed to resolve.
        id: VertexId,
    },
    /// The referenced edge is not in the pool.
    #[error("edge {source_id} -> {target} is not in the pool")]
    UnknownEdge {
        /// Tail of the missing edge.
        source_id: VertexId,
        /// Head of the missing edge.
        target: VertexId,
    },
    /// Edges must join two distinct vertices.
    #[error("vertex {id} cannot donate to itself")]
    SelfLoop {
        /// Vertex on both ends of the rejected edge.
        id: VertexId,
    },
    /// At most one edge may exist per ordered vertex pair.
    #[error("edge {source_id} -> {target} already exists")]
    DuplicateEdge {
        /// Tail of the duplicate edge.
        source_id: VertexId,
        /// Head of the duplicate edge.
        target: VertexId,
    },
    /// Only dummy edges may point at an altruist.
    #[error("altruist {target} cannot receive a compatibility edge from {source_id}")]
    EdgeIntoAltruist {
        /// Tail of the rejected edge.
        source_id: VertexId,
        /// Altruist that was targeted.
        target: VertexId,
    },
    /// Self-compatible pairs transplant directly and never join the pool.
    #[error("pair is self-compatible and cannot enter the pool")]
    SelfCompatiblePair,
    /// The operation requires a pair vertex.
    #[error("vertex {id} is not a patient-donor pair")]
    NotAPair {
        /// Identifier of the altruist that was supplied.
        id: VertexId,
    },
    /// Patient sensitization must lie in `[0, 1]`.
    #[error("sensitization must lie in [0, 1] (got {got})")]
    InvalidSensitization {
        /// The rejected sensitization.
        got: f64,
    },
    /// Edge probabilities must lie in `[0, 1]`.
    #[error("failure probability for {source_id} -> {target} must lie in [0, 1] (got {got})")]
    InvalidFailureProbability {
        /// Tail of the edge.
        source_id: VertexId,
        /// Head of the edge.
        target: VertexId,
        /// The rejected probability.
        got: f64,
    },
}

define_error_codes! {
    /// Stable codes describing [`PoolError`] variants.
    enum PoolErrorCode for PoolError {
        /// The referenced vertex is not in the pool.
        UnknownVertex => UnknownVertex { .. } => "POOL_UNKNOWN_VERTEX",
        /// The referenced edge is not in the pool.
        UnknownEdge => UnknownEdge { .. } => "POOL_UNKNOWN_EDGE",
        /// Edges must join two distinct vertices.
        SelfLoop => SelfLoop { .. } => "POOL_SELF_LOOP",
        /// At most one edge may exist per ordered vertex pair.
        DuplicateEdge => DuplicateEdge { .. } => "POOL_DUPLICATE_EDGE",
        /// Only dummy edges may point at an altruist.
        EdgeIntoAltruist => EdgeIntoAltruist { .. } => "POOL_EDGE_INTO_ALTRUIST",
        /// Self-compatible pairs never join the pool.
        SelfCompatiblePair => SelfCompatiblePair => "POOL_SELF_COMPATIBLE_PAIR",
        /// The operation requires a pair vertex.
        NotAPair => NotAPair { .. } => "POOL_NOT_A_PAIR",
        /// Patient sensitization must lie in `[0, 1]`.
        InvalidSensitization => InvalidSensitization { .. } => "POOL_INVALID_SENSITIZATION",
        /// Edge probabilities must lie in `[0, 1]`.
        InvalidFailureProbability => InvalidFailureProbability { .. } => "POOL_INVALID_FAILURE_PROBABILITY",
    }
}

/// Error returned when a [`crate::SimulationConfigBuilder`] holds invalid
/// parameters.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A probability parameter was outside `[0, 1]` or not finite.
    #[error("{parameter} must be a probability in [0, 1] (got {got})")]
    InvalidProbability {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        got: f64,
    },
    /// An arrival rate was negative or not finite.
    #[error("{parameter} must be a finite, non-negative rate (got {got})")]
    InvalidRate {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value.
        got: f64,
    },
    /// The priority bump must be finite and non-negative.
    #[error("priority bump must be finite and non-negative (got {got})")]
    InvalidBump {
        /// The rejected bump.
        got: f64,
    },
    /// A grouping length cap exceeds what enumeration supports.
    #[error("max {kind} length {got} exceeds the supported maximum of {max}")]
    ExcessiveLength {
        /// Whether the cap applies to cycles or chains.
        kind: GroupingKind,
        /// The requested cap.
        got: usize,
        /// Largest accepted cap.
        max: usize,
    },
    /// The optimizer search budget must allow at least one node.
    #[error("optimizer search budget must be at least 1")]
    ZeroSearchBudget,
    /// A frequency table had a negative or non-finite entry, or summed to zero.
    #[error("{table} frequencies must be finite, non-negative and not all zero")]
    InvalidFrequencies {
        /// Name of the offending table.
        table: &'static str,
    },
    /// The generator tables can only produce self-compatible pairs, which
    /// never enter the pool.
    #[error("generator tables admit no pair that is incompatible with its own donor")]
    OnlySelfCompatiblePairs,
}

define_error_codes! {
    /// Stable codes describing [`ConfigError`] variants.
    enum ConfigErrorCode for ConfigError {
        /// A probability parameter was outside `[0, 1]` or not finite.
        InvalidProbability => InvalidProbability { .. } => "CONFIG_INVALID_PROBABILITY",
        /// An arrival rate was negative or not finite.
        InvalidRate => InvalidRate { .. } => "CONFIG_INVALID_RATE",
        /// The priority bump must be finite and non-negative.
        InvalidBump => InvalidBump { .. } => "CONFIG_INVALID_BUMP",
        /// A grouping length cap exceeds what enumeration supports.
        ExcessiveLength => ExcessiveLength { .. } => "CONFIG_EXCESSIVE_LENGTH",
        /// The optimizer search budget must allow at least one node.
        ZeroSearchBudget => ZeroSearchBudget => "CONFIG_ZERO_SEARCH_BUDGET",
        /// A frequency table could not be sampled from.
        InvalidFrequencies => InvalidFrequencies { .. } => "CONFIG_INVALID_FREQUENCIES",
        /// The generator tables can only produce self-compatible pairs.
        OnlySelfCompatiblePairs => OnlySelfCompatiblePairs => "CONFIG_ONLY_SELF_COMPATIBLE_PAIRS",
    }
}

/// Failure reported by an [`crate::Optimizer`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OptimizerError {
    /// No vertex-disjoint selection reaches the requested transplant floor.
    #[error("no selection reaches the transplant floor of {floor} (best reachable {reachable})")]
    Infeasible {
        /// Minimum transplant count that was requested.
        floor: usize,
        /// Largest transplant count any disjoint selection reaches.
        reachable: usize,
    },
    /// The exact search visited more nodes than its budget allows.
    #[error("search budget of {budget} nodes exhausted")]
    SearchBudgetExhausted {
        /// Node budget that was exceeded.
        budget: u64,
    },
}

define_error_codes! {
    /// Stable codes describing [`OptimizerError`] variants.
    enum OptimizerErrorCode for OptimizerError {
        /// No vertex-disjoint selection reaches the requested transplant floor.
        Infeasible => Infeasible { .. } => "OPTIMIZER_INFEASIBLE",
        /// The exact search visited more nodes than its budget allows.
        SearchBudgetExhausted => SearchBudgetExhausted { .. } => "OPTIMIZER_SEARCH_BUDGET_EXHAUSTED",
    }
}

/// Error type produced while constructing or running a [`crate::Simulation`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimulationError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A pool operation failed while mutating or reading the pool.
    #[error("pool operation failed: {0}")]
    Pool(#[from] PoolError),
    /// The optimizer could not produce a selection; the run cannot continue.
    #[error("optimizer failed at tick {tick}: {error}")]
    Optimizer {
        /// Tick during which selection failed.
        tick: u64,
        #[source]
        /// Underlying optimizer failure.
        error: OptimizerError,
    },
    /// Internal state contradicted an invariant the loop relies on.
    #[error("invariant violated: {invariant}")]
    InvariantViolation {
        /// Description of the violated invariant.
        invariant: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`SimulationError`] variants.
    enum SimulationErrorCode for SimulationError {
        /// The configuration failed validation.
        InvalidConfig => Config(..) => "SIM_INVALID_CONFIG",
        /// A pool operation failed.
        PoolFailure => Pool(..) => "SIM_POOL_FAILURE",
        /// The optimizer could not produce a selection.
        OptimizerFailure => Optimizer { .. } => "SIM_OPTIMIZER_FAILURE",
        /// Internal state contradicted an invariant.
        InvariantViolation => InvariantViolation { .. } => "SIM_INVARIANT_VIOLATION",
    }
}

impl SimulationError {
    /// Retrieve the inner [`PoolErrorCode`] when the error originated in the pool.
    #[must_use]
    pub const fn pool_code(&self) -> Option<PoolErrorCode> {
        match self {
            Self::Pool(error) => Some(error.code()),
            _ => None,
        }
    }

    /// Retrieve the inner [`OptimizerErrorCode`] when selection failed.
    #[must_use]
    pub const fn optimizer_code(&self) -> Option<OptimizerErrorCode> {
        match self {
            Self::Optimizer { error, .. } => Some(error.code()),
            _ => None,
        }
    }

    pub(crate) fn invariant(invariant: impl Into<String>) -> Self {
        Self::InvariantViolation {
            invariant: invariant.into(),
        }
    }
}

/// Convenient alias for results returned by the simulation API.
pub type Result<T> = core::result::Result<T, SimulationError>;
