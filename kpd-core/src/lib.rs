//! Kidney paired donation core library.
//!
//! A [`Pool`] of patient-donor pairs and altruists is searched by the
//! [`CycleGenerator`] for exchange cycles and altruist-led chains; an
//! [`Optimizer`] picks a vertex-disjoint subset and the [`Simulation`] loop
//! resolves it against edge failures and donor reneging, tick by tick.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod arrivals;
mod config;
mod error;
mod generator;
mod grouping;
mod membership;
mod optimizer;
mod policy;
mod pool;
mod simulation;
mod trial;

#[cfg(test)]
mod test_utils;

pub use crate::{
    arrivals::{
        Arrivals, BloodTypeGenerator, MAX_SELF_COMPATIBLE_REDRAWS, STANDARD_BLOOD_TYPE_FREQUENCIES,
        STANDARD_SENSITIZATION_LEVELS, SensitizationLevel, VertexGenerator,
    },
    config::{
        MAX_GROUPING_LENGTH, Seeds, SelectionStrategy, SimulationConfig, SimulationConfigBuilder,
    },
    error::{
        ConfigError, ConfigErrorCode, OptimizerError, OptimizerErrorCode, PoolError, PoolErrorCode,
        Result, SimulationError, SimulationErrorCode,
    },
    generator::CycleGenerator,
    grouping::{EdgeRef, Grouping, GroupingKind},
    membership::CycleMembership,
    optimizer::{
        DEFAULT_NODE_BUDGET, ExhaustiveOptimizer, Optimizer, Selection, SelectionRequest,
        select_lexicographic,
    },
    policy::{
        BIMODAL_HIGH_BAND_MIN, BIMODAL_LOW_BAND_MAX, BIMODAL_LOW_BAND_PROBABILITY, FailurePolicy,
        SpecialVertices, WeightPolicy, assign_failure_probabilities, assign_weights,
    },
    pool::{AltruistVertex, BloodType, Edge, PairVertex, Pool, Vertex, VertexId},
    simulation::{Simulation, SimulationSummary, TickReport},
    trial::Trial,
};
