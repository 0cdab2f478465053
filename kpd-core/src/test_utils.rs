//! Shared test utilities for `kpd-core`.

use std::collections::VecDeque;

use kpd_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;
use rand::{Rng, rngs::SmallRng};

use crate::{
    pool::{AltruistVertex, BloodType, PairVertex, Pool, VertexId},
    trial::Trial,
};

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `PROGTEST_CASES` and
/// `KPD_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Inserts an unsensitized A/A pair.
pub(crate) fn add_pair(pool: &mut Pool) -> VertexId {
    let pair = PairVertex::new(BloodType::A, BloodType::A, 0.0).expect("pair must be valid");
    pool.add_pair(pair).expect("pair must insert")
}

/// Inserts `count` unsensitized pairs.
pub(crate) fn add_pairs(pool: &mut Pool, count: usize) -> Vec<VertexId> {
    (0..count).map(|_| add_pair(pool)).collect()
}

/// Inserts an O altruist.
pub(crate) fn add_altruist(pool: &mut Pool) -> VertexId {
    pool.add_altruist(AltruistVertex::new(BloodType::O))
}

/// Adds unit-weight edges along `path`.
pub(crate) fn link(pool: &mut Pool, path: &[VertexId]) {
    for step in path.windows(2) {
        if let [source, target] = step {
            pool.add_edge(*source, *target, 1.0)
                .expect("edge must insert");
        }
    }
}

/// Builds a random pool with `pairs` pairs and `altruists` altruists where
/// each admissible directed edge exists with probability `density`.
pub(crate) fn random_pool(
    rng: &mut SmallRng,
    pairs: usize,
    altruists: usize,
    density: f64,
) -> Pool {
    let mut pool = Pool::new();
    let mut ids = Vec::with_capacity(pairs + altruists);
    // Interleave kinds so identifiers of pairs and altruists mix.
    let mut remaining_pairs = pairs;
    let mut remaining_altruists = altruists;
    while remaining_pairs + remaining_altruists > 0 {
        let pick_pair = remaining_altruists == 0
            || (remaining_pairs > 0 && rng.gen_range(0..remaining_pairs + remaining_altruists) < remaining_pairs);
        if pick_pair {
            ids.push(add_pair(&mut pool));
            remaining_pairs -= 1;
        } else {
            ids.push(add_altruist(&mut pool));
            remaining_altruists -= 1;
        }
    }
    for &source in &ids {
        for &target in &ids {
            let target_is_pair = pool.vertex(target).is_ok_and(|vertex| vertex.is_pair());
            if source != target && target_is_pair && rng.gen_bool(density) {
                let weight = f64::from(rng.gen_range(1_u8..=3));
                pool.add_edge(source, target, weight)
                    .expect("edge must insert");
            }
        }
    }
    pool
}

/// Replays a fixed sequence of trial outcomes, then reports `false`.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScriptedTrials {
    outcomes: VecDeque<bool>,
    consumed: usize,
}

impl ScriptedTrials {
    pub(crate) fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            consumed: 0,
        }
    }

    /// Number of trials drawn so far.
    pub(crate) fn consumed(&self) -> usize {
        self.consumed
    }
}

impl Trial for ScriptedTrials {
    fn trial(&mut self, _probability: f64) -> bool {
        self.consumed += 1;
        self.outcomes.pop_front().unwrap_or(false)
    }
}
