//! Property tests comparing the pruned search with a brute-force oracle.
//!
//! The oracle walks every sequence of distinct vertices up to the cap and
//! keeps those whose consecutive edges exist, so it shares no pruning logic
//! with [`CycleGenerator`].

use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::{SeedableRng, rngs::SmallRng};

use super::*;
use crate::test_utils::{random_pool, suite_proptest_config};

type Route = Vec<VertexId>;

fn compatible(pool: &Pool, source: VertexId, target: VertexId) -> bool {
    pool.edge(source, target).is_ok_and(|edge| !edge.is_dummy())
}

/// Every simple route starting at `start` of 1..=`max_len` hops through
/// pairs, including `start` itself.
fn routes(pool: &Pool, start: VertexId, max_len: usize) -> Vec<Route> {
    let pairs: Vec<VertexId> = pool.pair_ids().collect();
    let mut complete = Vec::new();
    let mut frontier = vec![vec![start]];
    for _ in 0..max_len {
        let mut next = Vec::new();
        for route in &frontier {
            let Some(&tail) = route.last() else {
                continue;
            };
            for &pair in &pairs {
                if !route.contains(&pair) && compatible(pool, tail, pair) {
                    let mut extended = route.clone();
                    extended.push(pair);
                    next.push(extended);
                }
            }
        }
        complete.extend(next.iter().cloned());
        frontier = next;
    }
    complete
}

fn oracle_cycles(pool: &Pool, max_len: usize) -> BTreeSet<Route> {
    let mut cycles = BTreeSet::new();
    for start in pool.pair_ids() {
        for route in routes(pool, start, max_len.saturating_sub(1)) {
            let Some(&tail) = route.last() else {
                continue;
            };
            let smallest = route.iter().min().copied();
            if route.len() >= 2 && smallest == Some(start) && compatible(pool, tail, start) {
                cycles.insert(route);
            }
        }
    }
    cycles
}

fn oracle_chains(pool: &Pool, max_len: usize) -> BTreeSet<Route> {
    pool.altruist_ids()
        .flat_map(|altruist| routes(pool, altruist, max_len))
        .collect()
}

fn found(groupings: &[Grouping], kind: GroupingKind) -> Vec<Route> {
    groupings
        .iter()
        .filter(|grouping| grouping.kind() == kind)
        .map(|grouping| grouping.vertices().collect())
        .collect()
}

fn pool_strategy() -> impl Strategy<Value = Pool> {
    (any::<u64>(), 0_usize..7, 0_usize..3, 0.1_f64..0.7).prop_map(
        |(seed, pairs, altruists, density)| {
            let mut rng = SmallRng::seed_from_u64(seed);
            random_pool(&mut rng, pairs, altruists, density)
        },
    )
}

proptest! {
    #![proptest_config(suite_proptest_config(128))]

    #[test]
    fn cycles_match_the_oracle_exactly_once(pool in pool_strategy(), cap in 0_usize..5) {
        let groupings = CycleGenerator::new(&pool).generate(cap, 0, false);
        let cycles = found(&groupings, GroupingKind::Cycle);
        let unique: BTreeSet<Route> = cycles.iter().cloned().collect();

        prop_assert_eq!(unique.len(), cycles.len(), "duplicate cycle reported");
        prop_assert_eq!(unique, oracle_cycles(&pool, cap));
    }

    #[test]
    fn chains_match_the_oracle(pool in pool_strategy(), cap in 0_usize..5) {
        let groupings = CycleGenerator::new(&pool).generate(0, cap, false);
        let chains = found(&groupings, GroupingKind::Chain);
        let unique: BTreeSet<Route> = chains.iter().cloned().collect();

        prop_assert_eq!(unique.len(), chains.len(), "duplicate chain reported");
        prop_assert_eq!(unique, oracle_chains(&pool, cap));
    }

    #[test]
    fn groupings_are_simple_closed_paths(
        pool in pool_strategy(),
        cycle_cap in 0_usize..5,
        chain_cap in 0_usize..5,
    ) {
        for grouping in CycleGenerator::new(&pool).generate(cycle_cap, chain_cap, false) {
            let edges = grouping.edges();
            let vertices: Vec<VertexId> = grouping.vertices().collect();
            let distinct: BTreeSet<VertexId> = vertices.iter().copied().collect();
            prop_assert_eq!(distinct.len(), vertices.len());
            prop_assert_eq!(edges.first().map(|edge| edge.source), Some(grouping.anchor()));
            prop_assert_eq!(edges.last().map(|edge| edge.target), Some(grouping.anchor()));
            for step in edges.windows(2) {
                prop_assert_eq!(step[0].target, step[1].source);
            }
            for edge in edges {
                prop_assert!(pool.edge(edge.source, edge.target).is_ok());
            }
            let cap = if grouping.is_chain() { chain_cap } else { cycle_cap };
            prop_assert!(grouping.transplant_count() <= cap);
            prop_assert!(grouping.pairs().all(|id| pool.vertex(id).is_ok_and(Vertex::is_pair)));
            let expected: f64 = edges
                .iter()
                .map(|edge| pool.edge_weight(edge.source, edge.target).unwrap_or(f64::NAN))
                .sum();
            prop_assert!((grouping.weight() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn containing_finds_every_grouping_through_a_vertex(pool in pool_strategy()) {
        let generator = CycleGenerator::new(&pool);
        let all = generator.generate(3, 3, false);
        for (id, _) in pool.vertices() {
            let mut expected: Vec<Route> = all
                .iter()
                .filter(|grouping| grouping.contains(id))
                .map(|grouping| {
                    let mut route: Route = grouping.vertices().collect();
                    route.sort();
                    route
                })
                .collect();
            let mut local: Vec<Route> = generator
                .generate_containing(id, 3, 3, false)
                .map_err(|err| TestCaseError::fail(err.to_string()))?
                .iter()
                .map(|grouping| {
                    let mut route: Route = grouping.vertices().collect();
                    route.sort();
                    route
                })
                .collect();
            expected.sort();
            local.sort();
            prop_assert_eq!(local, expected);
        }
    }
}
