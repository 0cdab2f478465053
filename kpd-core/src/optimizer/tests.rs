use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::{SeedableRng, rngs::SmallRng};
use rstest::rstest;

use super::*;
use crate::{
    error::{OptimizerError, OptimizerErrorCode},
    generator::CycleGenerator,
    policy::{SpecialVertices, assign_weights},
    pool::{BloodType, PairVertex, VertexId},
    test_utils::{add_altruist, add_pairs, link, random_pool, suite_proptest_config},
};

fn solve(pool: &Pool, groupings: &[Grouping], floor: usize) -> Result<Selection, OptimizerError> {
    let membership = CycleMembership::build(pool, groupings);
    ExhaustiveOptimizer::default()
        .solve(&SelectionRequest::new(groupings, &membership).with_min_transplants(floor))
}

/// Best disjoint weight found by trying every subset.
fn brute_force(groupings: &[Grouping]) -> f64 {
    let count = groupings.len();
    let mut best = 0.0_f64;
    for mask in 0_u32..(1 << count) {
        let mut seen = BTreeSet::new();
        let mut weight = 0.0;
        let mut disjoint = true;
        for (index, grouping) in groupings.iter().enumerate() {
            if mask & (1 << index) == 0 {
                continue;
            }
            weight += grouping.weight();
            disjoint &= grouping.vertices().all(|vertex| seen.insert(vertex));
        }
        if disjoint {
            best = best.max(weight);
        }
    }
    best
}

/// Two disjoint 2-cycles plus a 3-cycle overlapping both.
fn overlapping_cycles() -> (Pool, Vec<VertexId>) {
    let mut pool = Pool::new();
    let pairs = add_pairs(&mut pool, 4);
    link(&mut pool, &[pairs[0], pairs[1], pairs[0]]);
    link(&mut pool, &[pairs[2], pairs[3], pairs[2]]);
    link(&mut pool, &[pairs[1], pairs[2]]);
    link(&mut pool, &[pairs[2], pairs[0]]);
    (pool, pairs)
}

#[test]
fn disjoint_cycles_beat_one_longer_cycle() {
    let (pool, _) = overlapping_cycles();
    let groupings = CycleGenerator::new(&pool).generate(3, 0, false);

    let selection = solve(&pool, &groupings, 0).expect("search fits the budget");

    assert_eq!(selection.transplants(), 4);
    assert_eq!(selection.objective(), 4.0);
    assert!(groupings.iter().any(|grouping| grouping.transplant_count() == 3));
    let membership = CycleMembership::build(&pool, &groupings);
    assert!(membership.is_disjoint(selection.chosen()));
}

#[test]
fn empty_candidates_yield_empty_selection() {
    let pool = Pool::new();

    let selection = solve(&pool, &[], 0).expect("empty problem is feasible");

    assert!(selection.is_empty());
    assert_eq!(selection.objective(), 0.0);
}

#[test]
fn unreachable_floor_is_infeasible() {
    let (pool, _) = overlapping_cycles();
    let groupings = CycleGenerator::new(&pool).generate(3, 0, false);

    let err = solve(&pool, &groupings, 5).expect_err("five transplants are impossible");

    assert_eq!(
        err,
        OptimizerError::Infeasible {
            floor: 5,
            reachable: 4
        }
    );
    assert_eq!(err.code(), OptimizerErrorCode::Infeasible);
}

#[test]
fn floor_can_force_a_lighter_objective() {
    let mut pool = Pool::new();
    let pairs = add_pairs(&mut pool, 3);
    link(&mut pool, &[pairs[0], pairs[1], pairs[2], pairs[0]]);
    link(&mut pool, &[pairs[1], pairs[0]]);
    pool.set_edge_weight(pairs[1], pairs[0], 5.0)
        .expect("edge exists");
    let groupings = CycleGenerator::new(&pool).generate(3, 0, false);

    let heaviest = solve(&pool, &groupings, 0).expect("feasible");
    let widest = solve(&pool, &groupings, 3).expect("feasible");

    // The 2-cycle weighs 6 and the 3-cycle 3; only the latter meets the floor.
    assert_eq!((heaviest.transplants(), heaviest.objective()), (2, 6.0));
    assert_eq!((widest.transplants(), widest.objective()), (3, 3.0));
}

#[rstest]
#[case(1)]
#[case(3)]
fn tiny_budgets_are_exhausted(#[case] budget: u64) {
    let (pool, _) = overlapping_cycles();
    let groupings = CycleGenerator::new(&pool).generate(3, 0, false);
    let membership = CycleMembership::build(&pool, &groupings);
    let optimizer = ExhaustiveOptimizer::new(budget).expect("budget is positive");

    let err = optimizer
        .solve(&SelectionRequest::new(&groupings, &membership))
        .expect_err("budget is too small");

    assert_eq!(err, OptimizerError::SearchBudgetExhausted { budget });
}

#[test]
fn zero_budget_is_rejected() {
    assert!(ExhaustiveOptimizer::new(0).is_err());
}

#[test]
fn two_phase_objective_keeps_the_maximum_cardinality() {
    let mut pool = Pool::new();
    let altruist = add_altruist(&mut pool);
    let pairs = add_pairs(&mut pool, 3);
    let sensitised = pool
        .add_pair(PairVertex::new(BloodType::AB, BloodType::O, 0.95).expect("pair must be valid"))
        .expect("pair must insert");
    // Either the altruist reaches the sensitised patient alone, or it starts
    // a longer chain through the plain pairs.
    link(&mut pool, &[altruist, sensitised]);
    link(&mut pool, &[altruist, pairs[0], pairs[1], pairs[2]]);
    let policy = WeightPolicy::Prioritised {
        bump: 10.0,
        special: SpecialVertices::HighlySensitised {
            min_sensitization: 0.9,
        },
    };
    assign_weights(&mut pool, &policy);
    let groupings = CycleGenerator::new(&pool).generate(3, 3, false);
    let membership = CycleMembership::build(&pool, &groupings);
    let optimizer = ExhaustiveOptimizer::default();

    let unit_only = {
        assign_weights(&mut pool, &WeightPolicy::Unit);
        let unit: Vec<Grouping> = groupings
            .iter()
            .map(|grouping| grouping.reweighed(&pool).expect("edges exist"))
            .collect();
        optimizer
            .solve(&SelectionRequest::new(&unit, &membership))
            .expect("feasible")
    };
    let two_phase = select_lexicographic(&optimizer, &pool, &groupings, &membership, &policy)
        .expect("feasible");
    let greedy = optimizer
        .solve(&SelectionRequest::new(&groupings, &membership))
        .expect("feasible");

    assert_eq!(unit_only.transplants(), 3);
    assert_eq!(two_phase.transplants(), unit_only.transplants());
    assert!(two_phase.objective() >= unit_only.objective());
    // Without the floor the bump wins and the chain shrinks to one transplant.
    assert_eq!(greedy.transplants(), 1);
    assert_eq!(greedy.objective(), 11.0);
}

#[test]
fn lexicographic_prefers_special_patients_among_equal_counts() {
    let mut pool = Pool::new();
    let pairs = add_pairs(&mut pool, 2);
    let sensitised = pool
        .add_pair(PairVertex::new(BloodType::B, BloodType::A, 0.95).expect("pair must be valid"))
        .expect("pair must insert");
    link(&mut pool, &[pairs[0], pairs[1], pairs[0]]);
    link(&mut pool, &[pairs[0], sensitised, pairs[0]]);
    let groupings = CycleGenerator::new(&pool).generate(2, 0, false);
    let membership = CycleMembership::build(&pool, &groupings);
    let policy = WeightPolicy::Prioritised {
        bump: 1.0,
        special: SpecialVertices::HighlySensitised {
            min_sensitization: 0.9,
        },
    };

    let selection = select_lexicographic(
        &ExhaustiveOptimizer::default(),
        &pool,
        &groupings,
        &membership,
        &policy,
    )
    .expect("feasible");

    assert_eq!(selection.transplants(), 2);
    assert_eq!(selection.objective(), 3.0);
    let chosen = &groupings[selection.chosen()[0]];
    assert!(chosen.contains(sensitised));
}

proptest! {
    #![proptest_config(suite_proptest_config(48))]

    #[test]
    fn exhaustive_search_matches_brute_force(
        seed in any::<u64>(),
        pairs in 2_usize..7,
        altruists in 0_usize..2,
    ) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let pool = random_pool(&mut rng, pairs, altruists, 0.35);
        let groupings = CycleGenerator::new(&pool).generate(3, 2, false);
        prop_assume!(groupings.len() <= 14);

        let selection = solve(&pool, &groupings, 0)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        let membership = CycleMembership::build(&pool, &groupings);

        prop_assert!(membership.is_disjoint(selection.chosen()));
        prop_assert!((selection.objective() - brute_force(&groupings)).abs() < 1e-9);
    }
}
