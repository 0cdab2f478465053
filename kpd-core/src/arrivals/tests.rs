use rand::{SeedableRng, rngs::SmallRng};
use rstest::rstest;

use super::*;
use crate::{error::ConfigErrorCode, pool::Edge};

const CERTAIN_CROSSMATCH: [SensitizationLevel; 1] = [SensitizationLevel {
    sensitization: 0.0,
    frequency: 1.0,
}];

fn pair_of(pool: &Pool, id: VertexId) -> PairVertex {
    *pool
        .vertex(id)
        .expect("vertex exists")
        .as_pair()
        .expect("vertex is a pair")
}

#[test]
fn edges_respect_the_abo_rule() {
    let mut generator = BloodTypeGenerator::standard().expect("standard tables are valid");
    let mut pool = Pool::new();
    let mut rng = SmallRng::seed_from_u64(2024);

    let arrivals = generator
        .generate(&mut pool, 40, 4, &mut rng)
        .expect("generation succeeds");

    assert_eq!(arrivals.len(), 44);
    assert_eq!(pool.pair_count(), 40);
    assert_eq!(pool.altruist_count(), 4);
    let compatibility: Vec<&Edge> = pool.edges().filter(|edge| !edge.is_dummy()).collect();
    assert_eq!(compatibility.len(), arrivals.edges);
    for edge in compatibility {
        let donor = pool.vertex(edge.source()).expect("source exists").donor();
        let patient = pair_of(&pool, edge.target()).patient();
        assert!(donor.can_donate_to(patient), "{donor} cannot give to {patient}");
    }
}

#[test]
fn certain_crossmatch_wires_every_abo_compatible_edge() {
    let mut generator = BloodTypeGenerator::new(STANDARD_BLOOD_TYPE_FREQUENCIES, &CERTAIN_CROSSMATCH)
        .expect("tables are valid");
    let mut pool = Pool::new();
    let mut rng = SmallRng::seed_from_u64(99);

    let arrivals = generator
        .generate(&mut pool, 12, 2, &mut rng)
        .expect("generation succeeds");

    for pair in &arrivals.pairs {
        let vertex = pair_of(&pool, *pair);
        assert!(!vertex.donor().can_donate_to(vertex.patient()));
    }
    let mut expected = 0;
    for (source, vertex) in pool.vertices() {
        for target in pool.pair_ids().filter(|target| *target != source) {
            let patient = pair_of(&pool, target).patient();
            let wired = pool.edge(source, target).is_ok();
            assert_eq!(wired, vertex.donor().can_donate_to(patient));
            expected += usize::from(wired);
        }
    }
    assert_eq!(arrivals.edges, expected);
}

#[test]
fn late_altruists_reach_existing_pairs() {
    let mut generator = BloodTypeGenerator::new(STANDARD_BLOOD_TYPE_FREQUENCIES, &CERTAIN_CROSSMATCH)
        .expect("tables are valid");
    let mut pool = Pool::new();
    let mut rng = SmallRng::seed_from_u64(1);
    let earlier = generator
        .generate(&mut pool, 8, 0, &mut rng)
        .expect("generation succeeds");

    let later = generator
        .generate(&mut pool, 0, 1, &mut rng)
        .expect("generation succeeds");

    let altruist = later.altruists[0];
    let donor = pool.vertex(altruist).expect("altruist exists").donor();
    for pair in &earlier.pairs {
        let patient = pair_of(&pool, *pair).patient();
        assert_eq!(pool.edge(altruist, *pair).is_ok(), donor.can_donate_to(patient));
        assert!(pool.edge(*pair, altruist).expect("dummy edge").is_dummy());
    }
}

#[test]
fn self_compatible_draws_are_redrawn() {
    // A and B only, so about half of the raw draws are self-compatible.
    let mut generator = BloodTypeGenerator::new([0.0, 0.5, 0.5, 0.0], &CERTAIN_CROSSMATCH)
        .expect("tables are valid");
    let mut pool = Pool::new();
    let mut rng = SmallRng::seed_from_u64(5);

    let arrivals = generator
        .generate(&mut pool, 30, 0, &mut rng)
        .expect("generation succeeds");

    assert_eq!(arrivals.pairs.len(), 30);
    assert!(arrivals.self_compatible_redraws > 0);
    for pair in &arrivals.pairs {
        let vertex = pair_of(&pool, *pair);
        assert_ne!(vertex.patient(), vertex.donor());
    }
}

#[test]
fn equal_seeds_generate_equal_pools() {
    let run = || {
        let mut generator = BloodTypeGenerator::standard().expect("standard tables are valid");
        let mut pool = Pool::new();
        let mut rng = SmallRng::seed_from_u64(31);
        generator
            .generate(&mut pool, 15, 2, &mut rng)
            .expect("generation succeeds");
        pool.edges().copied().collect::<Vec<_>>()
    };

    assert_eq!(run(), run());
}

#[test]
fn nothing_requested_changes_nothing() {
    let mut generator = BloodTypeGenerator::standard().expect("standard tables are valid");
    let mut pool = Pool::new();
    let mut rng = SmallRng::seed_from_u64(0);

    let arrivals = generator
        .generate(&mut pool, 0, 0, &mut rng)
        .expect("generation succeeds");

    assert!(arrivals.is_empty());
    assert!(pool.is_empty());
}

#[rstest]
#[case([0.0, 0.0, 0.0, 0.0], &STANDARD_SENSITIZATION_LEVELS, ConfigErrorCode::InvalidFrequencies)]
#[case([0.5, -0.1, 0.3, 0.3], &STANDARD_SENSITIZATION_LEVELS, ConfigErrorCode::InvalidFrequencies)]
#[case(STANDARD_BLOOD_TYPE_FREQUENCIES, &[], ConfigErrorCode::InvalidFrequencies)]
#[case(
    STANDARD_BLOOD_TYPE_FREQUENCIES,
    &[SensitizationLevel { sensitization: 1.4, frequency: 1.0 }],
    ConfigErrorCode::InvalidProbability
)]
#[case::single_type_certain_crossmatch(
    [1.0, 0.0, 0.0, 0.0],
    &CERTAIN_CROSSMATCH,
    ConfigErrorCode::OnlySelfCompatiblePairs
)]
#[case::unweighted_sensitised_level(
    [0.0, 0.0, 0.0, 1.0],
    &[
        SensitizationLevel { sensitization: 0.0, frequency: 1.0 },
        SensitizationLevel { sensitization: 0.9, frequency: 0.0 },
    ],
    ConfigErrorCode::OnlySelfCompatiblePairs
)]
fn invalid_tables_are_rejected(
    #[case] blood_types: [f64; 4],
    #[case] levels: &[SensitizationLevel],
    #[case] expected: ConfigErrorCode,
) {
    let err = BloodTypeGenerator::new(blood_types, levels).expect_err("tables are invalid");
    assert_eq!(err.code(), expected);
}

#[rstest]
#[case::abo_mismatch([0.5, 0.5, 0.0, 0.0], &CERTAIN_CROSSMATCH)]
#[case::failing_crossmatch([1.0, 0.0, 0.0, 0.0], &STANDARD_SENSITIZATION_LEVELS)]
fn tables_with_some_incompatible_pair_are_accepted(
    #[case] blood_types: [f64; 4],
    #[case] levels: &[SensitizationLevel],
) {
    let mut generator = BloodTypeGenerator::new(blood_types, levels).expect("tables are valid");
    let mut pool = Pool::new();

    let arrivals = generator
        .generate(&mut pool, 5, 0, &mut SmallRng::seed_from_u64(8))
        .expect("generation succeeds");

    assert_eq!(arrivals.pairs.len(), 5);
    assert_eq!(pool.pair_count(), 5);
}

#[test]
fn hopeless_redraws_give_up_instead_of_spinning() {
    // A positive sensitization passes validation, but it is too small for a
    // crossmatch ever to fail.
    let levels = [SensitizationLevel {
        sensitization: 1e-300,
        frequency: 1.0,
    }];
    let mut generator = BloodTypeGenerator::new([1.0, 0.0, 0.0, 0.0], &levels).expect("tables are valid");
    let mut pool = Pool::new();

    let err = generator
        .generate(&mut pool, 1, 0, &mut SmallRng::seed_from_u64(3))
        .expect_err("every draw is self-compatible");

    assert_eq!(err, PoolError::SelfCompatiblePair);
    assert!(pool.is_empty());
}
