//! Bernoulli trials drawn during resolution and departures.

use rand::Rng;

/// Source of independent yes/no outcomes.
///
/// Every random generator is a trial source; tests substitute scripted
/// outcomes to drive resolution down a specific path.
pub trait Trial {
    /// Returns `true` with the given probability, clamped to `[0, 1]`.
    fn trial(&mut self, probability: f64) -> bool;
}

impl<R: Rng + ?Sized> Trial for R {
    fn trial(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.gen_bool(probability.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::SmallRng};
    use rstest::rstest;

    use super::Trial;

    #[rstest]
    #[case(0.0, false)]
    #[case(-3.0, false)]
    #[case(f64::NAN, false)]
    #[case(1.0, true)]
    #[case(7.5, true)]
    fn degenerate_probabilities_are_certain(#[case] probability: f64, #[case] expected: bool) {
        let mut rng = SmallRng::seed_from_u64(11);
        assert!((0..32).all(|_| rng.trial(probability) == expected));
    }
}
