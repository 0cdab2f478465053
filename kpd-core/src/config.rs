//! Validated simulation parameters.
//!
//! [`SimulationConfigBuilder`] collects parameters with `with_*` setters and
//! checks them once in [`SimulationConfigBuilder::build`]; the resulting
//! [`SimulationConfig`] is immutable and handed to [`crate::Simulation::new`].

use std::time::Duration;

use crate::{
    error::ConfigError,
    grouping::GroupingKind,
    policy::{FailurePolicy, WeightPolicy},
};

/// Longest cycle or chain the enumeration accepts.
pub const MAX_GROUPING_LENGTH: usize = 8;

/// How pending groupings are chosen after enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Solve once per tick over every grouping in the pool.
    #[default]
    Batch,
    /// Solve once per arriving vertex over the groupings containing it.
    PerArrival,
}

/// Seeds for each independent random stream.
///
/// Separate streams keep, for example, the departure draws identical when
/// only the failure policy changes between two runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seeds {
    /// Number of pairs arriving each tick.
    pub pair_arrivals: u64,
    /// Number of altruists arriving each tick.
    pub altruist_arrivals: u64,
    /// Pair and altruist departures.
    pub departures: u64,
    /// Edge failure trials during resolution.
    pub failures: u64,
    /// Bridge-donor reneging trials.
    pub reneging: u64,
    /// Vertex attributes and compatibility edges.
    pub generation: u64,
    /// Failure probabilities drawn by the failure policy.
    pub policy: u64,
}

impl Seeds {
    /// Derives every stream from one base seed.
    ///
    /// # Examples
    /// ```
    /// use kpd_core::Seeds;
    ///
    /// let seeds = Seeds::from_base(42);
    /// assert_eq!(seeds, Seeds::from_base(42));
    /// assert_ne!(seeds.departures, seeds.failures);
    /// ```
    #[must_use]
    pub const fn from_base(base: u64) -> Self {
        Self {
            pair_arrivals: mix(base, 1),
            altruist_arrivals: mix(base, 2),
            departures: mix(base, 3),
            failures: mix(base, 4),
            reneging: mix(base, 5),
            generation: mix(base, 6),
            policy: mix(base, 7),
        }
    }
}

impl Default for Seeds {
    fn default() -> Self {
        Self::from_base(0)
    }
}

/// SplitMix64 finaliser over `base` offset by `stream`.
const fn mix(base: u64, stream: u64) -> u64 {
    let mut z = base.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Immutable parameters of one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub(crate) iterations: u64,
    pub(crate) time_limit: Option<Duration>,
    pub(crate) pair_arrival_rate: f64,
    pub(crate) altruist_arrival_rate: f64,
    pub(crate) pair_departure_probability: f64,
    pub(crate) altruist_departure_probability: f64,
    pub(crate) renege_probability: f64,
    pub(crate) max_cycle_length: usize,
    pub(crate) max_chain_length: usize,
    pub(crate) allow_empty_chain: bool,
    pub(crate) failure_policy: FailurePolicy,
    pub(crate) weight_policy: WeightPolicy,
    pub(crate) strategy: SelectionStrategy,
    pub(crate) seeds: Seeds,
}

impl SimulationConfig {
    /// Returns the number of ticks to run.
    #[must_use]
    #[rustfmt::skip]
    pub const fn iterations(&self) -> u64 { self.iterations }

    /// Returns the wall-clock limit checked between ticks.
    #[must_use]
    #[rustfmt::skip]
    pub const fn time_limit(&self) -> Option<Duration> { self.time_limit }

    /// Returns the mean number of pairs arriving per tick.
    #[must_use]
    #[rustfmt::skip]
    pub const fn pair_arrival_rate(&self) -> f64 { self.pair_arrival_rate }

    /// Returns the mean number of altruists arriving per tick.
    #[must_use]
    #[rustfmt::skip]
    pub const fn altruist_arrival_rate(&self) -> f64 { self.altruist_arrival_rate }

    /// Returns the per-tick probability that a pair leaves the pool.
    #[must_use]
    #[rustfmt::skip]
    pub const fn pair_departure_probability(&self) -> f64 { self.pair_departure_probability }

    /// Returns the per-tick probability that an altruist leaves the pool.
    #[must_use]
    #[rustfmt::skip]
    pub const fn altruist_departure_probability(&self) -> f64 { self.altruist_departure_probability }

    /// Returns the probability that a bridge donor reneges.
    #[must_use]
    #[rustfmt::skip]
    pub const fn renege_probability(&self) -> f64 { self.renege_probability }

    /// Returns the maximum number of transplants in a cycle.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_cycle_length(&self) -> usize { self.max_cycle_length }

    /// Returns the maximum number of transplants in a chain.
    #[must_use]
    #[rustfmt::skip]
    pub const fn max_chain_length(&self) -> usize { self.max_chain_length }

    /// Returns whether altruist-only chains are offered to the optimizer.
    #[must_use]
    #[rustfmt::skip]
    pub const fn allow_empty_chain(&self) -> bool { self.allow_empty_chain }

    /// Returns the failure policy.
    #[must_use]
    #[rustfmt::skip]
    pub const fn failure_policy(&self) -> FailurePolicy { self.failure_policy }

    /// Returns the weight policy.
    #[must_use]
    #[rustfmt::skip]
    pub const fn weight_policy(&self) -> &WeightPolicy { &self.weight_policy }

    /// Returns the selection strategy.
    #[must_use]
    #[rustfmt::skip]
    pub const fn strategy(&self) -> SelectionStrategy { self.strategy }

    /// Returns the random stream seeds.
    #[must_use]
    #[rustfmt::skip]
    pub const fn seeds(&self) -> Seeds { self.seeds }
}

/// Configures and validates a [`SimulationConfig`].
///
/// # Examples
/// ```
/// use kpd_core::{FailurePolicy, SimulationConfigBuilder};
///
/// let config = SimulationConfigBuilder::new()
///     .with_iterations(25)
///     .with_pair_arrival_rate(4.0)
///     .with_failure_policy(FailurePolicy::Constant(0.1))
///     .build()
///     .expect("configuration is valid");
/// assert_eq!(config.iterations(), 25);
/// assert_eq!(config.max_cycle_length(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct SimulationConfigBuilder {
    config: SimulationConfig,
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self {
            config: SimulationConfig {
                iterations: 100,
                time_limit: None,
                pair_arrival_rate: 3.0,
                altruist_arrival_rate: 0.2,
                pair_departure_probability: 0.01,
                altruist_departure_probability: 0.02,
                renege_probability: 0.0,
                max_cycle_length: 3,
                max_chain_length: 4,
                allow_empty_chain: false,
                failure_policy: FailurePolicy::None,
                weight_policy: WeightPolicy::Unit,
                strategy: SelectionStrategy::Batch,
                seeds: Seeds::default(),
            },
        }
    }
}

impl SimulationConfigBuilder {
    /// Creates a builder populated with default parameters.
    ///
    /// # Examples
    /// ```
    /// use kpd_core::{SelectionStrategy, SimulationConfigBuilder};
    ///
    /// let config = SimulationConfigBuilder::new().build().expect("defaults are valid");
    /// assert_eq!(config.iterations(), 100);
    /// assert_eq!(config.strategy(), SelectionStrategy::Batch);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of ticks.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u64) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Stops the run at the first tick boundary after `limit` has elapsed.
    #[must_use]
    pub const fn with_time_limit(mut self, limit: Duration) -> Self {
        self.config.time_limit = Some(limit);
        self
    }

    /// Sets the mean number of pairs arriving per tick.
    #[must_use]
    pub const fn with_pair_arrival_rate(mut self, rate: f64) -> Self {
        self.config.pair_arrival_rate = rate;
        self
    }

    /// Sets the mean number of altruists arriving per tick.
    #[must_use]
    pub const fn with_altruist_arrival_rate(mut self, rate: f64) -> Self {
        self.config.altruist_arrival_rate = rate;
        self
    }

    /// Sets the per-tick pair departure probability.
    #[must_use]
    pub const fn with_pair_departure_probability(mut self, probability: f64) -> Self {
        self.config.pair_departure_probability = probability;
        self
    }

    /// Sets the per-tick altruist departure probability.
    #[must_use]
    pub const fn with_altruist_departure_probability(mut self, probability: f64) -> Self {
        self.config.altruist_departure_probability = probability;
        self
    }

    /// Sets the probability that a bridge donor reneges.
    #[must_use]
    pub const fn with_renege_probability(mut self, probability: f64) -> Self {
        self.config.renege_probability = probability;
        self
    }

    /// Sets the maximum cycle length; zero disables cycles.
    #[must_use]
    pub const fn with_max_cycle_length(mut self, length: usize) -> Self {
        self.config.max_cycle_length = length;
        self
    }

    /// Sets the maximum chain length; zero disables chains.
    #[must_use]
    pub const fn with_max_chain_length(mut self, length: usize) -> Self {
        self.config.max_chain_length = length;
        self
    }

    /// Offers altruist-only chains to the optimizer.
    #[must_use]
    pub const fn with_allow_empty_chain(mut self, allow: bool) -> Self {
        self.config.allow_empty_chain = allow;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Sets the weight policy.
    #[must_use]
    pub fn with_weight_policy(mut self, policy: WeightPolicy) -> Self {
        self.config.weight_policy = policy;
        self
    }

    /// Sets the selection strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Sets every random stream seed.
    #[must_use]
    pub const fn with_seeds(mut self, seeds: Seeds) -> Self {
        self.config.seeds = seeds;
        self
    }

    /// Derives every random stream from `seed`.
    #[must_use]
    pub const fn with_seed(self, seed: u64) -> Self {
        self.with_seeds(Seeds::from_base(seed))
    }

    /// Validates the parameters.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] naming the first invalid parameter.
    ///
    /// # Examples
    /// ```
    /// use kpd_core::{ConfigErrorCode, SimulationConfigBuilder};
    ///
    /// let err = SimulationConfigBuilder::new()
    ///     .with_renege_probability(1.5)
    ///     .build()
    ///     .expect_err("probability above one");
    /// assert_eq!(err.code(), ConfigErrorCode::InvalidProbability);
    /// ```
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let config = self.config;
        check_rate("pair_arrival_rate", config.pair_arrival_rate)?;
        check_rate("altruist_arrival_rate", config.altruist_arrival_rate)?;
        check_probability("pair_departure_probability", config.pair_departure_probability)?;
        check_probability(
            "altruist_departure_probability",
            config.altruist_departure_probability,
        )?;
        check_probability("renege_probability", config.renege_probability)?;
        check_length(GroupingKind::Cycle, config.max_cycle_length)?;
        check_length(GroupingKind::Chain, config.max_chain_length)?;
        config.failure_policy.validate()?;
        config.weight_policy.validate()?;
        Ok(config)
    }
}

fn check_probability(parameter: &'static str, got: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&got) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { parameter, got })
    }
}

/// Rates may be zero (nothing arrives) but must be finite.
fn check_rate(parameter: &'static str, got: f64) -> Result<(), ConfigError> {
    if got.is_finite() && got >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRate { parameter, got })
    }
}

fn check_length(kind: GroupingKind, got: usize) -> Result<(), ConfigError> {
    if got > MAX_GROUPING_LENGTH {
        return Err(ConfigError::ExcessiveLength {
            kind,
            got,
            max: MAX_GROUPING_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{error::ConfigErrorCode, policy::SpecialVertices};

    #[rstest]
    #[case::negative_rate(
        SimulationConfigBuilder::new().with_pair_arrival_rate(-1.0),
        ConfigErrorCode::InvalidRate
    )]
    #[case::infinite_rate(
        SimulationConfigBuilder::new().with_altruist_arrival_rate(f64::INFINITY),
        ConfigErrorCode::InvalidRate
    )]
    #[case::departure(
        SimulationConfigBuilder::new().with_pair_departure_probability(1.01),
        ConfigErrorCode::InvalidProbability
    )]
    #[case::expiry(
        SimulationConfigBuilder::new().with_altruist_departure_probability(f64::NAN),
        ConfigErrorCode::InvalidProbability
    )]
    #[case::renege(
        SimulationConfigBuilder::new().with_renege_probability(-0.5),
        ConfigErrorCode::InvalidProbability
    )]
    #[case::cycle_length(
        SimulationConfigBuilder::new().with_max_cycle_length(MAX_GROUPING_LENGTH + 1),
        ConfigErrorCode::ExcessiveLength
    )]
    #[case::chain_length(
        SimulationConfigBuilder::new().with_max_chain_length(64),
        ConfigErrorCode::ExcessiveLength
    )]
    #[case::failure_policy(
        SimulationConfigBuilder::new().with_failure_policy(FailurePolicy::Constant(2.0)),
        ConfigErrorCode::InvalidProbability
    )]
    #[case::bump(
        SimulationConfigBuilder::new().with_weight_policy(WeightPolicy::Prioritised {
            bump: f64::NAN,
            special: SpecialVertices::HighlySensitised { min_sensitization: 0.8 },
        }),
        ConfigErrorCode::InvalidBump
    )]
    fn build_rejects_invalid_parameters(
        #[case] builder: SimulationConfigBuilder,
        #[case] expected: ConfigErrorCode,
    ) {
        let err = builder.build().expect_err("configuration must be rejected");
        assert_eq!(err.code(), expected);
    }

    #[test]
    fn build_reports_the_offending_parameter() {
        let err = SimulationConfigBuilder::new()
            .with_renege_probability(3.0)
            .build()
            .expect_err("configuration must be rejected");

        assert_eq!(
            err,
            ConfigError::InvalidProbability {
                parameter: "renege_probability",
                got: 3.0
            }
        );
    }

    #[test]
    fn zero_rates_and_lengths_are_accepted() {
        let config = SimulationConfigBuilder::new()
            .with_pair_arrival_rate(0.0)
            .with_altruist_arrival_rate(0.0)
            .with_max_cycle_length(0)
            .with_max_chain_length(0)
            .build()
            .expect("configuration is valid");

        assert_eq!(config.pair_arrival_rate(), 0.0);
        assert_eq!(config.max_chain_length(), 0);
    }

    #[test]
    fn seed_streams_differ_from_each_other_and_across_bases() {
        let seeds = Seeds::from_base(7);
        let streams = [
            seeds.pair_arrivals,
            seeds.altruist_arrivals,
            seeds.departures,
            seeds.failures,
            seeds.reneging,
            seeds.generation,
            seeds.policy,
        ];
        let distinct: std::collections::BTreeSet<u64> = streams.iter().copied().collect();

        assert_eq!(distinct.len(), streams.len());
        assert_ne!(Seeds::from_base(7), Seeds::from_base(8));
    }
}
