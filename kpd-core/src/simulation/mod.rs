//! The discrete-time exchange loop.
//!
//! Each tick runs five phases in a fixed order: arrivals, pair departures,
//! altruist departures, resolution of the groupings committed on the
//! previous tick, and finally re-enumeration and selection of the groupings
//! to resolve on the next one.

mod report;
mod resolution;

use std::{collections::BTreeSet, time::Instant};

use rand::{Rng, SeedableRng, rngs::SmallRng};
use rand_distr::{Distribution, Poisson};
use tracing::{debug, info, instrument};

use self::resolution::{Outcome, resolve_chain, resolve_cycle};
use crate::{
    arrivals::{Arrivals, VertexGenerator},
    config::{Seeds, SelectionStrategy, SimulationConfig},
    error::{ConfigError, Result, SimulationError},
    generator::CycleGenerator,
    grouping::{Grouping, GroupingKind},
    membership::CycleMembership,
    optimizer::{Optimizer, Selection, SelectionRequest, select_lexicographic},
    policy::{assign_failure_probabilities, assign_weights},
    pool::{Pool, VertexId},
    trial::Trial,
};

pub use self::report::{SimulationSummary, TickReport};

/// One seeded generator per random concern.
#[derive(Clone, Debug)]
struct Streams {
    pair_arrivals: SmallRng,
    altruist_arrivals: SmallRng,
    departures: SmallRng,
    failures: SmallRng,
    reneging: SmallRng,
    generation: SmallRng,
    policy: SmallRng,
}

impl Streams {
    fn new(seeds: Seeds) -> Self {
        Self {
            pair_arrivals: SmallRng::seed_from_u64(seeds.pair_arrivals),
            altruist_arrivals: SmallRng::seed_from_u64(seeds.altruist_arrivals),
            departures: SmallRng::seed_from_u64(seeds.departures),
            failures: SmallRng::seed_from_u64(seeds.failures),
            reneging: SmallRng::seed_from_u64(seeds.reneging),
            generation: SmallRng::seed_from_u64(seeds.generation),
            policy: SmallRng::seed_from_u64(seeds.policy),
        }
    }
}

/// Arrival-count distribution; a zero rate never draws.
#[derive(Clone, Copy, Debug)]
struct ArrivalRate(Option<Poisson<f64>>);

impl ArrivalRate {
    fn new(parameter: &'static str, rate: f64) -> core::result::Result<Self, ConfigError> {
        if rate == 0.0 {
            return Ok(Self(None));
        }
        Poisson::new(rate)
            .map(|poisson| Self(Some(poisson)))
            .map_err(|_| ConfigError::InvalidRate {
                parameter,
                got: rate,
            })
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Poisson samples are whole numbers, clamped into u32 range first"
    )]
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.0.map_or(0, |poisson| {
            let count = poisson.sample(rng).clamp(0.0, f64::from(u32::MAX)) as u32;
            usize::try_from(count).unwrap_or(usize::MAX)
        })
    }
}

/// A dynamic exchange pool driven tick by tick.
///
/// # Examples
/// ```
/// use kpd_core::{BloodTypeGenerator, ExhaustiveOptimizer, Simulation, SimulationConfigBuilder};
///
/// let config = SimulationConfigBuilder::new()
///     .with_iterations(5)
///     .with_pair_arrival_rate(3.0)
///     .with_seed(11)
///     .build()?;
/// let mut simulation = Simulation::new(
///     config,
///     BloodTypeGenerator::standard()?,
///     ExhaustiveOptimizer::default(),
/// )?;
///
/// let mut ticks = 0;
/// let summary = simulation.run(|_| ticks += 1)?;
/// assert_eq!(ticks, 5);
/// assert_eq!(summary.ticks, 5);
/// assert!(summary.matched <= summary.seen_pairs);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Simulation<G, O> {
    config: SimulationConfig,
    generator: G,
    optimizer: O,
    pool: Pool,
    pending: Vec<Grouping>,
    streams: Streams,
    pair_rate: ArrivalRate,
    altruist_rate: ArrivalRate,
    tick: u64,
    seen_pairs: usize,
    seen_altruists: usize,
}

impl<G: VertexGenerator, O: Optimizer> Simulation<G, O> {
    /// Creates a simulation over an empty pool.
    ///
    /// # Errors
    /// Returns [`SimulationError::Config`] when an arrival rate cannot
    /// parameterise a Poisson distribution.
    pub fn new(config: SimulationConfig, generator: G, optimizer: O) -> Result<Self> {
        let pair_rate = ArrivalRate::new("pair_arrival_rate", config.pair_arrival_rate)?;
        let altruist_rate =
            ArrivalRate::new("altruist_arrival_rate", config.altruist_arrival_rate)?;
        Ok(Self {
            streams: Streams::new(config.seeds),
            config,
            generator,
            optimizer,
            pool: Pool::new(),
            pending: Vec::new(),
            pair_rate,
            altruist_rate,
            tick: 0,
            seen_pairs: 0,
            seen_altruists: 0,
        })
    }

    /// Starts from `pool` instead of an empty pool.
    ///
    /// Vertices already in `pool` do not count as seen.
    #[must_use]
    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pool = pool;
        self
    }

    /// Returns the configuration.
    #[must_use]
    #[rustfmt::skip]
    pub const fn config(&self) -> &SimulationConfig { &self.config }

    /// Returns the current pool.
    #[must_use]
    #[rustfmt::skip]
    pub const fn pool(&self) -> &Pool { &self.pool }

    /// Returns the groupings awaiting resolution on the next tick.
    #[must_use]
    #[rustfmt::skip]
    pub fn pending(&self) -> &[Grouping] { &self.pending }

    /// Returns the number of ticks completed.
    #[must_use]
    #[rustfmt::skip]
    pub const fn tick(&self) -> u64 { self.tick }

    /// Runs every configured tick, handing each report to `observer`.
    ///
    /// The wall-clock limit is checked before each tick; a tick that has
    /// started always completes.
    ///
    /// # Errors
    /// Stops at the first failing tick and returns its error.
    #[instrument(
        name = "sim.run",
        skip(self, observer),
        fields(iterations = self.config.iterations, strategy = ?self.config.strategy),
        err,
    )]
    pub fn run<F: FnMut(&TickReport)>(&mut self, mut observer: F) -> Result<SimulationSummary> {
        let started = Instant::now();
        let mut summary = SimulationSummary::default();
        for _ in 0..self.config.iterations {
            if self
                .config
                .time_limit
                .is_some_and(|limit| started.elapsed() >= limit)
            {
                summary.timed_out = true;
                info!(ticks = summary.ticks, "time limit reached");
                break;
            }
            let report = self.step()?;
            observer(&report);
            summary.record(&report);
        }
        info!(
            ticks = summary.ticks,
            matched = summary.matched,
            failed = summary.failed,
            seen_pairs = summary.seen_pairs,
            "simulation finished"
        );
        Ok(summary)
    }

    /// Advances the simulation by one tick.
    ///
    /// # Errors
    /// Returns [`SimulationError::Pool`] when a pool operation fails,
    /// [`SimulationError::Optimizer`] when selection fails and
    /// [`SimulationError::InvariantViolation`] when the optimizer returns
    /// overlapping groupings.
    #[instrument(name = "sim.step", level = "debug", skip(self), fields(tick = self.tick), err)]
    pub fn step(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let arrivals = self.arrive(&mut report)?;
        self.depart(&mut report)?;
        self.resolve(&mut report)?;
        self.select(&arrivals, &mut report)?;

        report.seen_pairs = self.seen_pairs;
        report.seen_altruists = self.seen_altruists;
        report.pool_pairs = self.pool.pair_count();
        report.pool_altruists = self.pool.altruist_count();
        report.elapsed = started.elapsed();
        self.tick += 1;
        record_metrics(&report);
        debug!(
            matched = report.matched,
            failed = report.failed,
            discarded = report.discarded,
            pool_pairs = report.pool_pairs,
            "tick complete"
        );
        Ok(report)
    }

    fn arrive(&mut self, report: &mut TickReport) -> Result<Arrivals> {
        let pairs = self.pair_rate.draw(&mut self.streams.pair_arrivals);
        let altruists = self.altruist_rate.draw(&mut self.streams.altruist_arrivals);
        let arrivals =
            self.generator
                .generate(&mut self.pool, pairs, altruists, &mut self.streams.generation)?;
        report.arrived_pairs = arrivals.pairs.len();
        report.arrived_altruists = arrivals.altruists.len();
        self.seen_pairs += arrivals.pairs.len();
        self.seen_altruists += arrivals.altruists.len();
        Ok(arrivals)
    }

    fn depart(&mut self, report: &mut TickReport) -> Result<()> {
        let departures = &mut self.streams.departures;
        let pair_probability = self.config.pair_departure_probability;
        let leaving: BTreeSet<VertexId> = self
            .pool
            .pair_ids()
            .filter(|_| departures.trial(pair_probability))
            .collect();
        report.deceased = leaving.len();
        report.discarded += self.remove_departed(&leaving)?;

        let departures = &mut self.streams.departures;
        let altruist_probability = self.config.altruist_departure_probability;
        let expiring: BTreeSet<VertexId> = self
            .pool
            .altruist_ids()
            .filter(|_| departures.trial(altruist_probability))
            .collect();
        report.expired = expiring.len();
        report.discarded += self.remove_departed(&expiring)?;
        Ok(())
    }

    /// Removes `departed` in one step and drops every pending grouping that
    /// references one of them, returning how many were dropped.
    fn remove_departed(&mut self, departed: &BTreeSet<VertexId>) -> Result<usize> {
        if departed.is_empty() {
            return Ok(0);
        }
        self.pool.remove_vertices(departed)?;
        let before = self.pending.len();
        self.pending
            .retain(|grouping| !grouping.vertices().any(|vertex| departed.contains(&vertex)));
        let discarded = before - self.pending.len();
        if discarded > 0 {
            debug!(departed = departed.len(), discarded, "discarded pending groupings");
        }
        Ok(discarded)
    }

    #[instrument(
        name = "sim.resolve",
        level = "debug",
        skip(self, report),
        fields(pending = self.pending.len()),
        err,
    )]
    fn resolve(&mut self, report: &mut TickReport) -> Result<()> {
        for grouping in std::mem::take(&mut self.pending) {
            let outcome = match grouping.kind() {
                GroupingKind::Cycle => {
                    resolve_cycle(&mut self.pool, &grouping, &mut self.streams.failures)?
                }
                GroupingKind::Chain => resolve_chain(
                    &mut self.pool,
                    &grouping,
                    &mut self.streams.failures,
                    &mut self.streams.reneging,
                    self.config.renege_probability,
                )?,
            };
            match outcome {
                Outcome::Failed => report.failed += 1,
                Outcome::Executed {
                    transplants,
                    bridge,
                } => {
                    report.matched += transplants;
                    if let Some(bridge) = bridge {
                        report.bridges += 1;
                        debug!(bridge = %bridge, "bridge donor created");
                    }
                }
            }
        }
        Ok(())
    }

    #[instrument(
        name = "sim.select",
        level = "debug",
        skip(self, arrivals, report),
        fields(strategy = ?self.config.strategy),
        err,
    )]
    fn select(&mut self, arrivals: &Arrivals, report: &mut TickReport) -> Result<()> {
        // Both policies cover every edge each round, including edges of a
        // pool handed to `with_pool`.
        assign_failure_probabilities(
            &mut self.pool,
            self.config.failure_policy,
            &mut self.streams.policy,
        );
        assign_weights(&mut self.pool, &self.config.weight_policy);
        match self.config.strategy {
            SelectionStrategy::Batch => {
                let groupings = CycleGenerator::new(&self.pool).generate(
                    self.config.max_cycle_length,
                    self.config.max_chain_length,
                    self.config.allow_empty_chain,
                );
                let selection = self.choose(&self.pool, &groupings)?;
                self.commit(groupings, &selection, report);
            }
            SelectionStrategy::PerArrival => self.select_per_arrival(arrivals, report)?,
        }
        Ok(())
    }

    /// Commits groupings around each arrival in turn, never reusing a vertex
    /// an earlier arrival's selection already committed.
    fn select_per_arrival(&mut self, arrivals: &Arrivals, report: &mut TickReport) -> Result<()> {
        let mut committed: BTreeSet<VertexId> = BTreeSet::new();
        for vertex in arrivals.vertices() {
            if committed.contains(&vertex) || !self.pool.contains(vertex) {
                continue;
            }
            let available: BTreeSet<VertexId> = self
                .pool
                .vertices()
                .map(|(id, _)| id)
                .filter(|id| !committed.contains(id))
                .collect();
            let sub_pool = self.pool.sub_pool(&available)?;
            let groupings = CycleGenerator::new(&sub_pool).generate_containing(
                vertex,
                self.config.max_cycle_length,
                self.config.max_chain_length,
                self.config.allow_empty_chain,
            )?;
            let selection = self.choose(&sub_pool, &groupings)?;
            for index in selection.chosen() {
                if let Some(grouping) = groupings.get(*index) {
                    committed.extend(grouping.vertices());
                }
            }
            self.commit(groupings, &selection, report);
        }
        Ok(())
    }

    fn choose(&self, pool: &Pool, groupings: &[Grouping]) -> Result<Selection> {
        let membership = CycleMembership::build(pool, groupings);
        let policy = &self.config.weight_policy;
        let selection = if policy.is_prioritised() {
            select_lexicographic(&self.optimizer, pool, groupings, &membership, policy)
        } else {
            self.optimizer
                .solve(&SelectionRequest::new(groupings, &membership))
        }
        .map_err(|error| SimulationError::Optimizer {
            tick: self.tick,
            error,
        })?;

        let in_range = selection.chosen().iter().all(|index| *index < groupings.len());
        if !in_range || !membership.is_disjoint(selection.chosen()) {
            return Err(SimulationError::invariant(format!(
                "selection {:?} at tick {} is not a disjoint subset of {} groupings",
                selection.chosen(),
                self.tick,
                groupings.len()
            )));
        }
        Ok(selection)
    }

    /// Queues the chosen groupings for resolution; chains without a
    /// transplant are dropped since resolving them changes nothing.
    fn commit(&mut self, groupings: Vec<Grouping>, selection: &Selection, report: &mut TickReport) {
        report.groupings += groupings.len();
        report.objective += selection.objective();
        let chosen = groupings
            .into_iter()
            .enumerate()
            .filter(|(index, grouping)| {
                selection.chosen().binary_search(index).is_ok() && grouping.transplant_count() > 0
            })
            .map(|(_, grouping)| grouping);
        let before = self.pending.len();
        self.pending.extend(chosen);
        report.selected += self.pending.len() - before;
    }
}

#[cfg(feature = "metrics")]
fn record_metrics(report: &TickReport) {
    let count = |value: usize| u64::try_from(value).unwrap_or(u64::MAX);
    metrics::counter!("kpd_transplants_total").increment(count(report.matched));
    metrics::counter!("kpd_groupings_failed_total").increment(count(report.failed));
    metrics::counter!("kpd_bridge_donors_total").increment(count(report.bridges));
    metrics::gauge!("kpd_pool_pairs")
        .set(f64::from(u32::try_from(report.pool_pairs).unwrap_or(u32::MAX)));
}

#[cfg(not(feature = "metrics"))]
fn record_metrics(_report: &TickReport) {}
