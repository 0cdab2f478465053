//! Argument parsing and execution for the `kpd` commands.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kpd_core::{
    BloodTypeGenerator, DEFAULT_NODE_BUDGET, ExhaustiveOptimizer, FailurePolicy,
    SelectionStrategy, Simulation, SimulationConfig, SimulationConfigBuilder, SimulationError,
    SimulationSummary, SpecialVertices, TickReport, WeightPolicy,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

const DEFAULT_MIN_SENSITIZATION: f64 = 0.8;

const TICK_COLUMNS: [&str; 17] = [
    "tick",
    "arrived_pairs",
    "arrived_altruists",
    "seen_pairs",
    "seen_altruists",
    "matched",
    "failed",
    "discarded",
    "deceased",
    "expired",
    "bridges",
    "pool_pairs",
    "pool_altruists",
    "groupings",
    "selected",
    "objective",
    "elapsed_us",
];

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "kpd", about = "Simulate a dynamic kidney paired donation pool.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the dynamic matching loop and report each tick.
    Simulate(SimulateCommand),
}

/// Options accepted by the `simulate` command.
#[derive(Debug, Args, Clone)]
pub struct SimulateCommand {
    /// Number of ticks to run.
    #[arg(long, default_value_t = 100)]
    pub iterations: u64,

    /// Base seed; every random stream is derived from it.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Mean number of pairs arriving per tick.
    #[arg(long, default_value_t = 3.0)]
    pub pair_arrival_rate: f64,

    /// Mean number of altruists arriving per tick.
    #[arg(long, default_value_t = 0.2)]
    pub altruist_arrival_rate: f64,

    /// Probability that a waiting pair leaves the pool each tick.
    #[arg(long, default_value_t = 0.01)]
    pub pair_departure_probability: f64,

    /// Probability that a waiting altruist or bridge donor leaves each tick.
    #[arg(long, default_value_t = 0.02)]
    pub altruist_departure_probability: f64,

    /// Probability that a bridge donor reneges after their recipient is transplanted.
    #[arg(long, default_value_t = 0.0)]
    pub renege_probability: f64,

    /// Longest exchange cycle, in pairs.
    #[arg(long, default_value_t = 3)]
    pub max_cycle_length: usize,

    /// Longest chain, in transplants.
    #[arg(long, default_value_t = 4)]
    pub max_chain_length: usize,

    /// Enumerate chains consisting of a lone altruist.
    #[arg(long)]
    pub allow_empty_chain: bool,

    /// How edge failure probabilities are drawn.
    #[arg(long, value_enum, default_value_t = FailureMode::None)]
    pub failure: FailureMode,

    /// Failure probability used by `--failure constant`.
    #[arg(long, default_value_t = 0.1)]
    pub failure_probability: f64,

    /// Extra weight for transplants into highly sensitised patients.
    ///
    /// Enables the two-phase objective that first maximises transplants.
    #[arg(long)]
    pub priority_bump: Option<f64>,

    /// Sensitization at or above which a patient receives the bump.
    #[arg(long, default_value_t = DEFAULT_MIN_SENSITIZATION)]
    pub min_sensitization: f64,

    /// When the optimizer runs.
    #[arg(long, value_enum, default_value_t = StrategyArg::Batch)]
    pub strategy: StrategyArg,

    /// Stop before the next tick once this many milliseconds have elapsed.
    #[arg(long)]
    pub time_limit_ms: Option<u64>,

    /// Search nodes the optimizer may expand per solve.
    #[arg(long, default_value_t = DEFAULT_NODE_BUDGET)]
    pub node_budget: u64,

    /// Write the per-tick table here instead of `stdout`.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Failure policies selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailureMode {
    /// Edges never fail.
    None,
    /// Every edge fails with `--failure-probability`.
    Constant,
    /// Edges fail with a probability drawn from a low or a high band.
    Bimodal,
}

/// Selection strategies selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Solve once per tick.
    Batch,
    /// Solve once per arriving vertex.
    PerArrival,
}

impl From<StrategyArg> for SelectionStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Batch => Self::Batch,
            StrategyArg::PerArrival => Self::PerArrival,
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The report file could not be created or written.
    #[error("failed to write `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// Writing to the output stream failed.
    #[error("failed to render report: {0}")]
    Render(#[source] io::Error),
    /// Configuration or simulation failed.
    #[error(transparent)]
    Core(#[from] SimulationError),
}

/// Outcome of a `simulate` run.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// One report per completed tick.
    pub reports: Vec<TickReport>,
    /// Totals for the run.
    pub summary: SimulationSummary,
    /// Destination for the per-tick table, if not `stdout`.
    pub output: Option<PathBuf>,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when the configuration is invalid or the simulation
/// fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use clap::Parser;
/// # use kpd_cli::cli::{Cli, run_cli};
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let cli = Cli::try_parse_from(["kpd", "simulate", "--iterations", "5", "--seed", "3"])?;
/// let execution = run_cli(cli)?;
/// assert_eq!(execution.reports.len(), 5);
/// assert_eq!(execution.summary.ticks, 5);
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Simulate(command) => {
            Span::current().record("command", field::display("simulate"));
            run_command(command)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(seed = field::Empty, iterations = field::Empty, strategy = field::Empty),
)]
pub(super) fn run_command(command: SimulateCommand) -> Result<ExecutionSummary, CliError> {
    let config = build_config(&command)?;

    let span = Span::current();
    span.record("seed", command.seed);
    span.record("iterations", config.iterations());
    span.record("strategy", field::debug(config.strategy()));

    let generator = BloodTypeGenerator::standard().map_err(SimulationError::from)?;
    let optimizer = ExhaustiveOptimizer::new(command.node_budget).map_err(SimulationError::from)?;
    let mut simulation = Simulation::new(config, generator, optimizer)?;

    let mut reports = Vec::new();
    let summary = simulation.run(|report| reports.push(report.clone()))?;

    info!(
        ticks = summary.ticks,
        matched = summary.matched,
        seen_pairs = summary.seen_pairs,
        timed_out = summary.timed_out,
        "command completed"
    );
    Ok(ExecutionSummary {
        reports,
        summary,
        output: command.output,
    })
}

pub(super) fn build_config(command: &SimulateCommand) -> Result<SimulationConfig, SimulationError> {
    let failure_policy = match command.failure {
        FailureMode::None => FailurePolicy::None,
        FailureMode::Constant => FailurePolicy::Constant(command.failure_probability),
        FailureMode::Bimodal => FailurePolicy::Bimodal,
    };
    let weight_policy = command
        .priority_bump
        .map_or(WeightPolicy::Unit, |bump| WeightPolicy::Prioritised {
            bump,
            special: SpecialVertices::HighlySensitised {
                min_sensitization: command.min_sensitization,
            },
        });

    let mut builder = SimulationConfigBuilder::new()
        .with_iterations(command.iterations)
        .with_seed(command.seed)
        .with_pair_arrival_rate(command.pair_arrival_rate)
        .with_altruist_arrival_rate(command.altruist_arrival_rate)
        .with_pair_departure_probability(command.pair_departure_probability)
        .with_altruist_departure_probability(command.altruist_departure_probability)
        .with_renege_probability(command.renege_probability)
        .with_max_cycle_length(command.max_cycle_length)
        .with_max_chain_length(command.max_chain_length)
        .with_allow_empty_chain(command.allow_empty_chain)
        .with_failure_policy(failure_policy)
        .with_weight_policy(weight_policy)
        .with_strategy(command.strategy.into());
    if let Some(limit) = command.time_limit_ms {
        builder = builder.with_time_limit(Duration::from_millis(limit));
    }
    builder.build().map_err(SimulationError::from)
}

/// Writes the per-tick table to the requested file, or to `stdout` when none
/// was given, followed by the run summary on `stdout`.
///
/// # Errors
/// Returns [`CliError::Io`] if the output file cannot be written and
/// [`CliError::Render`] if `stdout` rejects a write.
#[instrument(name = "cli.emit", err, skip(execution, stdout), fields(output = field::Empty))]
pub fn emit(execution: &ExecutionSummary, mut stdout: impl Write) -> Result<(), CliError> {
    match execution.output.as_deref() {
        Some(path) => {
            Span::current().record("output", field::display(path.display()));
            write_ticks_to(path, &execution.reports)?;
        }
        None => render_ticks(&execution.reports, &mut stdout).map_err(CliError::Render)?,
    }
    render_summary(&execution.summary, &mut stdout).map_err(CliError::Render)
}

fn write_ticks_to(path: &Path, reports: &[TickReport]) -> Result<(), CliError> {
    let io_error = |source: io::Error| CliError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    render_ticks(reports, &mut writer).map_err(io_error)?;
    writer.flush().map_err(io_error)
}

/// Renders one tab-separated row per tick, preceded by a header row.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_ticks(reports: &[TickReport], mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "{}", TICK_COLUMNS.join("\t"))?;
    for report in reports {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.3}\t{}",
            report.tick,
            report.arrived_pairs,
            report.arrived_altruists,
            report.seen_pairs,
            report.seen_altruists,
            report.matched,
            report.failed,
            report.discarded,
            report.deceased,
            report.expired,
            report.bridges,
            report.pool_pairs,
            report.pool_altruists,
            report.groupings,
            report.selected,
            report.objective,
            report.elapsed.as_micros(),
        )?;
    }
    Ok(())
}

/// Renders `summary` to `writer` as `name: value` lines.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use kpd_cli::cli::render_summary;
/// # use kpd_core::SimulationSummary;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let summary = SimulationSummary {
///     ticks: 2,
///     seen_pairs: 4,
///     matched: 3,
///     ..SimulationSummary::default()
/// };
/// let mut buffer = Vec::new();
/// render_summary(&summary, &mut buffer)?;
/// let text = String::from_utf8(buffer)?;
/// assert!(text.contains("match rate: 0.750\n"));
/// # Ok(())
/// # }
/// ```
pub fn render_summary(summary: &SimulationSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "ticks: {}", summary.ticks)?;
    writeln!(writer, "timed out: {}", summary.timed_out)?;
    writeln!(writer, "pairs seen: {}", summary.seen_pairs)?;
    writeln!(writer, "altruists seen: {}", summary.seen_altruists)?;
    writeln!(writer, "transplants: {}", summary.matched)?;
    match summary.match_rate() {
        Some(rate) => writeln!(writer, "match rate: {rate:.3}")?,
        None => writeln!(writer, "match rate: n/a")?,
    }
    writeln!(writer, "failed groupings: {}", summary.failed)?;
    writeln!(writer, "discarded groupings: {}", summary.discarded)?;
    writeln!(writer, "pairs departed: {}", summary.deceased)?;
    writeln!(writer, "altruists departed: {}", summary.expired)?;
    writeln!(writer, "bridge donors: {}", summary.bridges)?;
    writeln!(writer, "pairs waiting: {}", summary.pool_pairs)?;
    writeln!(writer, "altruists waiting: {}", summary.pool_altruists)?;
    writeln!(writer, "elapsed: {:.3}s", summary.elapsed.as_secs_f64())?;
    Ok(())
}
