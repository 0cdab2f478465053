//! Structured logging for the `kpd` binary.
//!
//! `KPD_LOG_FORMAT` selects human-readable or JSON lines and `KPD_LOG_SPANS`
//! selects which span lifecycle events are written. A run opens one
//! `sim.step` span per tick, so span events are off unless requested.
//! Filtering follows `RUST_LOG` and defaults to `info`. Everything goes to
//! `stderr`; `stdout` carries only the report.

use std::{env, io};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

const FORMAT_ENV: &str = "KPD_LOG_FORMAT";
const SPANS_ENV: &str = "KPD_LOG_SPANS";
const DEFAULT_DIRECTIVE: &str = "info";

static INITIALISED: OnceCell<()> = OnceCell::new();

/// Errors raised while initialising structured logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Environment variable contained invalid UTF-8 data.
    #[error("environment variable `{name}` contained invalid UTF-8: {source}")]
    InvalidUnicode {
        /// Name of the offending environment variable.
        name: &'static str,
        /// Underlying lookup failure.
        #[source]
        source: env::VarError,
    },
    /// An environment variable held a value outside its accepted set.
    #[error("unsupported value `{provided}` for `{name}`; expected {expected}")]
    UnsupportedValue {
        /// Name of the offending environment variable.
        name: &'static str,
        /// Normalised value supplied by the user.
        provided: String,
        /// Human-readable list of accepted values.
        expected: &'static str,
    },
    /// Failed to install the global tracing subscriber.
    #[error("failed to install tracing subscriber: {source}")]
    InstallFailed {
        /// Error raised by `tracing_subscriber`.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Encoding of each log line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact text for terminals.
    #[default]
    Human,
    /// One JSON object per line, with the current span and span list.
    Json,
}

/// Span lifecycle events written alongside regular events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpanEvents {
    /// Only events are written.
    #[default]
    Off,
    /// A line when each span closes, with its busy and idle time.
    Close,
    /// Lines for every span transition.
    Full,
}

impl SpanEvents {
    const fn fmt_span(self) -> FmtSpan {
        match self {
            Self::Off => FmtSpan::NONE,
            Self::Close => FmtSpan::CLOSE,
            Self::Full => FmtSpan::FULL,
        }
    }
}

/// Logging options read from the environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Line encoding.
    pub format: LogFormat,
    /// Span lifecycle events.
    pub spans: SpanEvents,
}

impl LogSettings {
    /// Reads `KPD_LOG_FORMAT` and `KPD_LOG_SPANS` from the process
    /// environment.
    ///
    /// # Errors
    /// Returns [`LoggingError`] when a variable is not valid UTF-8 or holds
    /// an unsupported value.
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Reads the settings through `lookup`, which behaves like
    /// [`std::env::var`]. Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns [`LoggingError`] when a variable is not valid UTF-8 or holds
    /// an unsupported value.
    ///
    /// # Examples
    /// ```
    /// use std::env::VarError;
    /// use kpd_cli::logging::{LogFormat, LogSettings, SpanEvents};
    ///
    /// let settings = LogSettings::from_lookup(|name| match name {
    ///     "KPD_LOG_FORMAT" => Ok("json".to_owned()),
    ///     _ => Err(VarError::NotPresent),
    /// })?;
    /// assert_eq!(settings.format, LogFormat::Json);
    /// assert_eq!(settings.spans, SpanEvents::Off);
    /// # Ok::<(), kpd_cli::logging::LoggingError>(())
    /// ```
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Result<String, env::VarError>,
    ) -> Result<Self, LoggingError> {
        let read = |name: &'static str| match lookup(name) {
            Ok(raw) => Ok(Some(raw)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(source) => Err(LoggingError::InvalidUnicode { name, source }),
        };
        let format = read(FORMAT_ENV)?
            .map(|raw| parse_format(&raw))
            .transpose()?
            .unwrap_or_default();
        let spans = read(SPANS_ENV)?
            .map(|raw| parse_spans(&raw))
            .transpose()?
            .unwrap_or_default();
        Ok(Self { format, spans })
    }
}

/// Installs global structured logging once per process.
///
/// If another subscriber already owns the global slot, a note is written to
/// `stderr` and the existing subscriber is kept.
///
/// # Errors
/// Returns [`LoggingError`] when the environment settings are invalid.
pub fn init_logging() -> Result<(), LoggingError> {
    INITIALISED
        .get_or_try_init(|| {
            let settings = LogSettings::from_env()?;
            match install(settings) {
                Err(LoggingError::InstallFailed { source }) => {
                    eprintln!("structured logging already configured elsewhere: {source}");
                    Ok(())
                }
                other => other,
            }
        })
        .map(|_| ())
}

fn install(settings: LogSettings) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(settings.spans.fmt_span())
        .with_writer(io::stderr);
    let layer = match settings.format {
        LogFormat::Human => layer.boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    };

    // Another logger may already own the `log` slot; keep it if so.
    let _ = LogTracer::init();

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|source| LoggingError::InstallFailed { source })
}

fn normalise(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn parse_format(raw: &str) -> Result<LogFormat, LoggingError> {
    match normalise(raw).as_str() {
        "" | "human" | "text" => Ok(LogFormat::Human),
        "json" => Ok(LogFormat::Json),
        other => Err(LoggingError::UnsupportedValue {
            name: FORMAT_ENV,
            provided: other.to_owned(),
            expected: "`human` or `json`",
        }),
    }
}

fn parse_spans(raw: &str) -> Result<SpanEvents, LoggingError> {
    match normalise(raw).as_str() {
        "" | "off" | "none" => Ok(SpanEvents::Off),
        "close" => Ok(SpanEvents::Close),
        "full" => Ok(SpanEvents::Full),
        other => Err(LoggingError::UnsupportedValue {
            name: SPANS_ENV,
            provided: other.to_owned(),
            expected: "`off`, `close` or `full`",
        }),
    }
}
