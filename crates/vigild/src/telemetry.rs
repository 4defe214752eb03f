//! Structured telemetry initialisation for the daemon.
//!
//! The subscriber is installed once per process, after detachment, so that
//! its sink survives the standard streams being pointed at `/dev/null`. A
//! detached daemon logs to journald, or to syslog when no journal is
//! reachable.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

use vigil_config::{Config, DEFAULT_LOG_FILTER, LaunchMode, LogFormat, LogSink};

use crate::syslog::SyslogWriter;

static TELEMETRY_GUARD: OnceCell<ActiveSink> = OnceCell::new();

const SYSLOG_IDENTIFIER: &str = env!("CARGO_PKG_NAME");

/// Sink that ended up receiving log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSink {
    /// Formatted events on standard error.
    Stderr,
    /// Native journald records.
    Journald,
    /// Formatted events handed to syslog(3).
    Syslog,
}

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    sink: ActiveSink,
}

impl TelemetryHandle {
    /// Sink installed by the first successful initialisation.
    #[must_use]
    pub const fn sink(&self) -> ActiveSink {
        self.sink
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
    /// The journald socket could not be reached.
    #[error("failed to connect to journald: {0}")]
    Journald(io::Error),
}

/// Logging options resolved for a single daemon run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// `tracing` filter expression.
    pub filter: String,
    /// Rendering used on standard error and syslog.
    pub format: LogFormat,
    /// Requested destination.
    pub sink: LogSink,
}

impl TelemetrySettings {
    /// Derives settings from configuration.
    ///
    /// A foreground daemon with an automatic sink logs to its terminal; a
    /// background one keeps `Auto` and resolves it once detached.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let sink = match (config.log_sink(), config.launch_mode()) {
            (LogSink::Auto, LaunchMode::Foreground) => LogSink::Stderr,
            (sink, _) => sink,
        };
        Self {
            filter: config.log_filter().to_owned(),
            format: config.log_format(),
            sink,
        }
    }

    /// Settings used when configuration itself could not be loaded.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_owned(),
            format: LogFormat::default(),
            sink: LogSink::Stderr,
        }
    }
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber and later invocations return a handle naming the sink that was
/// installed, ignoring their own settings.
pub fn initialise(settings: &TelemetrySettings) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(settings))
        .map(|sink| TelemetryHandle { sink: *sink })
}

fn install_subscriber(settings: &TelemetrySettings) -> Result<ActiveSink, TelemetryError> {
    let filter = EnvFilter::try_new(&settings.filter)
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    match settings.sink {
        LogSink::Stderr => install_stderr(filter, settings.format),
        LogSink::Journald => {
            let layer = tracing_journald::layer().map_err(TelemetryError::Journald)?;
            install_journald(filter, layer)
        }
        LogSink::Syslog => install_syslog(filter, settings.format),
        LogSink::Auto => match tracing_journald::layer() {
            Ok(layer) => install_journald(filter, layer),
            Err(_) => install_syslog(filter, settings.format),
        },
    }
}

fn install_journald(
    filter: EnvFilter,
    layer: tracing_journald::Layer,
) -> Result<ActiveSink, TelemetryError> {
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(layer.with_syslog_identifier(SYSLOG_IDENTIFIER.to_owned()));
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(ActiveSink::Journald)
}

fn install_stderr(filter: EnvFilter, format: LogFormat) -> Result<ActiveSink, TelemetryError> {
    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(ActiveSink::Stderr)
}

fn install_syslog(filter: EnvFilter, format: LogFormat) -> Result<ActiveSink, TelemetryError> {
    // syslog stamps each record itself.
    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_writer(SyslogWriter::connect())
            .with_ansi(false)
            .without_time()
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(ActiveSink::Syslog)
}
