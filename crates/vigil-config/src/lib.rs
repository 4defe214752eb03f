//! Shared configuration for the vigil daemon.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then an
//! optional configuration file (`--config-path` or `VIGIL_CONFIG_PATH`), then
//! `VIGIL_*` environment variables, then command-line flags. The daemon
//! consumes the resolved [`Config`] through its accessors.

mod defaults;
mod logging;
mod mode;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TICK_INTERVAL_MS, LOCK_FILE_NAME, SYSTEM_RUNTIME_DIRECTORY,
    default_launch_mode, default_lock_path, default_log_filter, default_log_filter_string,
    default_log_format, default_log_sink, default_tick_interval_ms,
};
pub use logging::{LogFormat, LogSink};
pub use mode::LaunchMode;

/// Smallest tick interval the daemon will honour.
pub const MINIMUM_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VIGIL")]
pub struct Config {
    /// Lock file guarding single-instance execution.
    #[serde(default = "default_lock_path")]
    #[ortho_config(default = default_lock_path())]
    pub lock_path: Utf8PathBuf,
    /// Interval between two ticks of the steady-state loop, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    #[ortho_config(default = default_tick_interval_ms())]
    pub tick_interval_ms: u64,
    /// Whether the daemon detaches into the background.
    #[serde(default = "default_launch_mode")]
    #[ortho_config(default = default_launch_mode())]
    pub launch_mode: LaunchMode,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Rendering used for stderr output.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Destination of log events.
    #[serde(default = "default_log_sink")]
    #[ortho_config(default = default_log_sink())]
    pub log_sink: LogSink,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_path: default_lock_path(),
            tick_interval_ms: default_tick_interval_ms(),
            launch_mode: default_launch_mode(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            log_sink: default_log_sink(),
        }
    }
}

impl Config {
    /// Path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Utf8Path {
        self.lock_path.as_path()
    }

    /// Interval between ticks, never shorter than [`MINIMUM_TICK_INTERVAL`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms).max(MINIMUM_TICK_INTERVAL)
    }

    /// Configured launch mode.
    #[must_use]
    pub fn launch_mode(&self) -> LaunchMode {
        self.launch_mode
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Configured log sink.
    #[must_use]
    pub fn log_sink(&self) -> LogSink {
        self.log_sink
    }
}
