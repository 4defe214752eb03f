use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Destination that receives daemon log events.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogSink {
    /// In the background the journal, or syslog when no journal is
    /// reachable. In the foreground, standard error.
    #[default]
    Auto,
    /// Standard error of the daemon process. A detached daemon's stderr is
    /// `/dev/null`.
    Stderr,
    /// The systemd journal.
    Journald,
    /// The system logger, through syslog(3).
    Syslog,
}
