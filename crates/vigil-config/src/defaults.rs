use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::{LogFormat, LogSink};
use crate::mode::LaunchMode;

/// File name of the lock file written by the daemon.
pub const LOCK_FILE_NAME: &str = "vigild.pid";

/// Directory holding the lock file when the daemon runs as root.
pub const SYSTEM_RUNTIME_DIRECTORY: &str = "/var/run";

/// Default interval between two ticks of the steady-state loop.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default log sink for the daemon.
pub fn default_log_sink() -> LogSink {
    LogSink::Auto
}

/// Default launch mode for the daemon.
pub fn default_launch_mode() -> LaunchMode {
    LaunchMode::Background
}

/// Default tick interval, in milliseconds.
pub fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

/// Computes the default lock file location.
///
/// Root instances use the system runtime directory. Other users get a
/// per-user directory, preferring `XDG_RUNTIME_DIR` and falling back to a
/// uid-namespaced directory under the temporary directory.
pub fn default_lock_path() -> Utf8PathBuf {
    default_lock_path_inner()
}

#[cfg(unix)]
fn default_lock_path_inner() -> Utf8PathBuf {
    if unsafe { geteuid() } == 0 {
        return Utf8PathBuf::from(SYSTEM_RUNTIME_DIRECTORY).join(LOCK_FILE_NAME);
    }

    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("vigil");
    if apply_namespace {
        base.push(user_namespace());
    }
    base.join(LOCK_FILE_NAME)
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_lock_path_inner() -> Utf8PathBuf {
    let mut base = fallback_base_directory();
    base.push("vigil");
    base.join(LOCK_FILE_NAME)
}
