//! Structured reporting for daemon lifecycle events.

use std::error::Error;
use std::fmt::{self, Display};
use std::path::Path;
use std::sync::Arc;

use crate::process::{LaunchError, LockError, ProcessLock};

const REPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Result of one completed tick of the periodic callback.
#[derive(Clone, Copy)]
pub struct TickReport<'a> {
    /// One-based tick number.
    pub tick: u64,
    /// Value produced by the callback.
    pub output: &'a dyn Display,
}

impl fmt::Debug for TickReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickReport")
            .field("tick", &self.tick)
            .field("output", &self.output.to_string())
            .finish()
    }
}

/// Observer trait used to surface lifecycle events to the log sink.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked once setup has completed and the loop is about to run.
    fn starting(&self, pid: u32);

    /// Invoked after the instance lock has been taken.
    fn lock_acquired(&self, lock: &ProcessLock);

    /// Invoked when the lock file still named a terminated instance.
    fn stale_lock_reclaimed(&self, path: &Path, stale_pid: u32);

    /// Invoked after every successful callback invocation.
    fn tick_completed(&self, report: TickReport<'_>);

    /// Invoked when the callback returns an error.
    fn tick_failed(&self, tick: u64, error: &dyn Error);

    /// Invoked when a reload request is observed.
    fn reload_ignored(&self);

    /// Invoked when a shutdown request is observed.
    fn shutdown_requested(&self);

    /// Invoked on entering the stopping state.
    fn stopping(&self);

    /// Invoked when removing or unlocking the lock file fails.
    fn release_failed(&self, error: &LockError);

    /// Invoked once the lifecycle has terminated.
    fn terminated(&self, ticks: u64);

    /// Invoked when setup fails before the loop starts.
    fn setup_failed(&self, error: &LaunchError);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn starting(&self, pid: u32) {
        (**self).starting(pid);
    }

    fn lock_acquired(&self, lock: &ProcessLock) {
        (**self).lock_acquired(lock);
    }

    fn stale_lock_reclaimed(&self, path: &Path, stale_pid: u32) {
        (**self).stale_lock_reclaimed(path, stale_pid);
    }

    fn tick_completed(&self, report: TickReport<'_>) {
        (**self).tick_completed(report);
    }

    fn tick_failed(&self, tick: u64, error: &dyn Error) {
        (**self).tick_failed(tick, error);
    }

    fn reload_ignored(&self) {
        (**self).reload_ignored();
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }

    fn stopping(&self) {
        (**self).stopping();
    }

    fn release_failed(&self, error: &LockError) {
        (**self).release_failed(error);
    }

    fn terminated(&self, ticks: u64) {
        (**self).terminated(ticks);
    }

    fn setup_failed(&self, error: &LaunchError) {
        (**self).setup_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl StructuredReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredReporter {
    fn starting(&self, pid: u32) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "starting",
            pid,
            "daemon starting"
        );
    }

    fn lock_acquired(&self, lock: &ProcessLock) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "lock_acquired",
            pid = lock.pid(),
            file = %lock.path().display(),
            "instance lock acquired"
        );
    }

    fn stale_lock_reclaimed(&self, path: &Path, stale_pid: u32) {
        tracing::warn!(
            target: REPORT_TARGET,
            event = "stale_lock_reclaimed",
            stale_pid,
            file = %path.display(),
            "reclaimed lock file left by a terminated instance"
        );
    }

    fn tick_completed(&self, report: TickReport<'_>) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "tick_completed",
            tick = report.tick,
            output = %report.output,
            "tick completed"
        );
    }

    fn tick_failed(&self, tick: u64, error: &dyn Error) {
        tracing::warn!(
            target: REPORT_TARGET,
            event = "tick_failed",
            tick,
            error = %error,
            "periodic task failed"
        );
    }

    fn reload_ignored(&self) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "reload_ignored",
            "reload requested; nothing to reload"
        );
    }

    fn shutdown_requested(&self) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "shutdown_requested",
            "shutdown requested"
        );
    }

    fn stopping(&self) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "stopping",
            "daemon stopping"
        );
    }

    fn release_failed(&self, error: &LockError) {
        tracing::error!(
            target: REPORT_TARGET,
            event = "release_failed",
            error = %error,
            "failed to release instance lock"
        );
    }

    fn terminated(&self, ticks: u64) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "terminated",
            ticks,
            "daemon terminated"
        );
    }

    fn setup_failed(&self, error: &LaunchError) {
        tracing::error!(
            target: REPORT_TARGET,
            event = "setup_failed",
            contention = error.is_contention(),
            error = %error,
            "daemon setup failed"
        );
    }
}
