//! A minimal Unix daemon built around a single-instance lifecycle.
//!
//! Starting `vigild` detaches it from the launching terminal (unless it runs
//! in the foreground), attaches a structured log sink, takes an exclusive
//! lock file naming its PID, and installs signal handlers. It then invokes a
//! [`PeriodicTask`] once per tick until `SIGTERM` (or `SIGINT` in the
//! foreground) asks it to stop, at which point the lock file is removed.
//! `SIGHUP` is acknowledged and otherwise ignored.
//!
//! Signal handlers never do more than set a bit on a [`RunFlag`]; all
//! reporting happens on the main thread through a [`LifecycleReporter`].
//! Configuration comes from [`vigil_config`].

mod process;
mod report;
mod syslog;
mod task;
pub mod telemetry;

pub use process::{
    DetachError, Detacher, HandledSignals, LaunchError, Lifecycle, LifecyclePlan,
    LifecycleSettings, LifecycleState, LockError, NoopDetacher, ProcessLock, RunFlag, SignalError,
    SignalEvent, SignalInstaller, SystemDetacher, SystemSignalBridge, run_daemon, run_daemon_with,
};
pub use report::{LifecycleReporter, StructuredReporter, TickReport};
pub use task::{FibonacciTask, PeriodicTask, TaskError};
pub use telemetry::{ActiveSink, TelemetryError, TelemetryHandle, TelemetrySettings};

#[cfg(test)]
mod tests;
