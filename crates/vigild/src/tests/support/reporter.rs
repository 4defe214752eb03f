//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::error::Error;
use std::path::Path;
use std::sync::Mutex;

use crate::process::{LaunchError, LockError, ProcessLock};
use crate::report::{LifecycleReporter, TickReport};

/// Lifecycle events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Starting(u32),
    LockAcquired(u32),
    StaleLockReclaimed(u32),
    TickCompleted { tick: u64, output: String },
    TickFailed { tick: u64, message: String },
    ReloadIgnored,
    ShutdownRequested,
    Stopping,
    ReleaseFailed(String),
    Terminated(u64),
    SetupFailed { message: String, contention: bool },
}

/// Records lifecycle events in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    /// Outputs of completed ticks, in order.
    #[must_use]
    pub fn tick_outputs(&self) -> Vec<(u64, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::TickCompleted { tick, output } => Some((tick, output)),
                _ => None,
            })
            .collect()
    }

    /// Counts events equal to `expected`.
    #[must_use]
    pub fn count(&self, expected: &LifecycleEvent) -> usize {
        self.events()
            .iter()
            .filter(|event| *event == expected)
            .count()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn starting(&self, pid: u32) {
        self.record(LifecycleEvent::Starting(pid));
    }

    fn lock_acquired(&self, lock: &ProcessLock) {
        self.record(LifecycleEvent::LockAcquired(lock.pid()));
    }

    fn stale_lock_reclaimed(&self, _path: &Path, stale_pid: u32) {
        self.record(LifecycleEvent::StaleLockReclaimed(stale_pid));
    }

    fn tick_completed(&self, report: TickReport<'_>) {
        self.record(LifecycleEvent::TickCompleted {
            tick: report.tick,
            output: report.output.to_string(),
        });
    }

    fn tick_failed(&self, tick: u64, error: &dyn Error) {
        self.record(LifecycleEvent::TickFailed {
            tick,
            message: error.to_string(),
        });
    }

    fn reload_ignored(&self) {
        self.record(LifecycleEvent::ReloadIgnored);
    }

    fn shutdown_requested(&self) {
        self.record(LifecycleEvent::ShutdownRequested);
    }

    fn stopping(&self) {
        self.record(LifecycleEvent::Stopping);
    }

    fn release_failed(&self, error: &LockError) {
        self.record(LifecycleEvent::ReleaseFailed(error.to_string()));
    }

    fn terminated(&self, ticks: u64) {
        self.record(LifecycleEvent::Terminated(ticks));
    }

    fn setup_failed(&self, error: &LaunchError) {
        self.record(LifecycleEvent::SetupFailed {
            message: error.to_string(),
            contention: error.is_contention(),
        });
    }
}
