//! The daemon state machine: setup, the ticking loop, and orderly shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::report::{LifecycleReporter, TickReport};
use crate::task::PeriodicTask;
use crate::telemetry::{self, TelemetrySettings};

use super::detach::Detacher;
use super::errors::LaunchError;
use super::lock::ProcessLock;
use super::signals::{RunFlag, SignalEvent, SignalInstaller};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Phases of a daemon run. Each state has exactly one successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Detaching, attaching the log sink, locking, and installing handlers.
    Starting,
    /// Invoking the periodic task once per tick.
    Running,
    /// Releasing the instance lock.
    Stopping,
    /// Finished; nothing further happens.
    Terminated,
}

impl LifecycleState {
    /// Returns the state that follows this one, if any.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Starting => Some(Self::Running),
            Self::Running => Some(Self::Stopping),
            Self::Stopping => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }
}

/// Values that shape a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Absolute path of the lock file.
    pub lock_path: PathBuf,
    /// Sleep between two ticks.
    pub tick_interval: Duration,
    /// Log sink attached after detachment.
    pub telemetry: TelemetrySettings,
}

/// Collaborators required to drive the lifecycle.
pub struct LifecyclePlan<D, S, T> {
    /// Run settings.
    pub settings: LifecycleSettings,
    /// Detachment strategy.
    pub detacher: D,
    /// Signal handler installer.
    pub signals: S,
    /// Work performed every tick.
    pub task: T,
    /// Destination for lifecycle events.
    pub reporter: Arc<dyn LifecycleReporter>,
}

/// Drives a daemon from `Starting` to `Terminated`.
pub struct Lifecycle<D, S, T> {
    settings: LifecycleSettings,
    detacher: D,
    signals: S,
    task: T,
    reporter: Arc<dyn LifecycleReporter>,
    state: LifecycleState,
    ticks: u64,
}

impl<D, S, T> Lifecycle<D, S, T>
where
    D: Detacher,
    S: SignalInstaller,
    T: PeriodicTask,
{
    /// Builds a lifecycle in the `Starting` state.
    #[must_use]
    pub fn new(plan: LifecyclePlan<D, S, T>) -> Self {
        let LifecyclePlan {
            settings,
            detacher,
            signals,
            task,
            reporter,
        } = plan;
        Self {
            settings,
            detacher,
            signals,
            task,
            reporter,
            state: LifecycleState::Starting,
            ticks: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Number of times the periodic task has been invoked.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs setup, the ticking loop, and shutdown.
    ///
    /// Returns an error only when setup fails, in which case the state stays
    /// `Starting`. Callback and release failures are reported and absorbed.
    pub fn run(&mut self) -> Result<(), LaunchError> {
        let (lock, flag) = match self.start() {
            Ok(started) => started,
            Err(error) => {
                self.reporter.setup_failed(&error);
                return Err(error);
            }
        };
        self.advance();
        self.steady(&flag);
        self.advance();
        self.stop(lock);
        self.advance();
        self.reporter.terminated(self.ticks);
        Ok(())
    }

    fn start(&self) -> Result<(ProcessLock, RunFlag), LaunchError> {
        // The sink is attached even when detaching failed so the failure
        // can still be reported.
        let detached = self.detacher.detach();
        let attached = telemetry::initialise(&self.settings.telemetry);
        detached?;
        let handle = attached?;
        debug!(
            target: LIFECYCLE_TARGET,
            sink = ?handle.sink(),
            "log sink attached"
        );

        let lock = ProcessLock::acquire(&self.settings.lock_path)?;
        self.reporter.lock_acquired(&lock);
        if let Some(stale_pid) = lock.stale_pid() {
            self.reporter.stale_lock_reclaimed(lock.path(), stale_pid);
        }

        let flag = self.signals.install()?;
        self.reporter.starting(lock.pid());
        Ok((lock, flag))
    }

    fn steady(&mut self, flag: &RunFlag) {
        loop {
            match flag.take() {
                Some(SignalEvent::ShutdownRequested) => {
                    self.reporter.shutdown_requested();
                    return;
                }
                Some(SignalEvent::ReloadRequested) => self.reporter.reload_ignored(),
                None => {}
            }
            flag.wait(self.settings.tick_interval);
            self.tick();
        }
    }

    fn tick(&mut self) {
        let tick = self.ticks + 1;
        match self.task.run_tick() {
            Ok(output) => self.reporter.tick_completed(TickReport {
                tick,
                output: &output,
            }),
            Err(error) => self.reporter.tick_failed(tick, &error),
        }
        self.ticks = tick;
    }

    fn stop(&self, lock: ProcessLock) {
        self.reporter.stopping();
        if let Err(error) = lock.release() {
            self.reporter.release_failed(&error);
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.successor() {
            debug!(
                target: LIFECYCLE_TARGET,
                from = ?self.state,
                to = ?next,
                "lifecycle transition"
            );
            self.state = next;
        }
    }
}
