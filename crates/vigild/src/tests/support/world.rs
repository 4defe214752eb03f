//! BDD test worlds for lifecycle and lock scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::process::{
    Lifecycle, LifecyclePlan, LifecycleState, LockError, NoopDetacher, ProcessLock,
};
use crate::report::LifecycleReporter;

use super::doubles::{ScriptedTask, TestSignalInstaller, test_settings};
use super::reporter::RecordingReporter;

/// Outcome of a completed lifecycle run.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: Result<(), String>,
    pub state: LifecycleState,
    pub ticks: u64,
}

/// Scenario world driving an in-process lifecycle.
pub struct LifecycleWorld {
    dir: TempDir,
    signals: TestSignalInstaller,
    task: ScriptedTask,
    pub reporter: Arc<RecordingReporter>,
    outcome: Option<RunOutcome>,
}

impl LifecycleWorld {
    /// Builds a world whose task never asks to stop.
    #[must_use]
    pub fn new() -> Self {
        let signals = TestSignalInstaller::new();
        let task = ScriptedTask::new(signals.flag());
        Self {
            dir: TempDir::new().expect("temp dir"),
            signals,
            task,
            reporter: Arc::new(RecordingReporter::default()),
            outcome: None,
        }
    }

    /// Replaces the scripted task.
    pub fn script(&mut self, configure: impl FnOnce(ScriptedTask) -> ScriptedTask) {
        let task = ScriptedTask::new(self.signals.flag());
        self.task = configure(task);
    }

    /// Runs the lifecycle to completion.
    pub fn run(&mut self) {
        let reporter: Arc<dyn LifecycleReporter> = self.reporter.clone();
        let plan = LifecyclePlan {
            settings: test_settings(&self.dir),
            detacher: NoopDetacher,
            signals: self.signals.clone(),
            task: self.task.clone(),
            reporter,
        };
        let mut lifecycle = Lifecycle::new(plan);
        let result = lifecycle.run().map_err(|error| error.to_string());
        self.outcome = Some(RunOutcome {
            result,
            state: lifecycle.state(),
            ticks: lifecycle.ticks(),
        });
    }

    /// Outcome of the last run.
    #[must_use]
    pub fn outcome(&self) -> &RunOutcome {
        self.outcome.as_ref().expect("lifecycle has not run")
    }

    /// Lock file location used by the run.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        test_settings(&self.dir).lock_path
    }
}

impl Default for LifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Scenario world exercising two competing lock holders.
pub struct LockWorld {
    dir: TempDir,
    first: Option<ProcessLock>,
    second: Option<Result<ProcessLock, LockError>>,
    first_content: Option<String>,
}

impl LockWorld {
    /// Builds an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
            first: None,
            second: None,
            first_content: None,
        }
    }

    /// Lock file location shared by both holders.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("vigild.pid")
    }

    /// Acquires the lock as the first instance.
    pub fn acquire_first(&mut self) {
        let lock = ProcessLock::acquire(self.path()).expect("first acquisition");
        self.first_content = Some(read(lock.path()));
        self.first = Some(lock);
    }

    /// Attempts to acquire the lock as a second instance.
    pub fn acquire_second(&mut self) {
        self.second = Some(ProcessLock::acquire(self.path()));
    }

    /// Result of the second attempt.
    #[must_use]
    pub fn second(&self) -> &Result<ProcessLock, LockError> {
        self.second.as_ref().expect("second acquisition not attempted")
    }

    /// Content written by the first holder.
    #[must_use]
    pub fn first_content(&self) -> &str {
        self.first_content.as_deref().expect("first holder missing")
    }

    /// Releases the first holder's lock.
    pub fn release_first(&mut self) {
        let lock = self.first.take().expect("first holder missing");
        lock.release().expect("release");
    }
}

impl Default for LockWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a lock file into a string.
#[must_use]
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read lock file")
}
