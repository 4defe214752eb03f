//! Signal and task doubles that script a lifecycle run.

use std::io;
use std::time::Duration;

use nix::libc::{EINVAL, c_int};
use tempfile::TempDir;
use thiserror::Error;

use vigil_config::{LogFormat, LogSink};

use crate::process::{LifecycleSettings, RunFlag, SignalError, SignalEvent, SignalInstaller};
use crate::task::PeriodicTask;
use crate::telemetry::TelemetrySettings;

/// Settings pointing the lock file into `dir` with a one millisecond tick.
#[must_use]
pub fn test_settings(dir: &TempDir) -> LifecycleSettings {
    LifecycleSettings {
        lock_path: dir.path().join("vigild.pid"),
        tick_interval: Duration::from_millis(1),
        telemetry: TelemetrySettings {
            filter: "off".to_owned(),
            format: LogFormat::Compact,
            sink: LogSink::Stderr,
        },
    }
}

/// Installer handing out a flag the test can raise directly.
#[derive(Debug, Clone, Default)]
pub struct TestSignalInstaller {
    flag: RunFlag,
    failing_signal: Option<c_int>,
}

impl TestSignalInstaller {
    /// Builds an installer that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an installer that refuses `signal`.
    #[must_use]
    pub fn failing(signal: c_int) -> Self {
        Self {
            failing_signal: Some(signal),
            ..Self::default()
        }
    }

    /// The flag returned by [`SignalInstaller::install`].
    #[must_use]
    pub fn flag(&self) -> RunFlag {
        self.flag.clone()
    }
}

impl SignalInstaller for TestSignalInstaller {
    fn install(&self) -> Result<RunFlag, SignalError> {
        match self.failing_signal {
            Some(signal) => Err(SignalError::Install {
                signal,
                source: io::Error::from_raw_os_error(EINVAL),
            }),
            None => Ok(self.flag.clone()),
        }
    }
}

/// Failure injected by [`ScriptedTask`].
#[derive(Debug, Error)]
#[error("scripted failure at tick {tick}")]
pub struct ScriptedFailure {
    /// Tick that failed.
    pub tick: u64,
}

/// Task that counts its invocations and raises requests on cue.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTask {
    flag: RunFlag,
    calls: u64,
    shutdown_after: Option<u64>,
    reload_at: Option<u64>,
    failing_ticks: Vec<u64>,
}

impl ScriptedTask {
    /// Builds a task that raises requests on `flag`.
    #[must_use]
    pub fn new(flag: RunFlag) -> Self {
        Self {
            flag,
            ..Self::default()
        }
    }

    /// Requests shutdown once `ticks` invocations have completed.
    #[must_use]
    pub fn shutdown_after(mut self, ticks: u64) -> Self {
        self.shutdown_after = Some(ticks);
        self
    }

    /// Requests a reload during invocation `tick`.
    #[must_use]
    pub fn reload_at(mut self, tick: u64) -> Self {
        self.reload_at = Some(tick);
        self
    }

    /// Fails invocation `tick`.
    #[must_use]
    pub fn failing_at(mut self, tick: u64) -> Self {
        self.failing_ticks.push(tick);
        self
    }
}

impl PeriodicTask for ScriptedTask {
    type Output = String;
    type Error = ScriptedFailure;

    fn run_tick(&mut self) -> Result<String, ScriptedFailure> {
        self.calls += 1;
        let tick = self.calls;
        if self.reload_at == Some(tick) {
            self.flag.raise(SignalEvent::ReloadRequested);
        }
        if self.shutdown_after == Some(tick) {
            self.flag.raise(SignalEvent::ShutdownRequested);
        }
        if self.failing_ticks.contains(&tick) {
            return Err(ScriptedFailure { tick });
        }
        Ok(format!("tick {tick}"))
    }
}
