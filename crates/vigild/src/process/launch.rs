//! Resolves configuration and wires the production collaborators together.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{self, Path, PathBuf};
use std::sync::Arc;

use ortho_config::OrthoConfig;
use vigil_config::Config;

use crate::report::{LifecycleReporter, StructuredReporter};
use crate::task::{FibonacciTask, PeriodicTask};
use crate::telemetry::{self, TelemetrySettings};

use super::detach::{NoopDetacher, SystemDetacher};
use super::errors::LaunchError;
use super::lifecycle::{Lifecycle, LifecyclePlan, LifecycleSettings};
use super::signals::{HandledSignals, SystemSignalBridge};

const LOCK_DIRECTORY_MODE: u32 = 0o700;

/// Runs the daemon using process configuration and the production task.
pub fn run_daemon() -> Result<(), LaunchError> {
    let reporter: Arc<dyn LifecycleReporter> = Arc::new(StructuredReporter::new());
    match Config::load() {
        Ok(config) => run_daemon_with(&config, FibonacciTask::new(), reporter),
        Err(source) => {
            let error = LaunchError::from(source);
            // Without configuration nothing has detached yet, so the
            // terminal is still the right place for the failure.
            if telemetry::initialise(&TelemetrySettings::fallback()).is_ok() {
                reporter.setup_failed(&error);
            }
            Err(error)
        }
    }
}

/// Runs the daemon with resolved configuration and an injected task.
pub fn run_daemon_with<T>(
    config: &Config,
    task: T,
    reporter: Arc<dyn LifecycleReporter>,
) -> Result<(), LaunchError>
where
    T: PeriodicTask,
{
    let mode = config.launch_mode();
    let settings = LifecycleSettings {
        lock_path: prepare_lock_path(config.lock_path().as_std_path())?,
        tick_interval: config.tick_interval(),
        telemetry: TelemetrySettings::from_config(config),
    };
    let signals = SystemSignalBridge::new(HandledSignals::for_mode(mode));
    if mode.detaches() {
        let plan = LifecyclePlan {
            settings,
            detacher: SystemDetacher::new(),
            signals,
            task,
            reporter,
        };
        Lifecycle::new(plan).run()
    } else {
        let plan = LifecyclePlan {
            settings,
            detacher: NoopDetacher,
            signals,
            task,
            reporter,
        };
        Lifecycle::new(plan).run()
    }
}

/// Makes the lock path absolute and creates its parent directory.
///
/// Detachment changes the working directory to `/`, so a relative path must
/// be resolved first.
fn prepare_lock_path(configured: &Path) -> Result<PathBuf, LaunchError> {
    let resolved = path::absolute(configured).map_err(|source| LaunchError::LockDirectory {
        path: configured.to_path_buf(),
        source,
    })?;
    if let Some(parent) = resolved.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        DirBuilder::new()
            .recursive(true)
            .mode(LOCK_DIRECTORY_MODE)
            .create(parent)
            .map_err(|source| LaunchError::LockDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(resolved)
}
