//! Defines the unified error surface for daemon launch and supervision.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

use super::detach::DetachError;
use super::lock::LockError;
use super::signals::SignalError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The directory holding the lock file could not be prepared.
    #[error("failed to prepare lock directory '{path}': {source}")]
    LockDirectory {
        /// Directory that could not be created or resolved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Detaching from the terminal failed.
    #[error("failed to detach: {source}")]
    Detach {
        /// Underlying detachment error.
        #[source]
        source: DetachError,
    },
    /// The log sink could not be attached.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The instance lock could not be acquired.
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying installation error.
        #[source]
        source: SignalError,
    },
}

impl LaunchError {
    /// Reports whether launch failed because another instance is running.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        match self {
            Self::Lock(error) => error.is_contention(),
            _ => false,
        }
    }
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<DetachError> for LaunchError {
    fn from(source: DetachError) -> Self {
        Self::Detach { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<SignalError> for LaunchError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}
