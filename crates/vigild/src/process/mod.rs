//! Daemon process supervision: detachment, the instance lock, signal
//! handling, and the lifecycle state machine that ties them together.

pub(crate) mod detach;
mod errors;
pub(crate) mod launch;
pub(crate) mod lifecycle;
pub(crate) mod lock;
pub(crate) mod signals;

pub use detach::{DetachError, Detacher, NoopDetacher, SystemDetacher};
pub use errors::LaunchError;
pub use launch::{run_daemon, run_daemon_with};
pub use lifecycle::{Lifecycle, LifecyclePlan, LifecycleSettings, LifecycleState};
pub use lock::{LockError, ProcessLock};
pub use signals::{
    HandledSignals, RunFlag, SignalError, SignalEvent, SignalInstaller, SystemSignalBridge,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
