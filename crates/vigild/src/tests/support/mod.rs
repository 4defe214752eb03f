//! Test harness utilities shared by the unit and behavioural suites.

mod doubles;
mod reporter;
mod world;

pub use doubles::{ScriptedFailure, ScriptedTask, TestSignalInstaller, test_settings};
pub use reporter::{LifecycleEvent, RecordingReporter};
pub use world::{LifecycleWorld, LockWorld, read};
