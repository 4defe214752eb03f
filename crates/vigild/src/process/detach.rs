//! Detaches the daemon from its launching terminal and session.

use std::os::fd::RawFd;
use std::process;

use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO, c_long};
use nix::sys::stat::{Mode, umask};
use nix::unistd::{ForkResult, SysconfVar, chdir, close, dup2, fork, setsid, sysconf};
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Descriptor ceiling used when the platform reports no open-file limit.
pub const FALLBACK_DESCRIPTOR_LIMIT: RawFd = 8192;

const NULL_DEVICE: &str = "/dev/null";

/// Abstraction over detachment strategies.
pub trait Detacher {
    /// Turns the calling process into a background service.
    ///
    /// Implementations that fork must only be invoked while the process is
    /// still single-threaded.
    fn detach(&self) -> Result<(), DetachError>;
}

/// Errors surfaced while detaching from the terminal.
#[derive(Debug, Error)]
pub enum DetachError {
    /// The first fork failed.
    #[error("failed to fork the launching process: {source}")]
    FirstFork {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Creating a new session failed.
    #[error("failed to create a new session: {source}")]
    Session {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The second fork failed.
    #[error("failed to fork the session leader: {source}")]
    SecondFork {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Changing to the filesystem root failed.
    #[error("failed to change working directory to '/': {source}")]
    WorkingDirectory {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The null device could not be opened.
    #[error("failed to open /dev/null: {source}")]
    NullDevice {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The null device did not land on standard input.
    #[error("/dev/null opened as descriptor {descriptor} instead of standard input")]
    NullDescriptor {
        /// Descriptor returned by `open`.
        descriptor: RawFd,
    },
    /// Duplicating standard input onto an output stream failed.
    #[error("failed to redirect descriptor {descriptor} to /dev/null: {source}")]
    Redirect {
        /// Descriptor that could not be redirected.
        descriptor: RawFd,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

/// Detacher that keeps the process in the foreground.
///
/// Used when a service manager already supervises the daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDetacher;

impl Detacher for NoopDetacher {
    fn detach(&self) -> Result<(), DetachError> {
        Ok(())
    }
}

/// Detacher performing the classic double-fork sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDetacher;

impl SystemDetacher {
    /// Builds a new system detacher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Detacher for SystemDetacher {
    fn detach(&self) -> Result<(), DetachError> {
        debug!(target: PROCESS_TARGET, "detaching from controlling terminal");
        fork_and_exit_parent().map_err(|source| DetachError::FirstFork { source })?;
        setsid().map_err(|source| DetachError::Session { source })?;
        // The session leader exits so the survivor can never reacquire a
        // controlling terminal.
        fork_and_exit_parent().map_err(|source| DetachError::SecondFork { source })?;
        let _previous_mask = umask(Mode::empty());
        chdir("/").map_err(|source| DetachError::WorkingDirectory { source })?;
        close_inherited_descriptors(descriptor_ceiling(open_file_limit()));
        redirect_standard_streams()
    }
}

fn fork_and_exit_parent() -> Result<(), Errno> {
    // SAFETY: detachment happens before the daemon starts any thread, so the
    // child inherits a consistent copy of the address space.
    match unsafe { fork() }? {
        ForkResult::Parent { .. } => process::exit(0),
        ForkResult::Child => Ok(()),
    }
}

fn open_file_limit() -> Option<c_long> {
    sysconf(SysconfVar::OPEN_MAX).ok().flatten()
}

/// Number of descriptors to close given the reported open-file limit.
pub(crate) fn descriptor_ceiling(limit: Option<c_long>) -> RawFd {
    limit
        .filter(|value| *value > 0)
        .map_or(FALLBACK_DESCRIPTOR_LIMIT, |value| {
            RawFd::try_from(value).unwrap_or(RawFd::MAX)
        })
}

fn close_inherited_descriptors(ceiling: RawFd) {
    for descriptor in 0..ceiling {
        // Most descriptors below the ceiling are not open; EBADF is expected.
        close(descriptor).ok();
    }
}

fn redirect_standard_streams() -> Result<(), DetachError> {
    let descriptor = open(NULL_DEVICE, OFlag::O_RDWR, Mode::empty())
        .map_err(|source| DetachError::NullDevice { source })?;
    if descriptor != STDIN_FILENO {
        return Err(DetachError::NullDescriptor { descriptor });
    }
    for target in [STDOUT_FILENO, STDERR_FILENO] {
        dup2(STDIN_FILENO, target)
            .map_err(|source| DetachError::Redirect {
                descriptor: target,
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, FALLBACK_DESCRIPTOR_LIMIT)]
    #[case(Some(-1), FALLBACK_DESCRIPTOR_LIMIT)]
    #[case(Some(0), FALLBACK_DESCRIPTOR_LIMIT)]
    #[case(Some(1024), 1024)]
    fn descriptor_ceiling_falls_back_when_limit_unknown(
        #[case] limit: Option<c_long>,
        #[case] expected: RawFd,
    ) {
        assert_eq!(descriptor_ceiling(limit), expected);
    }

    #[rstest]
    fn noop_detacher_succeeds_without_side_effects() {
        let cwd = std::env::current_dir().expect("cwd should resolve");
        NoopDetacher.detach().expect("noop detach should succeed");
        assert_eq!(std::env::current_dir().expect("cwd should resolve"), cwd);
    }
}
