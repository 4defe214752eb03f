//! Exclusive, persisted proof that a single daemon instance is running.
//!
//! The lock file is opened without truncation and locked with a
//! non-blocking `flock`; only the holder rewrites its content. The OS drops
//! the advisory lock when the descriptor closes, so a crashed instance leaves
//! a stale but unlocked file that the next start reclaims.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process;
use std::str;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, Flock, FlockArg, fcntl};
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

const LOCK_FILE_MODE: u32 = 0o600;

/// Errors raised while acquiring or releasing the instance lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock file could not be opened or created.
    #[error("failed to open lock file '{path}': {source}")]
    Open {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Marking the descriptor close-on-exec failed.
    #[error("failed to set close-on-exec on lock file '{path}': {source}")]
    CloseOnExec {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Another live process holds the lock.
    #[error("another instance is already running: '{path}' is locked{}", holder_suffix(.holder.as_ref()))]
    AlreadyRunning {
        /// Lock file path.
        path: PathBuf,
        /// PID recorded by the holder, when readable.
        holder: Option<u32>,
    },
    /// Locking failed for a reason other than contention.
    #[error("failed to lock '{path}': {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Truncating the lock file failed.
    #[error("failed to truncate lock file '{path}': {source}")]
    Truncate {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID failed.
    #[error("failed to write pid to lock file '{path}': {source}")]
    Write {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The PID was only partially written.
    #[error("short write to lock file '{path}': wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Lock file path.
        path: PathBuf,
        /// Bytes actually written.
        written: usize,
        /// Bytes that should have been written.
        expected: usize,
    },
    /// Removing the lock file during release failed.
    #[error("failed to remove lock file '{path}': {source}")]
    Remove {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Releasing the advisory lock failed.
    #[error("failed to unlock '{path}': {source}")]
    Unlock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

impl LockError {
    /// Reports whether the error means another instance holds the lock.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. })
    }
}

fn holder_suffix(holder: Option<&u32>) -> String {
    holder.map_or_else(String::new, |pid| format!(" by pid {pid}"))
}

/// An exclusively locked lock file naming the current process.
pub struct ProcessLock {
    path: PathBuf,
    file: Flock<File>,
    pid: u32,
    stale_pid: Option<u32>,
}

impl ProcessLock {
    /// Acquires the lock at `lock_path` and records the current PID in it.
    ///
    /// Fails with [`LockError::AlreadyRunning`] without touching the file when
    /// another process holds the lock.
    pub fn acquire(lock_path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = lock_path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;
        set_close_on_exec(&file, &path)?;
        let locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => locked,
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                let holder = read_holder(&path);
                return Err(LockError::AlreadyRunning { path, holder });
            }
            Err((_, source)) => return Err(LockError::Lock { path, source }),
        };

        let pid = process::id();
        let stale_pid = record_pid(&locked, &path, pid)?;
        debug!(
            target: PROCESS_TARGET,
            pid,
            file = %path.display(),
            "instance lock acquired"
        );
        Ok(Self {
            path,
            file: locked,
            pid,
            stale_pid,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// PID written into the lock file.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// PID left behind by an instance that terminated without releasing.
    #[must_use]
    pub const fn stale_pid(&self) -> Option<u32> {
        self.stale_pid
    }

    /// Removes the lock file, then unlocks and closes the descriptor.
    ///
    /// The file is unlinked while the lock is still held, which narrows but
    /// does not close the usual pidfile race: a competing start that opened
    /// the old inode before the unlink can still lock that orphaned inode
    /// once it is unlocked here, while a third start creates a fresh file at
    /// the same path. Both would then believe they are the only instance.
    pub fn release(self) -> Result<(), LockError> {
        let Self { path, file, .. } = self;
        let removed = fs::remove_file(&path).map_err(|source| LockError::Remove {
            path: path.clone(),
            source,
        });
        let unlocked = file
            .unlock()
            .map(drop)
            .map_err(|(_, source)| LockError::Unlock { path, source });
        removed.and(unlocked)
    }
}

impl fmt::Debug for ProcessLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessLock")
            .field("path", &self.path)
            .field("pid", &self.pid)
            .field("stale_pid", &self.stale_pid)
            .finish_non_exhaustive()
    }
}

impl AsRawFd for ProcessLock {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    let mut options = OpenOptions::new();
    options
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(LOCK_FILE_MODE);
    options.open(path).map_err(|source| LockError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn set_close_on_exec(file: &File, path: &Path) -> Result<(), LockError> {
    let descriptor = file.as_raw_fd();
    let to_error = |source| LockError::CloseOnExec {
        path: path.to_path_buf(),
        source,
    };
    let current = fcntl(descriptor, FcntlArg::F_GETFD).map_err(to_error)?;
    let flags = FdFlag::from_bits_truncate(current) | FdFlag::FD_CLOEXEC;
    fcntl(descriptor, FcntlArg::F_SETFD(flags)).map_err(to_error)?;
    Ok(())
}

/// Replaces the file content with `"<pid>\n"`, returning any stale PID found.
///
/// Unreadable or non-UTF-8 leftovers are not an error: the lock is already
/// held, so whatever the file contained is overwritten.
fn record_pid(file: &File, path: &Path, pid: u32) -> Result<Option<u32>, LockError> {
    let mut handle = file;
    let mut previous = Vec::new();
    let stale_pid = match handle.read_to_end(&mut previous) {
        Ok(_) => str::from_utf8(&previous).ok().and_then(parse_pid),
        Err(error) => {
            debug!(
                target: PROCESS_TARGET,
                file = %path.display(),
                %error,
                "previous lock file content unreadable"
            );
            None
        }
    };

    let truncate_error = |source| LockError::Truncate {
        path: path.to_path_buf(),
        source,
    };
    handle.set_len(0).map_err(truncate_error)?;
    handle.seek(SeekFrom::Start(0)).map_err(truncate_error)?;

    let payload = format!("{pid}\n");
    let write_error = |source| LockError::Write {
        path: path.to_path_buf(),
        source,
    };
    let written = handle.write(payload.as_bytes()).map_err(write_error)?;
    if written != payload.len() {
        return Err(LockError::ShortWrite {
            path: path.to_path_buf(),
            written,
            expected: payload.len(),
        });
    }
    handle.sync_all().map_err(write_error)?;
    Ok(stale_pid)
}

fn read_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| parse_pid(&content))
}

fn parse_pid(content: &str) -> Option<u32> {
    content.trim().parse::<u32>().ok()
}
