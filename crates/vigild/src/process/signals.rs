//! Translates asynchronous signal delivery into a pollable run flag.
//!
//! Handlers only set bits on an atomic word and write one byte to a
//! self-pipe; everything else happens on the main loop after it observes the
//! flag. The pipe lets the loop's tick wait end as soon as a signal lands.

use std::io::{self, ErrorKind, Read};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nix::libc::c_int;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use thiserror::Error;
use tracing::debug;

use vigil_config::LaunchMode;

use super::PROCESS_TARGET;

const RELOAD_BIT: usize = 0b01;
const SHUTDOWN_BIT: usize = 0b10;

/// Requests delivered to the main loop by signal handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// Re-read configuration. The daemon acknowledges and ignores it.
    ReloadRequested,
    /// Leave the running loop and stop cleanly.
    ShutdownRequested,
}

impl SignalEvent {
    const fn bit(self) -> usize {
        match self {
            Self::ReloadRequested => RELOAD_BIT,
            Self::ShutdownRequested => SHUTDOWN_BIT,
        }
    }
}

/// Pending signal requests shared between handlers and the main loop.
///
/// Clones observe the same underlying word and share the wake-up pipe.
#[derive(Debug, Clone, Default)]
pub struct RunFlag {
    pending: Arc<AtomicUsize>,
    wakeup: Option<Arc<UnixStream>>,
}

impl RunFlag {
    /// Builds a flag with no pending requests and no wake-up pipe.
    ///
    /// [`RunFlag::wait`] on such a flag always sleeps the full timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a flag whose [`RunFlag::wait`] ends early when a byte arrives on
    /// the returned write end.
    pub fn with_wakeup() -> io::Result<(Self, UnixStream)> {
        let (reader, writer) = UnixStream::pair()?;
        let flag = Self {
            pending: Arc::default(),
            wakeup: Some(Arc::new(reader)),
        };
        Ok((flag, writer))
    }

    /// Records `event` as pending. Safe to call from a signal handler.
    pub fn raise(&self, event: SignalEvent) {
        self.pending.fetch_or(event.bit(), Ordering::SeqCst);
    }

    /// Consumes all pending requests, reporting the most urgent one.
    ///
    /// A pending shutdown wins over a reload raised in the same interval.
    #[must_use]
    pub fn take(&self) -> Option<SignalEvent> {
        let pending = self.pending.swap(0, Ordering::SeqCst);
        if pending & SHUTDOWN_BIT != 0 {
            Some(SignalEvent::ShutdownRequested)
        } else if pending & RELOAD_BIT != 0 {
            Some(SignalEvent::ReloadRequested)
        } else {
            None
        }
    }

    /// Blocks for up to `timeout`, returning early when a signal wakes the
    /// flag.
    ///
    /// Wake-ups that arrived while nobody was waiting end the next wait
    /// immediately.
    pub fn wait(&self, timeout: Duration) {
        let Some(reader) = self.wakeup.as_deref() else {
            thread::sleep(timeout);
            return;
        };
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || reader.set_read_timeout(Some(remaining)).is_err() {
                return;
            }
            let mut drained = [0_u8; 64];
            let mut stream = reader;
            match stream.read(&mut drained) {
                Ok(0) => {
                    thread::sleep(remaining);
                    return;
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                _ => return,
            }
        }
    }

    fn handler_word(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pending)
    }
}

/// Signal numbers and the request each one raises.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandledSignals {
    bindings: Vec<(c_int, SignalEvent)>,
}

impl HandledSignals {
    /// Builds the standard bindings for a launch mode.
    ///
    /// `SIGHUP` reloads and `SIGTERM` stops. A foreground daemon also stops
    /// on `SIGINT` so that Ctrl-C works from the terminal.
    #[must_use]
    pub fn for_mode(mode: LaunchMode) -> Self {
        let bindings = Self::default()
            .with(SIGHUP, SignalEvent::ReloadRequested)
            .with(SIGTERM, SignalEvent::ShutdownRequested);
        match mode {
            LaunchMode::Background => bindings,
            LaunchMode::Foreground => bindings.with(SIGINT, SignalEvent::ShutdownRequested),
        }
    }

    /// Adds a binding from `signal` to `event`.
    #[must_use]
    pub fn with(mut self, signal: c_int, event: SignalEvent) -> Self {
        self.bindings.push((signal, event));
        self
    }

    /// Iterates over the configured bindings.
    pub fn iter(&self) -> impl Iterator<Item = (c_int, SignalEvent)> + '_ {
        self.bindings.iter().copied()
    }

    /// Returns the event bound to `signal`, if any.
    #[must_use]
    pub fn event_for(&self, signal: c_int) -> Option<SignalEvent> {
        self.iter()
            .find_map(|(bound, event)| (bound == signal).then_some(event))
    }
}

/// Errors raised while installing signal handlers.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The OS refused a handler registration.
    #[error("failed to install handler for signal {signal}: {source}")]
    Install {
        /// Signal number that could not be handled.
        signal: c_int,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The wake-up pipe could not be created or duplicated.
    #[error("failed to create signal wake-up pipe: {source}")]
    Wakeup {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Abstraction over handler installation.
pub trait SignalInstaller {
    /// Installs handlers and returns the flag they raise.
    fn install(&self) -> Result<RunFlag, SignalError>;
}

/// Installs process-wide handlers through `signal-hook`.
#[derive(Debug, Clone)]
pub struct SystemSignalBridge {
    signals: HandledSignals,
}

impl SystemSignalBridge {
    /// Builds a bridge for the given bindings.
    #[must_use]
    pub const fn new(signals: HandledSignals) -> Self {
        Self { signals }
    }
}

impl SignalInstaller for SystemSignalBridge {
    fn install(&self) -> Result<RunFlag, SignalError> {
        let (flag, writer) =
            RunFlag::with_wakeup().map_err(|source| SignalError::Wakeup { source })?;
        for (signal, event) in self.signals.iter() {
            let pending = flag.handler_word();
            let bit = event.bit();
            // SAFETY: the handler performs a single atomic `fetch_or`, which
            // is async-signal-safe.
            unsafe {
                signal_hook::low_level::register(signal, move || {
                    pending.fetch_or(bit, Ordering::SeqCst);
                })
            }
            .map_err(|source| SignalError::Install { signal, source })?;
            // Registered second so the bit is set before the waiter wakes.
            let wake = writer
                .try_clone()
                .map_err(|source| SignalError::Wakeup { source })?;
            signal_hook::low_level::pipe::register(signal, wake)
                .map_err(|source| SignalError::Install { signal, source })?;
            debug!(
                target: PROCESS_TARGET,
                signal,
                ?event,
                "signal handler installed"
            );
        }
        Ok(flag)
    }
}
