//! A `tracing` writer that hands each formatted event to syslog(3).
//!
//! A detached daemon has no terminal, and journald is not always present, so
//! the system logger is the sink of last resort.

use std::ffi::{CStr, CString};
use std::io;
use std::sync::Once;

use nix::libc::{self, c_int};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

static IDENTITY: &CStr = c"vigild";
static OPENED: Once = Once::new();

/// Connection to the system logger.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyslogWriter;

impl SyslogWriter {
    /// Opens the process-wide syslog connection once.
    pub(crate) fn connect() -> Self {
        OPENED.call_once(|| {
            // SAFETY: `IDENTITY` is a static C string, so the pointer
            // openlog(3) retains stays valid for the life of the process.
            unsafe {
                libc::openlog(
                    IDENTITY.as_ptr(),
                    libc::LOG_PID | libc::LOG_NDELAY,
                    libc::LOG_DAEMON,
                );
            }
        });
        Self
    }
}

impl<'a> MakeWriter<'a> for SyslogWriter {
    type Writer = SyslogRecord;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogRecord::new(libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogRecord::new(priority_for(*meta.level()))
    }
}

/// One event, buffered until the formatter drops it.
#[derive(Debug)]
pub(crate) struct SyslogRecord {
    priority: c_int,
    buffer: Vec<u8>,
}

impl SyslogRecord {
    const fn new(priority: c_int) -> Self {
        Self {
            priority,
            buffer: Vec::new(),
        }
    }
}

impl io::Write for SyslogRecord {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogRecord {
    fn drop(&mut self) {
        let Some(message) = record_message(&self.buffer) else {
            return;
        };
        // SAFETY: the format is a static "%s" and `message` is a valid C
        // string that outlives the call.
        unsafe {
            libc::syslog(self.priority, c"%s".as_ptr(), message.as_ptr());
        }
    }
}

fn priority_for(level: Level) -> c_int {
    match level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        _ => libc::LOG_DEBUG,
    }
}

/// Strips the trailing newline and replaces interior NULs.
fn record_message(buffer: &[u8]) -> Option<CString> {
    let trimmed = buffer.trim_ascii_end();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: Vec<u8> = trimmed
        .iter()
        .map(|&byte| if byte == 0 { b' ' } else { byte })
        .collect();
    CString::new(cleaned).ok()
}
