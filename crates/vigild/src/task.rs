//! The work performed on every tick of the running loop.

use std::error::Error;
use std::fmt::Display;

use thiserror::Error;

/// Callback invoked once per tick.
///
/// Any `FnMut() -> Result<T, E>` closure with a displayable output and a
/// standard error type is a task.
pub trait PeriodicTask {
    /// Value reported after a successful tick.
    type Output: Display;
    /// Error reported after a failed tick.
    type Error: Error;

    /// Performs one unit of work.
    fn run_tick(&mut self) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> PeriodicTask for F
where
    F: FnMut() -> Result<T, E>,
    T: Display,
    E: Error,
{
    type Output = T;
    type Error = E;

    fn run_tick(&mut self) -> Result<T, E> {
        self()
    }
}

/// Errors produced by [`FibonacciTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The next term no longer fits in a `u64`.
    #[error("fibonacci sequence overflowed after {terms} terms; restarting")]
    Overflow {
        /// Terms emitted before the overflow.
        terms: u64,
    },
}

/// Emits successive Fibonacci numbers, one per tick.
///
/// When the next term would overflow, the tick fails and the sequence
/// restarts from the beginning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciTask {
    current: u64,
    next: u64,
    terms: u64,
}

impl Default for FibonacciTask {
    fn default() -> Self {
        Self::new()
    }
}

impl FibonacciTask {
    /// Builds a task positioned at the first term.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: 1,
            next: 1,
            terms: 0,
        }
    }
}

impl PeriodicTask for FibonacciTask {
    type Output = u64;
    type Error = TaskError;

    fn run_tick(&mut self) -> Result<u64, TaskError> {
        let term = self.current;
        let Some(following) = self.current.checked_add(self.next) else {
            let terms = self.terms;
            *self = Self::new();
            return Err(TaskError::Overflow { terms });
        };
        self.current = self.next;
        self.next = following;
        self.terms += 1;
        Ok(term)
    }
}
