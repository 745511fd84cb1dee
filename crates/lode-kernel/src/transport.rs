//! Error transport between worker threads and result consumers.
//!
//! A failure inside a task body is captured as a [`WrappedError`] and rides
//! the ordinary result channel. It becomes a live error again only when the
//! consumer calls [`unwrap_result`], on the consumer's own thread.

use crate::error::{KernelError, TaskError};

/// Container carrying exactly one error across the worker/consumer
/// boundary. Immutable once constructed.
#[derive(Debug)]
pub struct WrappedError(TaskError);

impl WrappedError {
    /// Wrap a caught error object.
    pub fn new(error: TaskError) -> Self {
        Self(error)
    }

    /// Wrap a freshly constructed kernel error named by variant. Used when
    /// a type tag, not a live object, is at hand.
    pub fn from_kernel(error: KernelError) -> Self {
        Self(TaskError::from_kernel(error))
    }

    /// Borrow the held error without re-raising it.
    pub fn error(&self) -> &TaskError {
        &self.0
    }

    /// Consume the container, yielding the held error.
    pub fn into_error(self) -> TaskError {
        self.0
    }
}

/// Terminal state of one task execution.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The body returned normally.
    Completed(T),

    /// An error was transferred out of the body.
    Transferred(WrappedError),

    /// The body observed a kill signal and stopped.
    Killed,
}

impl<T> TaskOutcome<T> {
    /// Whether the body returned normally.
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }
}

/// Consumer-side unwrap: identity on values, re-raises transported
/// failures as errors on the calling thread.
///
/// This is the single place a transported failure becomes live again. The
/// consumer experiences the error as if it had been raised synchronously in
/// their own call; the originating stack is gone, the type and payload are
/// not.
pub fn unwrap_result<T>(outcome: TaskOutcome<T>) -> Result<T, TaskError> {
    match outcome {
        TaskOutcome::Completed(value) => Ok(value),
        TaskOutcome::Transferred(wrapped) => Err(wrapped.into_error()),
        TaskOutcome::Killed => Err(TaskError::from_kernel(KernelError::TaskKilled)),
    }
}
