//! Error types for background task execution.

use thiserror::Error;

/// Errors raised by the task runner itself rather than by the work it runs.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TaskError {
    /// The session was cancelled before the work finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// The session deadline passed before the work finished.
    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    /// The background task panicked or was aborted.
    #[error("Background task aborted: {reason}")]
    Aborted {
        /// Description of how the task ended
        reason: String,
    },
}

impl TaskError {
    /// Check if the work was stopped by cancellation or a deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled | TaskError::DeadlineExceeded)
    }

    /// Check if this error indicates an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::DeadlineExceeded)
    }
}

impl From<TaskError> for crate::Error {
    fn from(err: TaskError) -> Self {
        crate::Error::Task(err)
    }
}

/// Several independent operations of one batch failed.
///
/// The message lists every failure on its own line. Operations that
/// succeeded are not reported here; callers inspect their inputs instead.
#[derive(Debug, Error)]
#[error("{}", render(.failures))]
pub struct BatchError {
    failures: Vec<crate::Error>,
}

fn render(failures: &[crate::Error]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl BatchError {
    pub fn new(failures: Vec<crate::Error>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[crate::Error] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<crate::Error> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl From<BatchError> for crate::Error {
    fn from(err: BatchError) -> Self {
        crate::Error::Batch(err)
    }
}
