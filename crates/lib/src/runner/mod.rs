//! Execution of I/O-bound units of work.
//!
//! Outside a transaction work is spawned onto the tokio runtime and the
//! caller gets a handle to await later. Inside a transaction the store's
//! transaction object must not see concurrent calls, so work runs inline and
//! the handle comes back already complete.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::{Result, session::Session};

mod errors;

pub use errors::{BatchError, TaskError};

/// The pending or finished result of one unit of work.
#[derive(Debug)]
pub enum TaskHandle<T> {
    /// Work that already ran inline.
    Ready(Result<T>),
    /// Work running on a background task.
    Spawned(JoinHandle<Result<T>>),
}

impl<T> TaskHandle<T> {
    /// A handle holding a finished result.
    pub fn ready(result: Result<T>) -> Self {
        TaskHandle::Ready(result)
    }

    /// Returns true if the result is available without waiting.
    pub fn is_ready(&self) -> bool {
        match self {
            TaskHandle::Ready(_) => true,
            TaskHandle::Spawned(handle) => handle.is_finished(),
        }
    }

    /// Waits for the work to finish and returns its result.
    pub async fn wait(self) -> Result<T> {
        match self {
            TaskHandle::Ready(result) => result,
            TaskHandle::Spawned(handle) => match handle.await {
                Ok(result) => result,
                Err(err) => Err(TaskError::Aborted {
                    reason: err.to_string(),
                }
                .into()),
            },
        }
    }
}

/// Runs `work` in the scope of `session`.
///
/// The work is wrapped in [`Session::guard`], so cancelling the session or
/// passing its deadline ends the handle with a [`TaskError`].
pub async fn run<T, F>(session: &Session, work: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    if session.in_transaction() {
        trace!("running task inline");
        return TaskHandle::ready(session.guard(work).await);
    }
    let session = session.clone();
    TaskHandle::Spawned(tokio::spawn(async move { session.guard(work).await }))
}

/// Waits for every handle, in order, keeping every outcome.
pub async fn join_all<T>(handles: Vec<TaskHandle<T>>) -> Vec<Result<T>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.wait().await);
    }
    results
}

/// Collapses per-operation outcomes into one result.
///
/// All successes yield `Ok`; any failure yields a single
/// [`Error::Batch`](crate::Error::Batch) listing every failure.
pub fn combine<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(err) => failures.push(err),
        }
    }
    if failures.is_empty() {
        Ok(values)
    } else {
        Err(BatchError::new(failures).into())
    }
}
