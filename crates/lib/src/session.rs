//! Explicit request and transaction scope.
//!
//! A [`Session`] is created per logical request and passed to every client
//! call. It owns the first cache tier for that request, remembers whether the
//! request runs inside a store transaction, and carries the cancellation and
//! deadline that every store call and background task must honour.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{sync::watch, time::Instant};

use crate::{Result, cache::SessionCache, runner::TaskError, store::TxId};

/// Cooperative cancellation flag shared by clones.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every clone of this token. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail early.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Scope of one request or one transaction.
///
/// Clones share the cache, the cancellation token and the deadline.
#[derive(Debug, Clone, Default)]
pub struct Session {
    cache: Arc<SessionCache>,
    transaction: Option<TxId>,
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl Session {
    /// A fresh session with an empty cache and no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Derives the scope of a transaction: a private, empty cache bound to
    /// `tx`, sharing this session's cancellation and deadline.
    pub(crate) fn for_transaction(&self, tx: TxId) -> Self {
        Self {
            cache: Arc::new(SessionCache::new()),
            transaction: Some(tx),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn transaction(&self) -> Option<TxId> {
        self.transaction
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Cancels this session and every clone of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `work`, giving up with a task error as soon as the session is
    /// cancelled or its deadline passes.
    pub async fn guard<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(TaskError::Cancelled.into());
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(TaskError::DeadlineExceeded.into());
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = work => result,
            _ = self.cancel.cancelled() => Err(TaskError::Cancelled.into()),
            _ = expired => Err(TaskError::DeadlineExceeded.into()),
        }
    }
}
