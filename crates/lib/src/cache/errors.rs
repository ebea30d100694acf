//! Cache error types.
//!
//! Errors from the shared second tier are logged and dropped by
//! [`TieredCache`](super::TieredCache); errors from the session tier reach the
//! caller because they indicate a broken session rather than a flaky backend.

use thiserror::Error;

use crate::address::Address;

/// Errors that can occur while reading or writing a cache tier.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CacheError {
    /// A cache lock was poisoned by a panicking writer.
    #[error("Cache lock poisoned: {cache}")]
    LockPoisoned {
        /// Which cache the lock belongs to
        cache: &'static str,
    },

    /// A stored entry could not be turned back into a document.
    #[error("Corrupt cache entry for {address}: {reason}")]
    CorruptEntry {
        /// The address whose entry is unreadable
        address: Address,
        /// Description of the problem
        reason: String,
    },

    /// The cache backend itself failed.
    #[error("Cache backend unavailable: {reason}")]
    Unavailable {
        /// Description of the backend failure
        reason: String,
    },
}

impl CacheError {
    /// Check if this error indicates a poisoned lock.
    pub fn is_lock_poisoned(&self) -> bool {
        matches!(self, CacheError::LockPoisoned { .. })
    }

    /// Check if this error indicates unreadable cached data.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, CacheError::CorruptEntry { .. })
    }

    /// Check if this error indicates the backend could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::Unavailable { .. })
    }
}

impl From<CacheError> for crate::Error {
    fn from(err: CacheError) -> Self {
        crate::Error::Cache(err)
    }
}
