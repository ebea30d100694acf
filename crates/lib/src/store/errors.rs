//! Store error types.
//!
//! These errors are surfaced verbatim by every layer above the store.

use thiserror::Error;

use super::TxId;
use crate::address::Address;

/// Errors that can occur during store operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document exists at the address.
    #[error("Document not found: {address}")]
    NotFound {
        /// The address that was looked up
        address: Address,
    },

    /// A create targeted an address that already holds a document.
    #[error("Document already exists: {address}")]
    AlreadyExists {
        /// The address that was written
        address: Address,
    },

    /// The transaction id is unknown, already committed or rolled back.
    #[error("Transaction not found: {tx}")]
    TransactionNotFound {
        /// The transaction id that was used
        tx: TxId,
    },

    /// Commit found that a staged create collides with a document written
    /// since the transaction began.
    #[error("Transaction {tx} conflicts on {address}")]
    TransactionConflict {
        /// The conflicting transaction
        tx: TxId,
        /// The address both sides wrote
        address: Address,
    },

    /// The collection and id do not form a valid document address.
    #[error("Invalid document path: {path}")]
    InvalidPath {
        /// The rejected path
        path: String,
    },

    /// The filter cannot be evaluated.
    #[error("Invalid query: {reason}")]
    InvalidQuery {
        /// Description of the problem
        reason: String,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Internal lock poisoning or other backend failure.
    #[error("Store backend failure: {reason}")]
    Backend {
        /// Description of the failure
        reason: String,
    },
}

impl StoreError {
    /// Check if this error indicates a document was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if this error indicates a write conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::AlreadyExists { .. } | StoreError::TransactionConflict { .. }
        )
    }

    /// Check if this error is related to transactions.
    pub fn is_transaction_error(&self) -> bool {
        matches!(
            self,
            StoreError::TransactionNotFound { .. } | StoreError::TransactionConflict { .. }
        )
    }

    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            StoreError::FileIo { .. }
                | StoreError::SerializationFailed { .. }
                | StoreError::DeserializationFailed { .. }
        )
    }

    /// Get the address if this error is about a specific document.
    pub fn address(&self) -> Option<&Address> {
        match self {
            StoreError::NotFound { address }
            | StoreError::AlreadyExists { address }
            | StoreError::TransactionConflict { address, .. } => Some(address),
            _ => None,
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
