//! Error types for document values and addresses.

use thiserror::Error;

/// Errors raised while building addresses or converting document values.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DocError {
    /// The path is not a valid `collection/id` document path.
    #[error("Invalid document address: '{path}'")]
    InvalidAddress {
        /// The rejected path
        path: String,
    },

    /// JSON input could not be converted to a document value.
    #[error("Invalid document JSON: {reason}")]
    InvalidJson {
        /// Description of the problem
        reason: String,
    },
}

impl DocError {
    /// Check if this error is about a malformed address.
    pub fn is_invalid_address(&self) -> bool {
        matches!(self, DocError::InvalidAddress { .. })
    }
}

impl From<DocError> for crate::Error {
    fn from(err: DocError) -> Self {
        crate::Error::Doc(err)
    }
}
