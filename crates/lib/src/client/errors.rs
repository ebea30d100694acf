//! Error types for the request facade.

use thiserror::Error;

/// Errors raised while validating a request, before any work is started.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RequestError {
    /// The input cannot be turned into document operations.
    #[error("Unsupported request shape: {reason}")]
    UnsupportedShape {
        /// Description of the offending input
        reason: String,
    },

    /// The configuration file could not be used.
    #[error("Invalid client configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem
        reason: String,
    },
}

impl RequestError {
    pub fn is_unsupported_shape(&self) -> bool {
        matches!(self, RequestError::UnsupportedShape { .. })
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, RequestError::InvalidConfig { .. })
    }
}

impl From<RequestError> for crate::Error {
    fn from(err: RequestError) -> Self {
        crate::Error::Request(err)
    }
}
