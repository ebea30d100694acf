//! Resolution error types.

use std::{collections::BTreeSet, fmt};

use thiserror::Error;

use crate::address::Address;

/// Addresses that were requested during a resolve call but do not exist.
///
/// This is a partial-success signal: every other document was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotFoundError {
    addresses: BTreeSet<Address>,
}

impl NotFoundError {
    pub fn new(addresses: BTreeSet<Address>) -> Self {
        Self { addresses }
    }

    pub fn addresses(&self) -> &BTreeSet<Address> {
        &self.addresses
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Merges the addresses of `other` into this error.
    pub fn merge(&mut self, other: NotFoundError) {
        self.addresses.extend(other.addresses);
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list: Vec<&str> = self.addresses.iter().map(Address::as_str).collect();
        write!(f, "Documents not found: {}", list.join(", "))
    }
}

impl std::error::Error for NotFoundError {}

/// Errors raised by the graph resolver.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Some requested documents do not exist.
    #[error(transparent)]
    NotFound(NotFoundError),

    /// A load path has an empty segment.
    #[error("Invalid load path: '{path}'")]
    InvalidLoadPath {
        /// The rejected path
        path: String,
    },
}

impl ResolveError {
    /// Check if this error reports missing documents.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound(_))
    }

    /// Get the missing addresses if this error reports any.
    pub fn not_found(&self) -> Option<&NotFoundError> {
        match self {
            ResolveError::NotFound(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NotFoundError> for ResolveError {
    fn from(err: NotFoundError) -> Self {
        ResolveError::NotFound(err)
    }
}

impl From<ResolveError> for crate::Error {
    fn from(err: ResolveError) -> Self {
        crate::Error::Resolve(err)
    }
}

impl From<NotFoundError> for crate::Error {
    fn from(err: NotFoundError) -> Self {
        crate::Error::Resolve(ResolveError::NotFound(err))
    }
}
