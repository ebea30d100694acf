//! Raw documents paired with their address.

use crate::{address::Address, doc::FieldMap};

/// A document's field map together with the address it was read from.
///
/// An `EntityRef` without fields is the not-found marker: the address was
/// requested but no document exists there (or the cache holds a tombstone
/// for it).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    address: Address,
    fields: Option<FieldMap>,
}

impl EntityRef {
    /// A document that exists.
    pub fn found(address: Address, fields: FieldMap) -> Self {
        Self {
            address,
            fields: Some(fields),
        }
    }

    /// The not-found marker for `address`.
    pub fn missing(address: Address) -> Self {
        Self {
            address,
            fields: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn fields(&self) -> Option<&FieldMap> {
        self.fields.as_ref()
    }

    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    pub fn into_parts(self) -> (Address, Option<FieldMap>) {
        (self.address, self.fields)
    }
}
