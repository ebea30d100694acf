//! Document caches.
//!
//! Reads go through a [`TieredCache`] made of two [`Cache`] tiers:
//!
//! * the first tier is a [`SessionCache`], owned by exactly one request or one
//!   transaction and discarded with it;
//! * the optional second tier is shared by every session of a client, for
//!   example a [`MemoryCache`].
//!
//! Tiers only ever see documents that have been through the [`CacheCodec`],
//! so a tier never has to store a live [`Reference`](crate::Reference).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{address::Address, doc::FieldMap};

mod codec;
mod errors;
mod memory;
mod session;
mod tiered;

pub use codec::{CacheCodec, ESCAPE_SUFFIX, REF_LIST_SUFFIX, REF_SUFFIX};
pub use errors::CacheError;
pub use memory::{CacheStats, MemoryCache, MemoryCacheConfig};
pub use session::SessionCache;
pub use tiered::TieredCache;

/// What a cache tier knows about one address.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// A snapshot of the document.
    Present(FieldMap),
    /// The document is known to be deleted.
    Tombstone,
}

impl CacheEntry {
    /// Returns the snapshot, or `None` for a tombstone.
    pub fn into_fields(self) -> Option<FieldMap> {
        match self {
            CacheEntry::Present(fields) => Some(fields),
            CacheEntry::Tombstone => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, CacheEntry::Tombstone)
    }
}

/// One cache tier.
///
/// Implementations must return independent copies: mutating a map returned
/// by `get` must never change what the tier holds. Per-key operations must be
/// atomic; nothing is required across keys.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Looks up a single address.
    async fn get(&self, address: &Address) -> Result<Option<CacheEntry>, CacheError>;

    /// Looks up several addresses, returning only the ones the tier knows.
    async fn get_multi(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, CacheEntry>, CacheError> {
        let mut found = HashMap::with_capacity(addresses.len());
        for address in addresses {
            if let Some(entry) = self.get(address).await? {
                found.insert(address.clone(), entry);
            }
        }
        Ok(found)
    }

    /// Stores a snapshot of one document.
    async fn set(&self, address: &Address, fields: FieldMap) -> Result<(), CacheError>;

    /// Stores snapshots of several documents.
    async fn set_multi(&self, items: HashMap<Address, FieldMap>) -> Result<(), CacheError> {
        for (address, fields) in items {
            self.set(&address, fields).await?;
        }
        Ok(())
    }

    /// Forgets, or marks deleted, one address.
    async fn delete(&self, address: &Address) -> Result<(), CacheError>;

    /// Forgets, or marks deleted, several addresses.
    async fn delete_multi(&self, addresses: &[Address]) -> Result<(), CacheError> {
        for address in addresses {
            self.delete(address).await?;
        }
        Ok(())
    }
}
