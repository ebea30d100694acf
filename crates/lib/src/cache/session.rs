//! Request-scoped first cache tier.

use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;

use super::{Cache, CacheEntry, CacheError};
use crate::{address::Address, doc::FieldMap};

/// In-memory map from address to document snapshot, owned by one session.
///
/// Deleting an address leaves a tombstone rather than forgetting it, so a
/// document deleted earlier in the same request reads as absent without a
/// store round trip, and so a transaction's deletions can be replayed onto
/// the parent session when it commits.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<Address, CacheEntry>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses this session knows about, tombstones included.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.read()?.is_empty())
    }

    /// Everything written to this session: snapshots set and addresses deleted.
    pub fn writes(&self) -> Result<(HashMap<Address, FieldMap>, Vec<Address>), CacheError> {
        let entries = self.read()?;
        let mut sets = HashMap::new();
        let mut deletes = Vec::new();
        for (address, entry) in entries.iter() {
            match entry {
                CacheEntry::Present(fields) => {
                    sets.insert(address.clone(), fields.clone());
                }
                CacheEntry::Tombstone => deletes.push(address.clone()),
            }
        }
        Ok((sets, deletes))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Address, CacheEntry>>, CacheError> {
        self.entries
            .read()
            .map_err(|_| CacheError::LockPoisoned { cache: "session" })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Address, CacheEntry>>, CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned { cache: "session" })
    }
}

#[async_trait]
impl Cache for SessionCache {
    async fn get(&self, address: &Address) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.read()?.get(address).cloned())
    }

    async fn get_multi(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, CacheEntry>, CacheError> {
        let entries = self.read()?;
        Ok(addresses
            .iter()
            .filter_map(|address| {
                entries
                    .get(address)
                    .map(|entry| (address.clone(), entry.clone()))
            })
            .collect())
    }

    async fn set(&self, address: &Address, fields: FieldMap) -> Result<(), CacheError> {
        self.write()?
            .insert(address.clone(), CacheEntry::Present(fields));
        Ok(())
    }

    async fn set_multi(&self, items: HashMap<Address, FieldMap>) -> Result<(), CacheError> {
        let mut entries = self.write()?;
        for (address, fields) in items {
            entries.insert(address, CacheEntry::Present(fields));
        }
        Ok(())
    }

    async fn delete(&self, address: &Address) -> Result<(), CacheError> {
        self.write()?.insert(address.clone(), CacheEntry::Tombstone);
        Ok(())
    }

    async fn delete_multi(&self, addresses: &[Address]) -> Result<(), CacheError> {
        let mut entries = self.write()?;
        for address in addresses {
            entries.insert(address.clone(), CacheEntry::Tombstone);
        }
        Ok(())
    }
}
