//! Two-tier cache front end.

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{trace, warn};

use super::{Cache, CacheCodec, CacheEntry, CacheError};
use crate::{address::Address, doc::FieldMap};

/// A single get/set/delete surface over a mandatory first tier and an
/// optional shared second tier.
///
/// Reads never copy second-tier hits into the first tier. Writes always reach
/// the first tier and reach the second tier only when `deep` is set, so a
/// transaction's writes stay private until it commits. Second-tier failures
/// are logged and ignored; first-tier failures are returned.
#[derive(Clone)]
pub struct TieredCache {
    first: Arc<dyn Cache>,
    second: Option<Arc<dyn Cache>>,
    codec: CacheCodec,
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("second_tier", &self.second.is_some())
            .field("codec", &self.codec)
            .finish()
    }
}

impl TieredCache {
    pub fn new(first: Arc<dyn Cache>) -> Self {
        Self {
            first,
            second: None,
            codec: CacheCodec::new(),
        }
    }

    /// Adds a shared second tier.
    pub fn with_second(mut self, second: Arc<dyn Cache>) -> Self {
        self.second = Some(second);
        self
    }

    /// Replaces the codec, e.g. to rebind references below a store root.
    pub fn with_codec(mut self, codec: CacheCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn has_second_tier(&self) -> bool {
        self.second.is_some()
    }

    /// Looks up one address, first tier then second tier.
    ///
    /// A tombstone in the first tier is returned as is and hides whatever the
    /// second tier may hold.
    pub async fn get(&self, address: &Address) -> Result<Option<CacheEntry>, CacheError> {
        if let Some(entry) = self.first.get(address).await? {
            return self.decode(address, entry).map(Some);
        }
        let Some(second) = &self.second else {
            return Ok(None);
        };
        match second.get(address).await {
            Ok(Some(entry)) => Ok(self.decode_shared(address, entry)),
            Ok(None) => Ok(None),
            Err(err) => {
                warn!(address = %address, error = %err, "second-tier cache get failed");
                Ok(None)
            }
        }
    }

    /// Looks up several addresses, returning the known ones only.
    ///
    /// The first tier is asked for everything in one call, the second tier for
    /// the remainder in one call.
    pub async fn get_batch(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, CacheEntry>, CacheError> {
        let mut found = HashMap::with_capacity(addresses.len());
        for (address, entry) in self.first.get_multi(addresses).await? {
            let entry = self.decode(&address, entry)?;
            found.insert(address, entry);
        }

        if let Some(second) = &self.second {
            let remaining: Vec<Address> = addresses
                .iter()
                .filter(|address| !found.contains_key(*address))
                .cloned()
                .collect();
            if !remaining.is_empty() {
                match second.get_multi(&remaining).await {
                    Ok(hits) => {
                        for (address, entry) in hits {
                            if let Some(entry) = self.decode_shared(&address, entry) {
                                found.insert(address, entry);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(count = remaining.len(), error = %err, "second-tier cache get_multi failed");
                    }
                }
            }
        }

        trace!(
            requested = addresses.len(),
            hits = found.len(),
            "cache batch lookup"
        );
        Ok(found)
    }

    pub async fn set(
        &self,
        address: &Address,
        fields: FieldMap,
        deep: bool,
    ) -> Result<(), CacheError> {
        let cachable = self.codec.make_cachable(fields);
        self.first.set(address, cachable.clone()).await?;
        if let (true, Some(second)) = (deep, &self.second) {
            if let Err(err) = second.set(address, cachable).await {
                warn!(address = %address, error = %err, "second-tier cache set failed");
            }
        }
        Ok(())
    }

    pub async fn set_batch(
        &self,
        items: HashMap<Address, FieldMap>,
        deep: bool,
    ) -> Result<(), CacheError> {
        if items.is_empty() {
            return Ok(());
        }
        let cachable: HashMap<Address, FieldMap> = items
            .into_iter()
            .map(|(address, fields)| (address, self.codec.make_cachable(fields)))
            .collect();
        let count = cachable.len();
        match (&self.second, deep) {
            (Some(second), true) => {
                self.first.set_multi(cachable.clone()).await?;
                if let Err(err) = second.set_multi(cachable).await {
                    warn!(count, error = %err, "second-tier cache set_multi failed");
                }
            }
            _ => self.first.set_multi(cachable).await?,
        }
        trace!(count, deep, "cache batch set");
        Ok(())
    }

    pub async fn delete(&self, address: &Address, deep: bool) -> Result<(), CacheError> {
        self.first.delete(address).await?;
        if deep {
            if let Some(second) = &self.second {
                if let Err(err) = second.delete(address).await {
                    warn!(address = %address, error = %err, "second-tier cache delete failed");
                }
            }
        }
        Ok(())
    }

    pub async fn delete_batch(&self, addresses: &[Address], deep: bool) -> Result<(), CacheError> {
        if addresses.is_empty() {
            return Ok(());
        }
        self.first.delete_multi(addresses).await?;
        if deep {
            if let Some(second) = &self.second {
                if let Err(err) = second.delete_multi(addresses).await {
                    warn!(count = addresses.len(), error = %err, "second-tier cache delete_multi failed");
                }
            }
        }
        Ok(())
    }

    fn decode(&self, address: &Address, entry: CacheEntry) -> Result<CacheEntry, CacheError> {
        match entry {
            CacheEntry::Present(fields) => self
                .codec
                .make_uncachable(address, fields)
                .map(CacheEntry::Present),
            CacheEntry::Tombstone => Ok(CacheEntry::Tombstone),
        }
    }

    fn decode_shared(&self, address: &Address, entry: CacheEntry) -> Option<CacheEntry> {
        match self.decode(address, entry) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(address = %address, error = %err, "dropping unreadable second-tier entry");
                None
            }
        }
    }
}
