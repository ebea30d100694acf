//! Batched cache-then-store document fetching.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::trace;

use crate::{
    Result,
    address::Address,
    cache::{CacheEntry, TieredCache},
    doc::FieldMap,
    entity::EntityRef,
    session::Session,
    store::{DocumentStore, StoreError},
};

/// Where the resolver gets referenced documents from.
///
/// One call per resolution level. The result has one entry per requested
/// address, in request order, with [`EntityRef::missing`] for documents that
/// do not exist.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, addresses: &[Address]) -> Result<Vec<EntityRef>>;
}

/// Fetches through the session's tiered cache and falls back to the store.
///
/// Cache hits, tombstones included, never reach the store. Misses go to the
/// store in one batch, and everything the store returns is written back to
/// the cache: session-only inside a transaction, both tiers otherwise.
#[derive(Clone)]
pub struct CachedFetcher {
    cache: TieredCache,
    store: Arc<dyn DocumentStore>,
    session: Session,
}

impl CachedFetcher {
    pub fn new(cache: TieredCache, store: Arc<dyn DocumentStore>, session: Session) -> Self {
        Self {
            cache,
            store,
            session,
        }
    }
}

#[async_trait]
impl DocumentSource for CachedFetcher {
    async fn fetch(&self, addresses: &[Address]) -> Result<Vec<EntityRef>> {
        let hits = self.cache.get_batch(addresses).await?;

        let mut slots: Vec<Option<EntityRef>> = Vec::with_capacity(addresses.len());
        let mut misses = Vec::new();
        for address in addresses {
            match hits.get(address) {
                Some(CacheEntry::Present(fields)) => {
                    slots.push(Some(EntityRef::found(address.clone(), fields.clone())))
                }
                Some(CacheEntry::Tombstone) => slots.push(Some(EntityRef::missing(address.clone()))),
                None => {
                    misses.push(address.clone());
                    slots.push(None);
                }
            }
        }
        trace!(
            requested = addresses.len(),
            misses = misses.len(),
            "fetching documents"
        );

        if !misses.is_empty() {
            let tx = self.session.transaction();
            let fetched = self
                .session
                .guard(async {
                    self.store
                        .fetch_batch(tx, &misses)
                        .await
                        .map_err(crate::Error::from)
                })
                .await?;
            if fetched.len() != misses.len() {
                return Err(StoreError::Backend {
                    reason: format!(
                        "store returned {} documents for {} addresses",
                        fetched.len(),
                        misses.len()
                    ),
                }
                .into());
            }

            let found: HashMap<Address, FieldMap> = fetched
                .iter()
                .filter_map(|entity| {
                    entity
                        .fields()
                        .map(|fields| (entity.address().clone(), fields.clone()))
                })
                .collect();
            self.cache
                .set_batch(found, !self.session.in_transaction())
                .await?;

            let mut fetched = fetched.into_iter();
            for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
                *slot = fetched.next();
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
