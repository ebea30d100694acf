//! Process-wide second cache tier.
//!
//! [`MemoryCache`] keeps JSON snapshots of codec-flattened documents with a
//! per-entry TTL and a capacity bound. It is meant to be shared between every
//! session of a client, so all state sits behind a lock or an atomic.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, trace, warn};

use super::{Cache, CacheEntry, CacheError};
use crate::{
    address::Address,
    clock::{Clock, SystemClock},
    doc::FieldMap,
};

/// Configuration for [`MemoryCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryCacheConfig {
    /// How long an entry stays readable after it was written.
    pub default_ttl: Duration,
    /// Maximum number of entries before the soonest-expiring one is evicted.
    pub max_entries: usize,
    /// How often [`MemoryCache::start_cleanup`] purges expired entries.
    /// `None` leaves expired entries in place until they are overwritten,
    /// evicted or purged by hand.
    pub cleanup_interval: Option<Duration>,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            max_entries: 10_000,
            cleanup_interval: None,
        }
    }
}

impl MemoryCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the background purge interval.
    pub fn with_cleanup_interval(mut self, every: Duration) -> Self {
        self.cleanup_interval = Some(every);
        self
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    snapshot: serde_json::Value,
    expires_at: u64,
}

/// Shared in-memory cache with TTL expiry.
#[derive(Debug)]
pub struct MemoryCache {
    config: MemoryCacheConfig,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<Address, StoredEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

impl MemoryCache {
    /// Creates a cache reading time from the system clock.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache with an explicit time source.
    pub fn with_clock(config: MemoryCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Number of stored entries, expired ones not yet purged included.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.read()?.is_empty())
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            trace!(purged, "purged expired cache entries");
        }
        Ok(purged)
    }

    /// Spawns a task that calls [`MemoryCache::purge_expired`] every
    /// `cleanup_interval`.
    ///
    /// Returns `None` when no interval is configured. The task holds only a
    /// weak handle and stops once the cache is dropped. Must be called from
    /// within a tokio runtime.
    pub fn start_cleanup(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let every = self.config.cleanup_interval.filter(|every| !every.is_zero())?;
        let cache: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                if let Err(err) = cache.purge_expired() {
                    warn!(error = %err, "stopping memory cache cleanup");
                    break;
                }
            }
            debug!("memory cache cleanup stopped");
        }))
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.read()?.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }

    fn lookup(
        &self,
        entries: &HashMap<Address, StoredEntry>,
        address: &Address,
        now: u64,
    ) -> Result<Option<FieldMap>, CacheError> {
        match entries.get(address) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                FieldMap::from_json(entry.snapshot.clone())
                    .map(Some)
                    .map_err(|err| CacheError::CorruptEntry {
                        address: address.clone(),
                        reason: err.to_string(),
                    })
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn insert(
        &self,
        entries: &mut HashMap<Address, StoredEntry>,
        address: Address,
        fields: &FieldMap,
        now: u64,
    ) {
        if self.config.max_entries == 0 {
            return;
        }
        if !entries.contains_key(&address) && entries.len() >= self.config.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
            while entries.len() >= self.config.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(address, _)| address.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                    None => break,
                }
            }
        }
        let ttl = self.config.default_ttl.as_millis() as u64;
        entries.insert(
            address,
            StoredEntry {
                snapshot: fields.to_json(),
                expires_at: now.saturating_add(ttl),
            },
        );
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Address, StoredEntry>>, CacheError> {
        self.entries
            .read()
            .map_err(|_| CacheError::LockPoisoned { cache: "memory" })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Address, StoredEntry>>, CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned { cache: "memory" })
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, address: &Address) -> Result<Option<CacheEntry>, CacheError> {
        let now = self.clock.now_millis();
        let entries = self.read()?;
        Ok(self
            .lookup(&entries, address, now)?
            .map(CacheEntry::Present))
    }

    async fn get_multi(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, CacheEntry>, CacheError> {
        let now = self.clock.now_millis();
        let entries = self.read()?;
        let mut found = HashMap::with_capacity(addresses.len());
        for address in addresses {
            if let Some(fields) = self.lookup(&entries, address, now)? {
                found.insert(address.clone(), CacheEntry::Present(fields));
            }
        }
        Ok(found)
    }

    async fn set(&self, address: &Address, fields: FieldMap) -> Result<(), CacheError> {
        let now = self.clock.now_millis();
        let mut entries = self.write()?;
        self.insert(&mut entries, address.clone(), &fields, now);
        Ok(())
    }

    async fn set_multi(&self, items: HashMap<Address, FieldMap>) -> Result<(), CacheError> {
        let now = self.clock.now_millis();
        let mut entries = self.write()?;
        for (address, fields) in items {
            self.insert(&mut entries, address, &fields, now);
        }
        Ok(())
    }

    async fn delete(&self, address: &Address) -> Result<(), CacheError> {
        self.write()?.remove(address);
        Ok(())
    }

    async fn delete_multi(&self, addresses: &[Address]) -> Result<(), CacheError> {
        let mut entries = self.write()?;
        for address in addresses {
            entries.remove(address);
        }
        Ok(())
    }
}
