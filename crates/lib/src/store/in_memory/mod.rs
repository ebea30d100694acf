//! In-memory store implementation
//!
//! This module provides an in-memory implementation of the [`DocumentStore`]
//! trait, suitable for testing, development, and the command line tool.

mod persistence;

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{DocumentStore, Filter, StoreError, TxId};
use crate::{
    address::{Address, DOCUMENTS_MARKER},
    doc::FieldMap,
    entity::EntityRef,
};

/// A write staged inside an open transaction.
#[derive(Debug, Clone)]
enum StagedWrite {
    Create(FieldMap),
    Set(FieldMap),
    Delete,
}

/// Snapshot of the store's call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    /// Calls to `fetch_one` and `fetch_batch`.
    pub fetch_calls: u64,
    /// Addresses requested across all fetch calls.
    pub documents_fetched: u64,
    /// Calls to `query`.
    pub queries: u64,
    /// Committed document writes (create, set, delete).
    pub writes: u64,
}

/// A simple in-memory document store.
///
/// Documents are keyed by canonical address, so the same document can be
/// read with or without the store root prefix. Transactions stage their
/// writes privately: reads inside the transaction see them, everyone else
/// sees them only after `commit`.
///
/// It provides basic persistence via `save_to_file` and `load_from_file`,
/// serializing every document to JSON.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    root: Option<String>,
    pub(crate) documents: RwLock<BTreeMap<Address, FieldMap>>,
    transactions: Mutex<HashMap<TxId, BTreeMap<Address, StagedWrite>>>,
    next_tx: AtomicU64,
    fetch_calls: AtomicU64,
    documents_fetched: AtomicU64,
    queries: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new, empty store addressing documents canonically.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty store whose addresses live below `root`.
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    pub(crate) fn from_documents(
        root: Option<String>,
        documents: BTreeMap<Address, FieldMap>,
    ) -> Self {
        Self {
            root,
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    /// Number of committed documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Committed document count per canonical collection path.
    pub async fn collections(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for address in self.documents.read().await.keys() {
            *counts.entry(address.collection().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Returns a snapshot of the call counters.
    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            fetch_calls: self.fetch_calls.load(Ordering::Relaxed),
            documents_fetched: self.documents_fetched.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Zeroes the call counters.
    pub fn reset_counters(&self) {
        self.fetch_calls.store(0, Ordering::Relaxed);
        self.documents_fetched.store(0, Ordering::Relaxed);
        self.queries.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    /// Saves every committed document to a JSON file.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        persistence::save_to_file(self, path).await
    }

    /// Loads a store from a JSON file.
    ///
    /// If the file does not exist, a new, empty store is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        persistence::load_from_file(path).await
    }

    /// Re-attaches the store root to a canonical key.
    fn full_address(&self, canonical: &Address) -> Address {
        match &self.root {
            Some(root) => Address::parse(format!("{root}{DOCUMENTS_MARKER}{canonical}"))
                .unwrap_or_else(|_| canonical.clone()),
            None => canonical.clone(),
        }
    }

    async fn read_visible(
        &self,
        tx: Option<TxId>,
        addresses: &[Address],
    ) -> Result<Vec<EntityRef>, StoreError> {
        let transactions = self.transactions.lock().await;
        let staged = match tx {
            Some(tx) => Some(
                transactions
                    .get(&tx)
                    .ok_or(StoreError::TransactionNotFound { tx })?,
            ),
            None => None,
        };
        let documents = self.documents.read().await;
        Ok(addresses
            .iter()
            .map(|address| {
                let key = address.canonical();
                let fields = match staged.and_then(|writes| writes.get(&key)) {
                    Some(StagedWrite::Create(fields) | StagedWrite::Set(fields)) => {
                        Some(fields.clone())
                    }
                    Some(StagedWrite::Delete) => None,
                    None => documents.get(&key).cloned(),
                };
                match fields {
                    Some(fields) => EntityRef::found(address.clone(), fields),
                    None => EntityRef::missing(address.clone()),
                }
            })
            .collect())
    }

    async fn apply(&self, address: &Address, write: StagedWrite) -> Result<(), StoreError> {
        let key = address.canonical();
        let mut documents = self.documents.write().await;
        match write {
            StagedWrite::Create(fields) => {
                if documents.contains_key(&key) {
                    return Err(StoreError::AlreadyExists {
                        address: address.clone(),
                    });
                }
                documents.insert(key, fields);
            }
            StagedWrite::Set(fields) => {
                documents.insert(key, fields);
            }
            StagedWrite::Delete => {
                documents.remove(&key);
            }
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stage(&self, tx: TxId, address: &Address, write: StagedWrite) -> Result<(), StoreError> {
        let key = address.canonical();
        let mut transactions = self.transactions.lock().await;
        let writes = transactions
            .get_mut(&tx)
            .ok_or(StoreError::TransactionNotFound { tx })?;
        let write = match write {
            StagedWrite::Create(fields) => {
                let staged_exists = matches!(
                    writes.get(&key),
                    Some(StagedWrite::Create(_) | StagedWrite::Set(_))
                );
                let staged_deleted = matches!(writes.get(&key), Some(StagedWrite::Delete));
                let committed_exists = self.documents.read().await.contains_key(&key);
                if staged_exists || (committed_exists && !staged_deleted) {
                    return Err(StoreError::AlreadyExists {
                        address: address.clone(),
                    });
                }
                if staged_deleted {
                    StagedWrite::Set(fields)
                } else {
                    StagedWrite::Create(fields)
                }
            }
            // A set over a staged create keeps the create's conflict check.
            StagedWrite::Set(fields) => match writes.get(&key) {
                Some(StagedWrite::Create(_)) => StagedWrite::Create(fields),
                _ => StagedWrite::Set(fields),
            },
            StagedWrite::Delete => StagedWrite::Delete,
        };
        writes.insert(key, write);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    fn new_document_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    async fn fetch_one(
        &self,
        tx: Option<TxId>,
        address: &Address,
    ) -> Result<EntityRef, StoreError> {
        let mut found = self.fetch_batch(tx, std::slice::from_ref(address)).await?;
        found.pop().ok_or_else(|| StoreError::Backend {
            reason: "fetch returned no result".to_string(),
        })
    }

    async fn fetch_batch(
        &self,
        tx: Option<TxId>,
        addresses: &[Address],
    ) -> Result<Vec<EntityRef>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        self.documents_fetched
            .fetch_add(addresses.len() as u64, Ordering::Relaxed);
        debug!(count = addresses.len(), tx = ?tx, "store fetch");
        self.read_visible(tx, addresses).await
    }

    async fn query(&self, tx: Option<TxId>, filter: &Filter) -> Result<Vec<EntityRef>, StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let transactions = self.transactions.lock().await;
        let staged = match tx {
            Some(tx) => Some(
                transactions
                    .get(&tx)
                    .ok_or(StoreError::TransactionNotFound { tx })?,
            ),
            None => None,
        };
        let documents = self.documents.read().await;

        let mut visible: BTreeMap<&Address, &FieldMap> = documents.iter().collect();
        if let Some(writes) = staged {
            for (key, write) in writes {
                match write {
                    StagedWrite::Create(fields) | StagedWrite::Set(fields) => {
                        visible.insert(key, fields);
                    }
                    StagedWrite::Delete => {
                        visible.remove(key);
                    }
                }
            }
        }

        let limit = filter.max_results().unwrap_or(usize::MAX);
        let results: Vec<EntityRef> = visible
            .into_iter()
            .filter(|(key, fields)| filter.matches(key, fields))
            .take(limit)
            .map(|(key, fields)| EntityRef::found(self.full_address(key), fields.clone()))
            .collect();
        debug!(collection = filter.collection_path(), count = results.len(), "store query");
        Ok(results)
    }

    async fn create(
        &self,
        tx: Option<TxId>,
        address: &Address,
        fields: FieldMap,
    ) -> Result<(), StoreError> {
        match tx {
            Some(tx) => self.stage(tx, address, StagedWrite::Create(fields)).await,
            None => self.apply(address, StagedWrite::Create(fields)).await,
        }
    }

    async fn set(
        &self,
        tx: Option<TxId>,
        address: &Address,
        fields: FieldMap,
    ) -> Result<(), StoreError> {
        match tx {
            Some(tx) => self.stage(tx, address, StagedWrite::Set(fields)).await,
            None => self.apply(address, StagedWrite::Set(fields)).await,
        }
    }

    async fn delete(&self, tx: Option<TxId>, address: &Address) -> Result<(), StoreError> {
        match tx {
            Some(tx) => self.stage(tx, address, StagedWrite::Delete).await,
            None => self.apply(address, StagedWrite::Delete).await,
        }
    }

    async fn begin_transaction(&self) -> Result<TxId, StoreError> {
        let tx = TxId::new(self.next_tx.fetch_add(1, Ordering::Relaxed) + 1);
        self.transactions.lock().await.insert(tx, BTreeMap::new());
        debug!(tx = %tx, "transaction started");
        Ok(tx)
    }

    async fn commit(&self, tx: TxId) -> Result<(), StoreError> {
        let writes = self
            .transactions
            .lock()
            .await
            .remove(&tx)
            .ok_or(StoreError::TransactionNotFound { tx })?;

        let mut documents = self.documents.write().await;
        for (key, write) in &writes {
            if matches!(write, StagedWrite::Create(_)) && documents.contains_key(key) {
                return Err(StoreError::TransactionConflict {
                    tx,
                    address: self.full_address(key),
                });
            }
        }
        let count = writes.len();
        for (key, write) in writes {
            match write {
                StagedWrite::Create(fields) | StagedWrite::Set(fields) => {
                    documents.insert(key, fields);
                }
                StagedWrite::Delete => {
                    documents.remove(&key);
                }
            }
        }
        self.writes.fetch_add(count as u64, Ordering::Relaxed);
        info!(tx = %tx, writes = count, "transaction committed");
        Ok(())
    }

    async fn rollback(&self, tx: TxId) -> Result<(), StoreError> {
        let writes = self
            .transactions
            .lock()
            .await
            .remove(&tx)
            .ok_or(StoreError::TransactionNotFound { tx })?;
        info!(tx = %tx, discarded = writes.len(), "transaction rolled back");
        Ok(())
    }
}
