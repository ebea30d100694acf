//! Document store contract.
//!
//! The [`DocumentStore`] trait is the boundary between the engine and the
//! database holding the documents. Every operation has a plain mode and a
//! transaction-bound mode, selected by passing `Some(tx)`.
//!
//! Stores decide how transactions are isolated and retried; the engine only
//! guarantees it never issues concurrent calls against one transaction.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    address::{Address, DOCUMENTS_MARKER},
    doc::FieldMap,
    entity::EntityRef,
};

mod errors;
mod filter;
mod in_memory;

pub use errors::StoreError;
pub use filter::{Condition, Filter, Op};
pub use in_memory::{InMemoryStore, StoreCounters};

/// Identifier of an open store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(u64);

impl TxId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Storage contract for collection/document databases.
///
/// All reads return owned maps; the store must never hand out a map it keeps
/// mutating afterwards.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store-internal prefix of every address, if the store uses one
    /// (`projects/p/databases/d` for `projects/p/databases/d/documents/Car/1`).
    fn root(&self) -> Option<&str> {
        None
    }

    /// Generates a fresh document id.
    fn new_document_id(&self) -> String;

    /// Builds the address of document `id` in `collection`, below the root.
    fn address(&self, collection: &str, id: &str) -> Result<Address, StoreError> {
        let path = match self.root() {
            Some(root) => format!("{root}{DOCUMENTS_MARKER}{collection}/{id}"),
            None => format!("{collection}/{id}"),
        };
        Address::parse(path.as_str()).map_err(|_| StoreError::InvalidPath { path })
    }

    /// Reads one document.
    async fn fetch_one(
        &self,
        tx: Option<TxId>,
        address: &Address,
    ) -> Result<EntityRef, StoreError>;

    /// Reads several documents in one round trip.
    ///
    /// The result has one entry per requested address, in request order;
    /// missing documents come back as [`EntityRef::missing`].
    async fn fetch_batch(
        &self,
        tx: Option<TxId>,
        addresses: &[Address],
    ) -> Result<Vec<EntityRef>, StoreError>;

    /// Returns every document passing the filter.
    async fn query(&self, tx: Option<TxId>, filter: &Filter) -> Result<Vec<EntityRef>, StoreError>;

    /// Writes a new document, failing if one already exists.
    async fn create(
        &self,
        tx: Option<TxId>,
        address: &Address,
        fields: FieldMap,
    ) -> Result<(), StoreError>;

    /// Writes a document, replacing any existing one.
    async fn set(
        &self,
        tx: Option<TxId>,
        address: &Address,
        fields: FieldMap,
    ) -> Result<(), StoreError>;

    /// Removes a document. Deleting a missing document succeeds.
    async fn delete(&self, tx: Option<TxId>, address: &Address) -> Result<(), StoreError>;

    /// Opens a transaction.
    async fn begin_transaction(&self) -> Result<TxId, StoreError>;

    /// Applies every write of the transaction atomically.
    async fn commit(&self, tx: TxId) -> Result<(), StoreError>;

    /// Discards every write of the transaction.
    async fn rollback(&self, tx: TxId) -> Result<(), StoreError>;
}
