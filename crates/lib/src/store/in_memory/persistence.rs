//! Persistence operations for the in-memory store
//!
//! This module handles serialization and file I/O for saving/loading
//! the committed documents to/from JSON files. Open transactions and call
//! counters are not persisted.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use super::InMemoryStore;
use crate::{address::Address, doc::FieldMap, store::StoreError};

/// The current persistence file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const PERSISTENCE_VERSION: u8 = 0;

/// Helper to check if version is default (0) for serde skip_serializing_if
fn is_v0(v: &u8) -> bool {
    *v == 0
}

/// Validates the persistence version during deserialization.
fn validate_persistence_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != PERSISTENCE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported persistence version {version}; only version {PERSISTENCE_VERSION} is supported"
        )));
    }
    Ok(version)
}

/// Serializable form of the store.
#[derive(Serialize, Deserialize)]
struct SerializableStore {
    /// File format version for compatibility checking
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_persistence_version"
    )]
    version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<String>,
    /// Documents keyed by canonical address
    #[serde(default)]
    documents: BTreeMap<Address, FieldMap>,
}

/// Saves every committed document to `path` as pretty-printed JSON.
pub(crate) async fn save_to_file<P: AsRef<Path>>(
    store: &InMemoryStore,
    path: P,
) -> Result<(), StoreError> {
    let serializable = SerializableStore {
        version: PERSISTENCE_VERSION,
        root: store.root.clone(),
        documents: store.documents.read().await.clone(),
    };
    let count = serializable.documents.len();

    let json = serde_json::to_string_pretty(&serializable)
        .map_err(|e| StoreError::SerializationFailed { source: e })?;
    tokio::fs::write(path.as_ref(), json)
        .await
        .map_err(|e| StoreError::FileIo { source: e })?;
    info!(path = %path.as_ref().display(), documents = count, "store saved");
    Ok(())
}

/// Loads a store from `path`.
///
/// If the file does not exist, a new, empty store is returned.
pub(crate) async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<InMemoryStore, StoreError> {
    match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(json) => {
            let serializable: SerializableStore = serde_json::from_str(&json)
                .map_err(|e| StoreError::DeserializationFailed { source: e })?;
            let documents = serializable
                .documents
                .into_iter()
                .map(|(address, fields)| (address.canonical(), fields))
                .collect::<BTreeMap<_, _>>();
            info!(path = %path.as_ref().display(), documents = documents.len(), "store loaded");
            Ok(InMemoryStore::from_documents(serializable.root, documents))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InMemoryStore::new()),
        Err(e) => Err(StoreError::FileIo { source: e }),
    }
}
