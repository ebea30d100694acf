//!
//! Docmesh: object-document mapping over collection/document stores.
//!
//! Callers read and write typed records while the library converts them to
//! flat documents, follows cross-document references up to a requested depth,
//! and avoids redundant store reads through a two-tier cache.
//!
//! ## Core Concepts
//!
//! * **Addresses (`address::Address`)**: The slash-joined `collection/id` identity of one document.
//! * **Documents (`doc::FieldMap`)**: The flattened name → value form of a document. Values may be
//!   scalars, embedded maps, references to other documents, or lists of those.
//! * **Stores (`store::DocumentStore`)**: The pluggable document database, with an optional
//!   transaction-bound mode for every call. `store::InMemoryStore` is the bundled implementation.
//! * **Caches (`cache::TieredCache`)**: A session-scoped first tier plus an optional shared second
//!   tier (`cache::MemoryCache`). References are flattened by `cache::CacheCodec` on the way in.
//! * **Resolution (`resolver::GraphResolver`)**: Breadth-first expansion of references along
//!   dotted load paths, one batched fetch per level, with dedup and cycle breaking.
//! * **Sessions (`session::Session`)**: The explicit request or transaction scope threaded through
//!   every call.
//! * **Records (`mapping::Record`)**: The typed side of the mapping, registered once per type.
//! * **Client (`client::Client`)**: The request facade tying all of the above together.

pub mod address;
pub mod cache;
pub mod client;
pub mod clock;
pub mod doc;
pub mod entity;
pub mod mapping;
pub mod resolver;
pub mod runner;
pub mod session;
pub mod store;

pub use address::{Address, Reference};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use client::{Client, ClientConfig, Fetched, Request};
pub use doc::{FieldMap, Value};
pub use entity::EntityRef;
pub use mapping::{Record, RecordDescriptor};
pub use resolver::LoadPaths;
pub use session::Session;

/// Result type used throughout the Docmesh library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Docmesh library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Address and document value errors from the doc module
    #[error(transparent)]
    Doc(doc::DocError),

    /// Structured store errors from the store module
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured cache errors from the cache module
    #[error(transparent)]
    Cache(cache::CacheError),

    /// Structured resolution errors from the resolver module
    #[error(transparent)]
    Resolve(resolver::ResolveError),

    /// Structured record mapping errors from the mapping module
    #[error(transparent)]
    Mapping(mapping::MappingError),

    /// Background task errors from the runner module
    #[error(transparent)]
    Task(runner::TaskError),

    /// Request shape errors from the client module
    #[error(transparent)]
    Request(client::RequestError),

    /// Several independent operations failed
    #[error(transparent)]
    Batch(runner::BatchError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Doc(_) => "doc",
            Error::Store(_) => "store",
            Error::Cache(_) => "cache",
            Error::Resolve(_) => "resolver",
            Error::Mapping(_) => "mapping",
            Error::Task(_) => "runner",
            Error::Request(_) => "client",
            Error::Batch(_) => "batch",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a document was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            Error::Resolve(resolve_err) => resolve_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is store-related.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Check if this error is cache-related.
    pub fn is_cache_error(&self) -> bool {
        matches!(self, Error::Cache(_))
    }

    /// Check if this error came from converting a record.
    pub fn is_mapping_error(&self) -> bool {
        matches!(self, Error::Mapping(_))
    }

    /// Check if this error indicates cancellation or an expired deadline.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Task(task_err) => task_err.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the caller passed input the facade cannot handle.
    pub fn is_unsupported_shape(&self) -> bool {
        match self {
            Error::Request(request_err) => request_err.is_unsupported_shape(),
            _ => false,
        }
    }

    /// Check if this error joins several independent failures.
    pub fn is_batch_error(&self) -> bool {
        matches!(self, Error::Batch(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Store(store_err) => store_err.is_io_error(),
            _ => false,
        }
    }
}
