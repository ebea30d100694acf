//! The request facade.
//!
//! A [`Client`] ties a [`DocumentStore`], an optional shared cache tier and
//! the registered record types together. Each operation goes through a
//! [`Request`], which carries the load paths for reads and an optional
//! mapper for writes, and every call takes the [`Session`] it runs in.
//!
//! ```
//! # use std::sync::Arc;
//! # use docmesh::{Client, ClientConfig, store::InMemoryStore};
//! # #[tokio::main]
//! # async fn main() -> docmesh::Result<()> {
//! let client = Client::new(Arc::new(InMemoryStore::new()), ClientConfig::default());
//! let session = client.session();
//! let resolution = client
//!     .request()
//!     .resolve(&session, Vec::new())
//!     .await
//!     .wait()
//!     .await?;
//! assert!(resolution.documents.is_empty());
//! # Ok(())
//! # }
//! ```

use std::{fmt, future::Future, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    address::Address,
    cache::{Cache, CacheCodec, TieredCache},
    mapping::{Record, Registry},
    session::Session,
    store::DocumentStore,
};

mod config;
mod errors;
mod request;

pub use config::ClientConfig;
pub use errors::RequestError;
pub use request::{Fetched, Mapper, Request};

/// Entry point for reading and writing records.
///
/// Cloning is cheap; clones share the store, the second cache tier and the
/// registrations made before the clone.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn DocumentStore>,
    config: Arc<ClientConfig>,
    registry: Arc<Registry>,
    second_tier: Option<Arc<dyn Cache>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("second_tier", &self.second_tier.is_some())
            .finish()
    }
}

impl Client {
    pub fn new(store: Arc<dyn DocumentStore>, config: ClientConfig) -> Self {
        let registry = Registry::new(config.id_field.clone(), config.parent_field.clone());
        Self {
            store,
            config: Arc::new(config),
            registry: Arc::new(registry),
            second_tier: None,
        }
    }

    /// Adds a cache tier shared by every session of this client.
    pub fn with_second_tier(mut self, cache: Arc<dyn Cache>) -> Self {
        self.second_tier = Some(cache);
        self
    }

    /// Registers record type `T`, validating its descriptor.
    pub fn register<T: Record>(&mut self) -> Result<()> {
        let descriptor = Arc::make_mut(&mut self.registry).register::<T>()?;
        debug!(collection = descriptor.collection(), "registered record type");
        Ok(())
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A new session, with the configured task timeout as its deadline.
    pub fn session(&self) -> Session {
        match self.config.task_timeout {
            Some(timeout) => Session::new().with_timeout(timeout),
            None => Session::new(),
        }
    }

    /// A request using the configured default load paths.
    pub fn request(&self) -> Request {
        Request::new(self.clone())
    }

    /// The cache view of `session`: its own tier first, then the shared tier.
    pub fn tiered_cache(&self, session: &Session) -> TieredCache {
        let codec = match self.store.root() {
            Some(root) => CacheCodec::with_root(root),
            None => CacheCodec::new(),
        };
        let cache = TieredCache::new(session.cache().clone()).with_codec(codec);
        match &self.second_tier {
            Some(second) => cache.with_second(second.clone()),
            None => cache,
        }
    }

    /// The store address of `record`.
    pub fn address_of<T: Record>(&self, record: &T) -> Result<Address> {
        self.address_in::<T>(record.parent().as_ref(), record.id())
    }

    /// The store address of document `id` of type `T`, below `parent` if set.
    pub(crate) fn address_in<T: Record>(&self, parent: Option<&Address>, id: &str) -> Result<Address> {
        let descriptor = self.registry.descriptor::<T>()?;
        let collection = match parent {
            Some(parent) => format!("{}/{}", parent.canonical(), descriptor.collection()),
            None => descriptor.collection().to_string(),
        };
        Ok(self.store.address(&collection, id)?)
    }

    /// Runs `work` inside a store transaction.
    ///
    /// `work` receives a session bound to the transaction, with a private
    /// cache. When it succeeds the transaction is committed and everything
    /// the private cache saw is merged into `session` and the shared tier.
    /// When it fails the transaction is rolled back and the private cache is
    /// dropped.
    pub async fn run_in_transaction<T, F, Fut>(&self, session: &Session, work: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if session.in_transaction() {
            return Err(RequestError::UnsupportedShape {
                reason: "transactions cannot be nested".to_string(),
            }
            .into());
        }
        let tx = session
            .guard(async { self.store.begin_transaction().await.map_err(Error::from) })
            .await?;
        let scope = session.for_transaction(tx);

        match work(scope.clone()).await {
            Ok(value) => {
                self.store.commit(tx).await?;
                let (sets, deletes) = scope.cache().writes()?;
                info!(tx = %tx, sets = sets.len(), deletes = deletes.len(), "merging transaction cache");
                let cache = self.tiered_cache(session);
                cache.set_batch(sets, true).await?;
                cache.delete_batch(&deletes, true).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.store.rollback(tx).await {
                    warn!(tx = %tx, error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
