//! One configured read or write against the store.

use std::{collections::HashMap, fmt, sync::Arc};

use tracing::debug;

use super::{Client, RequestError};
use crate::{
    Error, Result,
    address::{Address, DOCUMENTS_MARKER, Reference},
    cache::TieredCache,
    doc::{FieldMap, Value},
    entity::EntityRef,
    mapping::Record,
    resolver::{CachedFetcher, GraphResolver, LoadPaths, NotFoundError, Resolution},
    runner::{self, TaskHandle},
    session::Session,
    store::{DocumentStore, Filter},
};

/// Hook run on every flattened document right before it is written.
pub type Mapper = Arc<dyn Fn(&mut FieldMap) + Send + Sync>;

/// Records returned by a read.
///
/// Reads succeed even when some documents are missing: the records that
/// exist are returned and the missing addresses, roots and references alike,
/// are listed in `not_found`.
///
/// `records` is compacted: missing roots are skipped, so `records[i]` is not
/// necessarily the i-th requested document. Use [`Fetched::get`] or
/// [`Fetched::into_slots`] to look records up by request position.
#[derive(Debug)]
pub struct Fetched<T> {
    /// The records found, in request order, without gaps.
    pub records: Vec<T>,
    pub not_found: Option<NotFoundError>,
    /// Index into `records` for every requested position.
    slots: Vec<Option<usize>>,
}

impl<T> Fetched<T> {
    /// Returns the record requested at `position`, or `None` if that
    /// document does not exist.
    pub fn get(&self, position: usize) -> Option<&T> {
        self.slots
            .get(position)
            .copied()
            .flatten()
            .and_then(|index| self.records.get(index))
    }

    /// Number of requested positions, found or not.
    pub fn requested(&self) -> usize {
        self.slots.len()
    }

    /// Returns one entry per requested position, `None` where the document
    /// does not exist.
    pub fn into_slots(self) -> Vec<Option<T>> {
        let mut records: Vec<Option<T>> = self.records.into_iter().map(Some).collect();
        self.slots
            .into_iter()
            .map(|slot| slot.and_then(|index| records.get_mut(index).and_then(Option::take)))
            .collect()
    }

    /// Returns true if every requested and referenced document was found.
    pub fn is_complete(&self) -> bool {
        self.not_found.is_none()
    }

    /// Treats missing documents as an error.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.not_found {
            Some(err) => Err(err.into()),
            None => Ok(self.records),
        }
    }
}

/// A read or write configured with load paths and an optional mapper.
///
/// Created by [`Client::request`]. Reads return a [`TaskHandle`] to await
/// later; writes fan out one task per record and wait for all of them.
#[derive(Clone)]
pub struct Request {
    client: Client,
    paths: LoadPaths,
    mapper: Option<Mapper>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("paths", &self.paths)
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

enum Write {
    Create,
    Update,
    Delete,
}

impl Request {
    pub(crate) fn new(client: Client) -> Self {
        let paths = client.config().default_load_paths.clone();
        Self {
            client,
            paths,
            mapper: None,
        }
    }

    /// Sets the reference paths expanded by reads.
    pub fn load_paths(mut self, paths: LoadPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Sets a hook run on every document before it is written.
    pub fn mapper(mut self, mapper: impl Fn(&mut FieldMap) + Send + Sync + 'static) -> Self {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    pub fn paths(&self) -> &LoadPaths {
        &self.paths
    }

    /// Reads the stored versions of `records`, identified by id and parent.
    pub async fn get<T: Record>(&self, session: &Session, records: &[T]) -> TaskHandle<Fetched<T>> {
        let addresses = match self.addresses_of(records) {
            Ok(addresses) => addresses,
            Err(err) => return TaskHandle::ready(Err(err)),
        };
        self.get_addresses(session, addresses).await
    }

    /// Reads top-level records of type `T` by id.
    pub async fn get_by_id<T: Record>(&self, session: &Session, ids: &[&str]) -> TaskHandle<Fetched<T>> {
        let addresses = ids
            .iter()
            .map(|id| {
                require_id(id)?;
                self.client.address_in::<T>(None, id)
            })
            .collect::<Result<Vec<_>>>();
        match addresses {
            Ok(addresses) => self.get_addresses(session, addresses).await,
            Err(err) => TaskHandle::ready(Err(err)),
        }
    }

    async fn get_addresses<T: Record>(
        &self,
        session: &Session,
        addresses: Vec<Address>,
    ) -> TaskHandle<Fetched<T>> {
        let request = self.clone();
        let scope = session.clone();
        runner::run(session, async move {
            let resolution = request.resolve_addresses(&scope, &addresses).await?;
            request.build(resolution)
        })
        .await
    }

    /// Runs `filter` against the store and resolves every match.
    ///
    /// Every returned document warms the cache before resolution starts.
    pub async fn query<T: Record>(&self, session: &Session, filter: Filter) -> TaskHandle<Fetched<T>> {
        if let Err(err) = self.client.registry().descriptor::<T>() {
            return TaskHandle::ready(Err(err.into()));
        }
        let request = self.clone();
        let scope = session.clone();
        runner::run(session, async move {
            let store = request.client.store().clone();
            let tx = scope.transaction();
            let documents = scope
                .guard(async { store.query(tx, &filter).await.map_err(Error::from) })
                .await?;
            debug!(collection = filter.collection_path(), count = documents.len(), "query returned");

            let warm: HashMap<Address, FieldMap> = documents
                .iter()
                .filter_map(|entity| {
                    entity
                        .fields()
                        .map(|fields| (entity.address().clone(), fields.clone()))
                })
                .collect();
            request
                .client
                .tiered_cache(&scope)
                .set_batch(warm, !scope.in_transaction())
                .await?;

            let resolution = request.resolve_documents(&scope, documents).await?;
            request.build(resolution)
        })
        .await
    }

    /// Resolves raw documents at `addresses` without mapping them to records.
    pub async fn resolve(&self, session: &Session, addresses: Vec<Address>) -> TaskHandle<Resolution> {
        let request = self.clone();
        let scope = session.clone();
        runner::run(session, async move {
            request.resolve_addresses(&scope, &addresses).await
        })
        .await
    }

    /// Creates `records`, generating ids for those without one.
    ///
    /// Every record is written by its own task. A record receives its
    /// generated id only if its write succeeded, so after a failed batch the
    /// caller can tell which records were stored.
    pub async fn create<T: Record>(&self, session: &Session, records: &mut [T]) -> Result<()> {
        self.client.registry().descriptor::<T>()?;
        let store = self.client.store();
        let ids: Vec<String> = records
            .iter()
            .map(|record| match record.id() {
                "" => store.new_document_id(),
                id => id.to_string(),
            })
            .collect();

        let mut handles = Vec::with_capacity(records.len());
        for (record, id) in records.iter().zip(&ids) {
            let prepared = self
                .client
                .address_in::<T>(record.parent().as_ref(), id)
                .and_then(|address| Ok((address, self.flatten(record)?)));
            handles.push(match prepared {
                Ok((address, fields)) => {
                    self.spawn_write(session, Write::Create, address, fields).await
                }
                Err(err) => TaskHandle::ready(Err(err)),
            });
        }

        let results = runner::join_all(handles).await;
        for ((record, id), result) in records.iter_mut().zip(ids).zip(&results) {
            if result.is_ok() && record.id() != id {
                record.set_id(id);
            }
        }
        settle(results)
    }

    /// Replaces the stored documents of `records`.
    pub async fn update<T: Record>(&self, session: &Session, records: &[T]) -> Result<()> {
        let addresses = self.addresses_of(records)?;
        let mut handles = Vec::with_capacity(records.len());
        for (record, address) in records.iter().zip(addresses) {
            handles.push(match self.flatten(record) {
                Ok(fields) => self.spawn_write(session, Write::Update, address, fields).await,
                Err(err) => TaskHandle::ready(Err(err)),
            });
        }
        settle(runner::join_all(handles).await)
    }

    /// Deletes the stored documents of `records`.
    pub async fn delete<T: Record>(&self, session: &Session, records: &[T]) -> Result<()> {
        let addresses = self.addresses_of(records)?;
        let mut handles = Vec::with_capacity(addresses.len());
        for address in addresses {
            handles.push(
                self.spawn_write(session, Write::Delete, address, FieldMap::new())
                    .await,
            );
        }
        settle(runner::join_all(handles).await)
    }

    /// Validates `records` and computes their addresses.
    fn addresses_of<T: Record>(&self, records: &[T]) -> Result<Vec<Address>> {
        self.client.registry().descriptor::<T>()?;
        records
            .iter()
            .map(|record| {
                require_id(record.id())?;
                self.client.address_in::<T>(record.parent().as_ref(), record.id())
            })
            .collect()
    }

    /// Flattens `record` into the document to write.
    fn flatten<T: Record>(&self, record: &T) -> Result<FieldMap> {
        let mut fields = self.client.registry().flatten(record)?;
        if let Some(mapper) = &self.mapper {
            mapper(&mut fields);
        }
        if let Some(root) = self.client.store().root() {
            bind_references(root, &mut fields);
        }
        Ok(fields)
    }

    async fn spawn_write(
        &self,
        session: &Session,
        write: Write,
        address: Address,
        fields: FieldMap,
    ) -> TaskHandle<()> {
        let store = self.client.store().clone();
        let cache = self.client.tiered_cache(session);
        let scope = session.clone();
        runner::run(session, async move {
            write_one(store, cache, &scope, write, address, fields).await
        })
        .await
    }

    async fn resolve_addresses(&self, session: &Session, addresses: &[Address]) -> Result<Resolution> {
        let fetcher = self.fetcher(session);
        self.resolver(&fetcher).resolve_addresses(addresses).await
    }

    async fn resolve_documents(&self, session: &Session, documents: Vec<EntityRef>) -> Result<Resolution> {
        let fetcher = self.fetcher(session);
        self.resolver(&fetcher).resolve(documents).await
    }

    fn fetcher(&self, session: &Session) -> CachedFetcher {
        CachedFetcher::new(
            self.client.tiered_cache(session),
            self.client.store().clone(),
            session.clone(),
        )
    }

    fn resolver<'a>(&self, fetcher: &'a CachedFetcher) -> GraphResolver<'a> {
        let config = self.client.config();
        GraphResolver::new(fetcher, self.paths.clone())
            .with_id_field(config.id_field.clone())
            .with_parent_field(config.parent_field.clone())
    }

    /// Maps every resolved document back to a record.
    fn build<T: Record>(&self, resolution: Resolution) -> Result<Fetched<T>> {
        let registry = self.client.registry();
        let mut slots = Vec::with_capacity(resolution.documents.len());
        let mut found = 0;
        for document in &resolution.documents {
            slots.push(document.as_ref().map(|_| found));
            found += usize::from(document.is_some());
        }
        let results = resolution
            .documents
            .iter()
            .flatten()
            .map(|fields| registry.build::<T>(fields).map_err(Error::from))
            .collect();
        Ok(Fetched {
            records: runner::combine(results)?,
            not_found: resolution.not_found,
            slots,
        })
    }
}

async fn write_one(
    store: Arc<dyn DocumentStore>,
    cache: TieredCache,
    session: &Session,
    write: Write,
    address: Address,
    fields: FieldMap,
) -> Result<()> {
    let tx = session.transaction();
    let deep = !session.in_transaction();
    match write {
        Write::Create => {
            session
                .guard(async { store.create(tx, &address, fields.clone()).await.map_err(Error::from) })
                .await?;
            cache.set(&address, fields, deep).await?;
        }
        Write::Update => {
            session
                .guard(async { store.set(tx, &address, fields.clone()).await.map_err(Error::from) })
                .await?;
            cache.set(&address, fields, deep).await?;
        }
        Write::Delete => {
            session
                .guard(async { store.delete(tx, &address).await.map_err(Error::from) })
                .await?;
            cache.delete(&address, deep).await?;
        }
    }
    Ok(())
}

/// A single write reports its own error; larger batches join every failure.
fn settle(mut results: Vec<Result<()>>) -> Result<()> {
    if results.len() == 1 {
        return results.pop().unwrap_or(Ok(()));
    }
    runner::combine(results).map(|_| ())
}

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(RequestError::UnsupportedShape {
            reason: "record has no id".to_string(),
        }
        .into());
    }
    if id.contains('/') {
        return Err(RequestError::UnsupportedShape {
            reason: format!("id '{id}' contains a path separator"),
        }
        .into());
    }
    Ok(())
}

/// Moves canonical references below the store root.
fn bind_references(root: &str, fields: &mut FieldMap) {
    for (_, value) in fields.iter_mut() {
        bind_value(root, value);
    }
}

fn bind_value(root: &str, value: &mut Value) {
    match value {
        Value::Ref(reference) if reference.address().is_canonical() => {
            let path = format!("{root}{DOCUMENTS_MARKER}{}", reference.address());
            if let Ok(address) = Address::parse(path) {
                *reference = Reference::new(address);
            }
        }
        Value::Map(nested) => bind_references(root, nested),
        Value::List(items) => {
            for item in items {
                bind_value(root, item);
            }
        }
        _ => {}
    }
}
