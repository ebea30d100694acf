use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use docmesh::{
    Address, Client, ClientConfig, EntityRef, FieldMap, Record, RecordDescriptor, Reference,
    Session,
    cache::MemoryCache,
    mapping::{FieldKind, MappingError, Related, required_text},
    store::{DocumentStore, Filter, InMemoryStore, StoreError, TxId},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub spouse: Option<Related<Person>>,
    pub friends: Vec<Related<Person>>,
}

impl Record for Person {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Person")
            .field("id", FieldKind::Scalar)
            .field("name", FieldKind::Scalar)
            .field("spouse", FieldKind::Ref)
            .field("friends", FieldKind::RefList)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn to_fields(&self) -> Result<FieldMap, MappingError> {
        let mut fields = FieldMap::new().with("name", self.name.as_str());
        if let Some(spouse) = &self.spouse {
            fields.insert("spouse", spouse.to_value()?);
        }
        if !self.friends.is_empty() {
            let friends = self
                .friends
                .iter()
                .map(Related::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert("friends", friends);
        }
        Ok(fields)
    }

    fn from_fields(fields: &FieldMap) -> Result<Self, MappingError> {
        Ok(Self {
            id: fields.text("id").unwrap_or_default().to_string(),
            name: required_text(fields, "Person", "name")?,
            spouse: Related::from_field(fields, "spouse")?,
            friends: Related::list_from_field(fields, "friends")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Car {
    pub id: String,
    pub make: String,
    pub year: i64,
    pub owner: Option<Related<Person>>,
    pub passengers: Vec<Related<Person>>,
}

impl Record for Car {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Car")
            .field("id", FieldKind::Scalar)
            .field("make", FieldKind::Scalar)
            .field("year", FieldKind::Scalar)
            .field("owner", FieldKind::Ref)
            .field("passengers", FieldKind::RefList)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Cars without a make cannot be stored.
    fn to_fields(&self) -> Result<FieldMap, MappingError> {
        if self.make.is_empty() {
            return Err(MappingError::MissingField {
                collection: "Car".to_string(),
                field: "make".to_string(),
            });
        }
        let mut fields = FieldMap::new()
            .with("make", self.make.as_str())
            .with("year", self.year);
        if let Some(owner) = &self.owner {
            fields.insert("owner", owner.to_value()?);
        }
        if !self.passengers.is_empty() {
            let passengers = self
                .passengers
                .iter()
                .map(Related::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert("passengers", passengers);
        }
        Ok(fields)
    }

    fn from_fields(fields: &FieldMap) -> Result<Self, MappingError> {
        Ok(Self {
            id: fields.text("id").unwrap_or_default().to_string(),
            make: required_text(fields, "Car", "make")?,
            year: fields.int("year").unwrap_or_default(),
            owner: Related::from_field(fields, "owner")?,
            passengers: Related::list_from_field(fields, "passengers")?,
        })
    }
}

pub fn addr(path: &str) -> Address {
    Address::parse(path).unwrap()
}

/// An unresolved reference to `Person/<id>`.
pub fn person_ref(id: &str) -> Related<Person> {
    Related::Pending(Reference::new(addr(&format!("Person/{id}"))))
}

pub fn person(id: &str, name: &str) -> Person {
    Person {
        id: id.to_string(),
        name: name.to_string(),
        ..Person::default()
    }
}

pub fn car(id: &str, make: &str, owner: Option<&str>) -> Car {
    Car {
        id: id.to_string(),
        make: make.to_string(),
        year: 2001,
        owner: owner.map(person_ref),
        passengers: Vec::new(),
    }
}

/// A client over a fresh store with `Person` and `Car` registered.
pub fn setup() -> (Arc<InMemoryStore>, Client) {
    setup_with(ClientConfig::default())
}

pub fn setup_with(config: ClientConfig) -> (Arc<InMemoryStore>, Client) {
    let store = Arc::new(InMemoryStore::new());
    let mut client = Client::new(store.clone(), config);
    client.register::<Person>().unwrap();
    client.register::<Car>().unwrap();
    (store, client)
}

/// Like [`setup`], with a shared memory cache as second tier.
pub fn setup_shared() -> (Arc<InMemoryStore>, Arc<MemoryCache>, Client) {
    let (store, client) = setup();
    let shared = Arc::new(MemoryCache::default());
    let client = client.with_second_tier(shared.clone());
    (store, shared, client)
}

/// Stores John and Mary, married to each other, and resets the store counters.
pub async fn seed_couple(client: &Client, store: &InMemoryStore) {
    let mut people = vec![person("john", "John"), person("mary", "Mary")];
    people[0].spouse = Some(person_ref("mary"));
    people[1].spouse = Some(person_ref("john"));
    client
        .request()
        .create(&Session::new(), &mut people)
        .await
        .unwrap();
    store.reset_counters();
}

/// Stores records through a throwaway session and resets the store counters.
pub async fn seed<T: Record>(client: &Client, store: &InMemoryStore, mut records: Vec<T>) -> Vec<T> {
    client
        .request()
        .create(&Session::new(), &mut records)
        .await
        .unwrap();
    store.reset_counters();
    records
}

/// Delegates to an in-memory store, optionally slowing down reads or
/// failing one batch fetch.
pub struct WrappedStore {
    pub inner: InMemoryStore,
    read_delay: Duration,
    fail_on_batch: Option<usize>,
    batches: AtomicUsize,
}

impl WrappedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            read_delay: Duration::ZERO,
            fail_on_batch: None,
            batches: AtomicUsize::new(0),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Makes the n-th batch fetch (zero-based) fail.
    pub fn failing_on_batch(mut self, batch: usize) -> Self {
        self.fail_on_batch = Some(batch);
        self
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for WrappedStore {
    fn new_document_id(&self) -> String {
        self.inner.new_document_id()
    }

    async fn fetch_one(&self, tx: Option<TxId>, address: &Address) -> Result<EntityRef, StoreError> {
        self.pause().await;
        self.inner.fetch_one(tx, address).await
    }

    async fn fetch_batch(
        &self,
        tx: Option<TxId>,
        addresses: &[Address],
    ) -> Result<Vec<EntityRef>, StoreError> {
        self.pause().await;
        let batch = self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_batch == Some(batch) {
            return Err(StoreError::Backend {
                reason: "connection reset".to_string(),
            });
        }
        self.inner.fetch_batch(tx, addresses).await
    }

    async fn query(&self, tx: Option<TxId>, filter: &Filter) -> Result<Vec<EntityRef>, StoreError> {
        self.pause().await;
        self.inner.query(tx, filter).await
    }

    async fn create(
        &self,
        tx: Option<TxId>,
        address: &Address,
        fields: FieldMap,
    ) -> Result<(), StoreError> {
        self.inner.create(tx, address, fields).await
    }

    async fn set(
        &self,
        tx: Option<TxId>,
        address: &Address,
        fields: FieldMap,
    ) -> Result<(), StoreError> {
        self.inner.set(tx, address, fields).await
    }

    async fn delete(&self, tx: Option<TxId>, address: &Address) -> Result<(), StoreError> {
        self.inner.delete(tx, address).await
    }

    async fn begin_transaction(&self) -> Result<TxId, StoreError> {
        self.inner.begin_transaction().await
    }

    async fn commit(&self, tx: TxId) -> Result<(), StoreError> {
        self.inner.commit(tx).await
    }

    async fn rollback(&self, tx: TxId) -> Result<(), StoreError> {
        self.inner.rollback(tx).await
    }
}

/// A client over `store` with `Person` and `Car` registered.
pub fn wrapped_client(store: Arc<WrappedStore>, config: ClientConfig) -> Client {
    let mut client = Client::new(store, config);
    client.register::<Person>().unwrap();
    client.register::<Car>().unwrap();
    client
}
