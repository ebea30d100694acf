use docmesh::{
    Address, ClientConfig, FieldMap, LoadPaths, Record, RecordDescriptor, Session,
    mapping::{FieldKind, MappingError, Related, record_address, required_text},
    store::{Filter, Op},
};

use crate::helpers::*;

/// A pet lives in the `Pet` sub-collection of its owner.
#[derive(Debug, Clone, PartialEq)]
struct Pet {
    id: String,
    name: String,
    owner: Related<Person>,
}

impl Record for Pet {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Pet")
            .parent_field("owner")
            .field("id", FieldKind::Scalar)
            .field("name", FieldKind::Scalar)
            .field("owner", FieldKind::Ref)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn parent(&self) -> Option<Address> {
        match &self.owner {
            Related::Pending(reference) => Some(reference.address().clone()),
            Related::Loaded(owner) => record_address(owner.as_ref()).ok(),
        }
    }

    fn to_fields(&self) -> Result<FieldMap, MappingError> {
        Ok(FieldMap::new()
            .with("name", self.name.as_str())
            .with("owner", self.owner.to_value()?))
    }

    fn from_fields(fields: &FieldMap) -> Result<Self, MappingError> {
        let owner = Related::from_field(fields, "owner")?.ok_or_else(|| MappingError::MissingField {
            collection: "Pet".to_string(),
            field: "owner".to_string(),
        })?;
        Ok(Self {
            id: fields.text("id").unwrap_or_default().to_string(),
            name: required_text(fields, "Pet", "name")?,
            owner,
        })
    }
}

#[derive(Debug, Default)]
struct Clashing {
    id: String,
}

impl Record for Clashing {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Clashing")
            .field("id", FieldKind::Scalar)
            .field("name", FieldKind::Scalar)
            .field("Name", FieldKind::Scalar)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn to_fields(&self) -> Result<FieldMap, MappingError> {
        Ok(FieldMap::new())
    }

    fn from_fields(_fields: &FieldMap) -> Result<Self, MappingError> {
        Ok(Self::default())
    }
}

#[test]
fn registration_checks_the_id_field() {
    let (_store, mut client) = setup_with(ClientConfig::default());
    let err = client.register::<Clashing>().unwrap_err();
    assert!(err.is_mapping_error());
    assert!(!client.registry().is_registered::<Clashing>());

    let store = std::sync::Arc::new(docmesh::store::InMemoryStore::new());
    let mut client = docmesh::Client::new(store, ClientConfig::default().with_id_field("key"));
    let err = client.register::<Person>().unwrap_err();
    assert!(err.is_mapping_error());
    assert!(err.to_string().contains("key"));
}

#[tokio::test]
async fn sub_collection_records_live_below_their_parent() {
    let (store, mut client) = setup_with(ClientConfig::default().with_parent_field("owner"));
    client.register::<Pet>().unwrap();
    seed(&client, &store, vec![person("john", "John")]).await;

    let rex = Pet {
        id: "rex".to_string(),
        name: "Rex".to_string(),
        owner: person_ref("john"),
    };
    let pets = seed(&client, &store, vec![rex]).await;
    assert_eq!(
        client.address_of(&pets[0]).unwrap().as_str(),
        "Person/john/Pet/rex"
    );
    assert_eq!(
        store.collections().await.get("Person/john/Pet"),
        Some(&1)
    );

    // the parent field is followed even without load paths
    let fetched = client
        .request()
        .load_paths(LoadPaths::none())
        .get::<Pet>(&Session::new(), &pets)
        .await
        .wait()
        .await
        .unwrap();
    let pet = &fetched.records[0];
    assert_eq!(pet.id, "rex");
    assert_eq!(pet.owner.get().unwrap().name, "John");

    let found = client
        .request()
        .query::<Pet>(
            &Session::new(),
            Filter::collection("Person/john/Pet").where_field("name", Op::Eq, "Rex"),
        )
        .await
        .wait()
        .await
        .unwrap();
    assert_eq!(found.records.len(), 1);
    assert!(found.records[0].owner.is_loaded());
}
