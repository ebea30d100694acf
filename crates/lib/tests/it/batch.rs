use std::collections::HashSet;

use docmesh::{
    Error, FieldMap, Record, RecordDescriptor, Session,
    mapping::{FieldKind, MappingError},
};

use crate::helpers::*;

#[tokio::test]
async fn create_generates_distinct_ids() {
    let (store, client) = setup();
    let mut cars: Vec<Car> = (0..5).map(|_| car("", "Jeep", None)).collect();

    client
        .request()
        .create(&Session::new(), &mut cars)
        .await
        .unwrap();

    let ids: HashSet<&str> = cars.iter().map(|car| car.id.as_str()).collect();
    assert_eq!(ids.len(), 5);
    assert!(!ids.contains(""));
    assert_eq!(store.counters().writes, 5);

    let stored = client
        .request()
        .get::<Car>(&Session::new(), &cars)
        .await
        .wait()
        .await
        .unwrap();
    assert!(stored.is_complete());
    assert_eq!(stored.records.len(), 5);
}

#[tokio::test]
async fn failed_records_keep_no_id() {
    let (_store, client) = setup();
    let mut cars = vec![car("", "Jeep", None), car("", "", None), car("", "Fiat", None)];

    let err = client
        .request()
        .create(&Session::new(), &mut cars)
        .await
        .unwrap_err();
    assert!(err.is_batch_error());
    let Error::Batch(batch) = err else {
        unreachable!()
    };
    assert_eq!(batch.len(), 1);
    assert!(batch.failures()[0].is_mapping_error());

    assert!(!cars[0].id.is_empty());
    assert!(cars[1].id.is_empty());
    assert!(!cars[2].id.is_empty());
}

#[tokio::test]
async fn single_create_conflict_is_reported_directly() {
    let (store, client) = setup();
    seed(&client, &store, vec![car("a", "Jeep", None)]).await;

    let err = client
        .request()
        .create(&Session::new(), &mut [car("a", "Fiat", None)])
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(!err.is_batch_error());
}

#[tokio::test]
async fn writes_without_id_are_rejected_before_the_store() {
    let (store, client) = setup();
    let session = Session::new();

    let err = client
        .request()
        .update(&session, &[car("", "Jeep", None)])
        .await
        .unwrap_err();
    assert!(err.is_unsupported_shape());

    let err = client
        .request()
        .delete(&session, &[car("", "Jeep", None)])
        .await
        .unwrap_err();
    assert!(err.is_unsupported_shape());

    let err = client
        .request()
        .get_by_id::<Car>(&session, &["a/b"])
        .await
        .wait()
        .await
        .unwrap_err();
    assert!(err.is_unsupported_shape());

    assert_eq!(store.counters().writes, 0);
    assert_eq!(store.counters().fetch_calls, 0);
}

#[derive(Debug, Default)]
struct Bike {
    id: String,
}

impl Record for Bike {
    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::new("Bike").field("id", FieldKind::Scalar)
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

    fn from_fields(fields: &FieldMap) -> Result<Self, MappingError> {
        Ok(Self {
            id: fields.text("id").unwrap_or_default().to_string(),
        })
    }
}

#[tokio::test]
async fn unregistered_types_are_refused() {
    let (store, client) = setup();
    let session = Session::new();

    let err = client
        .request()
        .create(&session, &mut [Bike::default()])
        .await
        .unwrap_err();
    assert!(err.is_mapping_error());

    let err = client
        .request()
        .get_by_id::<Bike>(&session, &["b1"])
        .await
        .wait()
        .await
        .unwrap_err();
    assert!(err.is_mapping_error());
    assert_eq!(store.counters().writes, 0);
}
