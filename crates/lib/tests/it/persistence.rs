use std::sync::Arc;

use docmesh::{
    Client, ClientConfig, LoadPaths, Session,
    store::{DocumentStore, InMemoryStore},
};

use crate::helpers::*;

#[tokio::test]
async fn saved_documents_resolve_after_reload() {
    let (store, client) = setup();
    seed(&client, &store, vec![person("john", "John")]).await;
    seed(&client, &store, vec![car("a", "Jeep", Some("john"))]).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    store.save_to_file(&path).await.unwrap();

    let loaded = Arc::new(InMemoryStore::load_from_file(&path).await.unwrap());
    assert_eq!(loaded.len().await, 2);

    let mut client = Client::new(loaded.clone(), ClientConfig::default());
    client.register::<Person>().unwrap();
    client.register::<Car>().unwrap();
    let fetched = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .get_by_id::<Car>(&Session::new(), &["a"])
        .await
        .wait()
        .await
        .unwrap();
    let jeep = &fetched.records[0];
    assert_eq!(jeep.make, "Jeep");
    assert_eq!(jeep.year, 2001);
    assert_eq!(jeep.owner.as_ref().unwrap().get().unwrap().name, "John");
}

#[tokio::test]
async fn missing_file_loads_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::load_from_file(dir.path().join("absent.json"))
        .await
        .unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn root_survives_a_round_trip() {
    let store = Arc::new(InMemoryStore::with_root("projects/p/databases/d"));
    let mut client = Client::new(store.clone(), ClientConfig::default());
    client.register::<Person>().unwrap();
    let mut john = person("john", "John");
    john.spouse = Some(person_ref("mary"));
    client
        .request()
        .create(&Session::new(), &mut [john, person("mary", "Mary")])
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    store.save_to_file(&path).await.unwrap();
    let loaded = InMemoryStore::load_from_file(&path).await.unwrap();

    assert_eq!(loaded.root(), Some("projects/p/databases/d"));
    let entity = loaded
        .fetch_one(None, &addr("projects/p/databases/d/documents/Person/john"))
        .await
        .unwrap();
    let spouse = entity.fields().unwrap().reference("spouse").unwrap();
    assert_eq!(spouse.address().canonical().as_str(), "Person/mary");
}
