use std::sync::Arc;

use docmesh::{ClientConfig, LoadPaths, Session};

use crate::helpers::*;

#[tokio::test]
async fn shared_owner_is_fetched_once() {
    let (store, client) = setup();
    seed(&client, &store, vec![person("john", "John")]).await;
    seed(
        &client,
        &store,
        vec![car("a", "Jeep", Some("john")), car("b", "Fiat", Some("john"))],
    )
    .await;

    let fetched = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .get_by_id::<Car>(&Session::new(), &["a", "b"])
        .await
        .wait()
        .await
        .unwrap();

    assert!(fetched.is_complete());
    assert_eq!(fetched.records.len(), 2);
    for car in &fetched.records {
        let owner = car.owner.as_ref().unwrap().get().unwrap();
        assert_eq!(owner.name, "John");
        assert_eq!(owner.id, "john");
    }
    // one batch for the cars, one for their single owner
    let counters = store.counters();
    assert_eq!(counters.fetch_calls, 2);
    assert_eq!(counters.documents_fetched, 3);
}

#[tokio::test]
async fn resolving_twice_in_one_session_hits_the_cache() {
    let (store, client) = setup();
    seed(&client, &store, vec![person("john", "John")]).await;
    seed(&client, &store, vec![car("a", "Jeep", Some("john"))]).await;

    let session = Session::new();
    let request = client.request().load_paths(LoadPaths::new(["owner"]));
    let first = request
        .get_by_id::<Car>(&session, &["a"])
        .await
        .wait()
        .await
        .unwrap();
    let calls = store.counters().fetch_calls;
    let second = request
        .get_by_id::<Car>(&session, &["a"])
        .await
        .wait()
        .await
        .unwrap();

    assert_eq!(first.records, second.records);
    assert_eq!(store.counters().fetch_calls, calls);
}

#[tokio::test]
async fn spouse_cycle_terminates() {
    let (store, client) = setup();
    seed_couple(&client, &store).await;

    for paths in [LoadPaths::new(["spouse.spouse"]), LoadPaths::all()] {
        let fetched = client
            .request()
            .load_paths(paths)
            .get_by_id::<Person>(&Session::new(), &["john"])
            .await
            .wait()
            .await
            .unwrap();
        let john = &fetched.records[0];
        let mary = john.spouse.as_ref().unwrap().get().unwrap();
        assert_eq!(mary.name, "Mary");
        // the far side points back at the root and stays a plain reference
        let back = mary.spouse.as_ref().unwrap();
        assert!(!back.is_loaded());
        assert_eq!(back.id(), "john");
    }
}

#[tokio::test]
async fn depth_one_drops_references_beyond_scope() {
    let (store, client) = setup();
    seed_couple(&client, &store).await;

    let fetched = client
        .request()
        .load_paths(LoadPaths::new(["spouse"]))
        .get_by_id::<Person>(&Session::new(), &["john"])
        .await
        .wait()
        .await
        .unwrap();
    let mary = fetched.records[0].spouse.as_ref().unwrap().get().unwrap();
    assert!(mary.spouse.is_none());
}

#[tokio::test]
async fn unnamed_references_are_removed() {
    let (store, client) = setup();
    seed(
        &client,
        &store,
        vec![person("john", "John"), person("mary", "Mary")],
    )
    .await;
    let mut jeep = car("a", "Jeep", Some("john"));
    jeep.passengers = vec![person_ref("mary"), person_ref("john")];
    seed(&client, &store, vec![jeep]).await;

    let resolution = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .resolve(&Session::new(), vec![addr("Car/a")])
        .await
        .wait()
        .await
        .unwrap();
    let car = resolution.documents[0].as_ref().unwrap();
    assert!(car.get("passengers").is_none());
    assert_eq!(car.map("owner").unwrap().text("name"), Some("John"));

    let resolution = client
        .request()
        .load_paths(LoadPaths::all())
        .resolve(&Session::new(), vec![addr("Car/a")])
        .await
        .wait()
        .await
        .unwrap();
    let car = resolution.documents[0].as_ref().unwrap();
    let passengers = car.list("passengers").unwrap();
    assert_eq!(passengers[0].as_map().unwrap().text("name"), Some("Mary"));
    assert_eq!(passengers[1].as_map().unwrap().text("id"), Some("john"));
}

#[tokio::test]
async fn missing_documents_are_reported_not_fatal() {
    let (store, client) = setup();
    seed(
        &client,
        &store,
        vec![person("john", "John"), person("mary", "Mary")],
    )
    .await;

    let resolution = client
        .request()
        .resolve(
            &Session::new(),
            vec![addr("Person/john"), addr("Person/ghost"), addr("Person/mary")],
        )
        .await
        .wait()
        .await
        .unwrap();
    assert!(resolution.documents[0].is_some());
    assert!(resolution.documents[1].is_none());
    assert!(resolution.documents[2].is_some());
    let missing = resolution.not_found.unwrap();
    assert_eq!(missing.len(), 1);
    assert!(missing.contains(&addr("Person/ghost")));

    let fetched = client
        .request()
        .get_by_id::<Person>(&Session::new(), &["john", "ghost", "mary"])
        .await
        .wait()
        .await
        .unwrap();
    assert_eq!(fetched.records.len(), 2);
    assert_eq!(fetched.requested(), 3);
    assert_eq!(fetched.get(0).unwrap().name, "John");
    assert!(fetched.get(1).is_none());
    assert_eq!(fetched.get(2).unwrap().name, "Mary");
    assert!(fetched.get(3).is_none());
    assert!(!fetched.is_complete());
    let err = fetched.into_result().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Documents not found: Person/ghost");

    let slots = client
        .request()
        .get_by_id::<Person>(&Session::new(), &["ghost", "mary"])
        .await
        .wait()
        .await
        .unwrap()
        .into_slots();
    assert_eq!(slots.len(), 2);
    assert!(slots[0].is_none());
    assert_eq!(slots[1].as_ref().unwrap().name, "Mary");
}

#[tokio::test]
async fn store_failure_on_a_later_level_fails_the_read() {
    let store = Arc::new(WrappedStore::new().failing_on_batch(1));
    let client = wrapped_client(store.clone(), ClientConfig::default());
    let session = Session::new();
    client
        .request()
        .create(&session, &mut [person("john", "John")])
        .await
        .unwrap();
    client
        .request()
        .create(&session, &mut [car("a", "Jeep", Some("john"))])
        .await
        .unwrap();

    // a fresh session so nothing is served from the cache
    let err = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .get_by_id::<Car>(&Session::new(), &["a"])
        .await
        .wait()
        .await
        .unwrap_err();
    assert!(err.is_store_error());
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(store.batches(), 2);
}

#[tokio::test]
async fn dangling_reference_keeps_its_pointer() {
    let (store, client) = setup();
    seed(&client, &store, vec![car("a", "Jeep", Some("ghost"))]).await;

    let fetched = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .get_by_id::<Car>(&Session::new(), &["a"])
        .await
        .wait()
        .await
        .unwrap();
    let owner = fetched.records[0].owner.as_ref().unwrap();
    assert!(!owner.is_loaded());
    assert_eq!(owner.id(), "ghost");
    assert!(fetched.not_found.unwrap().contains(&addr("Person/ghost")));
}

#[tokio::test]
async fn default_load_paths_come_from_config() {
    let (store, client) = setup_with(
        docmesh::ClientConfig::default().with_default_load_paths(LoadPaths::new(["owner"])),
    );
    seed(&client, &store, vec![person("john", "John")]).await;
    seed(&client, &store, vec![car("a", "Jeep", Some("john"))]).await;

    let fetched = client
        .request()
        .get_by_id::<Car>(&client.session(), &["a"])
        .await
        .wait()
        .await
        .unwrap();
    assert!(fetched.records[0].owner.as_ref().unwrap().is_loaded());
}
