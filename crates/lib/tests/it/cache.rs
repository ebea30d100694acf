use std::{sync::Arc, time::Duration};

use docmesh::{
    FieldMap, LoadPaths, Session, Value,
    cache::{Cache, CacheCodec, CacheEntry, MemoryCache, MemoryCacheConfig},
};

use crate::helpers::*;

fn sample() -> FieldMap {
    FieldMap::new()
        .with("make", "Toyota")
        .with("year", 2001)
        .with("owner", addr("Person/john"))
        .with("passengers", vec![addr("Person/mary"), addr("Person/bob")])
        .with(
            "driver",
            FieldMap::new()
                .with("name", "Mark")
                .with("license", addr("License/l1")),
        )
}

#[test]
fn codec_round_trip() {
    let codec = CacheCodec::new();
    let original = sample();
    let cached = codec.make_cachable(original.clone());

    assert!(cached.get("owner").is_none());
    assert_eq!(cached.get("owner_ref"), Some(&Value::from("Person/john")));
    assert_eq!(
        cached.get("passengers_refs"),
        Some(&Value::from(vec!["Person/mary", "Person/bob"]))
    );

    let restored = codec.make_uncachable(&addr("Car/a"), cached).unwrap();
    assert_eq!(restored, original);
}

#[test]
fn codec_stores_canonical_addresses() {
    let codec = CacheCodec::with_root("projects/p/databases/d");
    let fields = FieldMap::new().with(
        "owner",
        addr("projects/p/databases/d/documents/Person/john"),
    );
    let cached = codec.make_cachable(fields.clone());
    assert_eq!(cached.text("owner_ref"), Some("Person/john"));
    let restored = codec.make_uncachable(&addr("Car/a"), cached).unwrap();
    assert_eq!(restored, fields);
}

#[tokio::test]
async fn second_tier_is_shared_between_sessions() {
    let (store, shared, client) = setup_shared();
    seed(&client, &store, vec![person("john", "John")]).await;
    seed(&client, &store, vec![car("a", "Jeep", Some("john"))]).await;

    // seeding writes through to the shared tier
    assert!(shared.get(&addr("Car/a")).await.unwrap().is_some());

    let fetched = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .get_by_id::<Car>(&Session::new(), &["a"])
        .await
        .wait()
        .await
        .unwrap();
    assert_eq!(
        fetched.records[0].owner.as_ref().unwrap().get().unwrap().name,
        "John"
    );
    assert_eq!(store.counters().fetch_calls, 0);
    assert!(shared.stats().unwrap().hits >= 2);
}

#[tokio::test]
async fn shared_entries_expire() {
    let (store, client) = setup();
    let shared = Arc::new(MemoryCache::new(
        MemoryCacheConfig::new().with_ttl(Duration::from_millis(10)),
    ));
    let client = client.with_second_tier(shared.clone());
    seed(&client, &store, vec![person("john", "John")]).await;

    tokio::time::sleep(Duration::from_millis(30)).await;
    let fetched = client
        .request()
        .get_by_id::<Person>(&Session::new(), &["john"])
        .await
        .wait()
        .await
        .unwrap();
    assert_eq!(fetched.records[0].name, "John");
    assert_eq!(store.counters().fetch_calls, 1);
}

#[tokio::test]
async fn deletes_leave_a_tombstone_in_the_session() {
    let (store, client) = setup();
    let cars = seed(&client, &store, vec![car("a", "Jeep", None)]).await;

    let session = Session::new();
    client.request().delete(&session, &cars).await.unwrap();
    match session.cache().get(&addr("Car/a")).await.unwrap() {
        Some(CacheEntry::Tombstone) => {}
        other => panic!("expected tombstone, got {other:?}"),
    }

    store.reset_counters();
    let fetched = client
        .request()
        .get::<Car>(&session, &cars)
        .await
        .wait()
        .await
        .unwrap();
    assert!(fetched.records.is_empty());
    assert!(fetched.not_found.unwrap().contains(&addr("Car/a")));
    assert_eq!(store.counters().fetch_calls, 0);
}

#[tokio::test]
async fn updates_refresh_the_cache() {
    let (store, shared, client) = setup_shared();
    let mut cars = seed(&client, &store, vec![car("a", "Jeep", None)]).await;

    cars[0].make = "Fiat".to_string();
    client.request().update(&Session::new(), &cars).await.unwrap();

    let cached = shared.get(&addr("Car/a")).await.unwrap().unwrap();
    assert_eq!(cached.into_fields().unwrap().text("make"), Some("Fiat"));
}
