use docmesh::{
    LoadPaths, Session,
    store::{Filter, Op},
};

use crate::helpers::*;

fn dated(id: &str, year: i64, owner: Option<&str>) -> Car {
    Car {
        year,
        ..car(id, "Jeep", owner)
    }
}

async fn seed_garage() -> (std::sync::Arc<docmesh::store::InMemoryStore>, docmesh::Client) {
    let (store, client) = setup();
    seed(&client, &store, vec![person("john", "John")]).await;
    seed(
        &client,
        &store,
        vec![
            dated("a", 2005, Some("john")),
            dated("b", 1990, None),
            dated("c", 2010, Some("john")),
        ],
    )
    .await;
    (store, client)
}

#[tokio::test]
async fn query_resolves_matching_records() {
    let (store, client) = seed_garage().await;

    let fetched = client
        .request()
        .load_paths(LoadPaths::new(["owner"]))
        .query::<Car>(
            &Session::new(),
            Filter::collection("Car").where_field("year", Op::Ge, 2000),
        )
        .await
        .wait()
        .await
        .unwrap();

    let ids: Vec<&str> = fetched.records.iter().map(|car| car.id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);
    for car in &fetched.records {
        assert_eq!(car.owner.as_ref().unwrap().get().unwrap().name, "John");
    }
    let counters = store.counters();
    assert_eq!(counters.queries, 1);
    // the cars came with the query; only their owner was fetched
    assert_eq!(counters.fetch_calls, 1);
    assert_eq!(counters.documents_fetched, 1);
}

#[tokio::test]
async fn query_results_warm_the_session_cache() {
    let (store, client) = seed_garage().await;
    let session = Session::new();
    let request = client.request().load_paths(LoadPaths::new(["owner"]));

    request
        .query::<Car>(
            &session,
            Filter::collection("Car").where_field("year", Op::Ge, 2000),
        )
        .await
        .wait()
        .await
        .unwrap();
    store.reset_counters();

    let fetched = request
        .get_by_id::<Car>(&session, &["a", "c"])
        .await
        .wait()
        .await
        .unwrap();
    assert_eq!(fetched.records.len(), 2);
    assert_eq!(store.counters().fetch_calls, 0);
}

#[tokio::test]
async fn query_honours_limit_and_empty_results() {
    let (_store, client) = seed_garage().await;

    let fetched = client
        .request()
        .query::<Car>(&Session::new(), Filter::collection("Car").limit(2))
        .await
        .wait()
        .await
        .unwrap();
    assert_eq!(fetched.records.len(), 2);

    let fetched = client
        .request()
        .query::<Car>(
            &Session::new(),
            Filter::collection("Car").where_field("make", Op::Eq, "Trabant"),
        )
        .await
        .wait()
        .await
        .unwrap();
    assert!(fetched.records.is_empty());
    assert!(fetched.is_complete());
}
