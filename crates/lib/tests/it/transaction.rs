use docmesh::{Error, Session, runner::TaskError, store::DocumentStore};

use crate::helpers::*;

async fn read_make(client: &docmesh::Client, session: &Session, id: &str) -> Option<String> {
    let fetched = client
        .request()
        .get_by_id::<Car>(session, &[id])
        .await
        .wait()
        .await
        .unwrap();
    fetched.records.first().map(|car| car.make.clone())
}

#[tokio::test]
async fn writes_are_private_until_commit() {
    let (store, _shared, client) = setup_shared();
    seed(&client, &store, vec![car("x", "Fiat", None)]).await;

    let outer = client.clone();
    let session = Session::new();
    client
        .run_in_transaction(&session, |tx| async move {
            let mut jeep = car("x", "Jeep", None);
            jeep.year = 2020;
            outer.request().update(&tx, &[jeep]).await?;
            outer
                .request()
                .create(&tx, &mut [car("y", "Lada", None)])
                .await?;

            assert_eq!(read_make(&outer, &tx, "x").await.as_deref(), Some("Jeep"));
            assert_eq!(read_make(&outer, &tx, "y").await.as_deref(), Some("Lada"));

            // an unrelated session still sees the committed state
            let other = Session::new();
            assert_eq!(read_make(&outer, &other, "x").await.as_deref(), Some("Fiat"));
            assert_eq!(read_make(&outer, &other, "y").await, None);
            Ok::<(), Error>(())
        })
        .await
        .unwrap();

    assert_eq!(read_make(&client, &Session::new(), "x").await.as_deref(), Some("Jeep"));
    assert_eq!(read_make(&client, &Session::new(), "y").await.as_deref(), Some("Lada"));
    // the committed writes reached the session that opened the transaction
    store.reset_counters();
    assert_eq!(read_make(&client, &session, "x").await.as_deref(), Some("Jeep"));
    assert_eq!(store.counters().fetch_calls, 0);
}

#[tokio::test]
async fn rollback_discards_writes() {
    let (store, _shared, client) = setup_shared();
    seed(&client, &store, vec![car("x", "Fiat", None)]).await;

    let outer = client.clone();
    let session = Session::new();
    let err = client
        .run_in_transaction(&session, |tx| async move {
            outer
                .request()
                .update(&tx, &[car("x", "Jeep", None)])
                .await?;
            outer.request().delete(&tx, &[car("x", "Jeep", None)]).await?;
            assert_eq!(read_make(&outer, &tx, "x").await, None);
            Err::<(), Error>(TaskError::Aborted {
                reason: "changed my mind".to_string(),
            }
            .into())
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("changed my mind"));

    assert_eq!(read_make(&client, &session, "x").await.as_deref(), Some("Fiat"));
    assert_eq!(read_make(&client, &Session::new(), "x").await.as_deref(), Some("Fiat"));
    let stored = store.fetch_one(None, &addr("Car/x")).await.unwrap();
    assert_eq!(stored.fields().unwrap().text("make"), Some("Fiat"));
}

#[tokio::test]
async fn work_inside_a_transaction_runs_inline() {
    let (store, client) = setup();
    seed(&client, &store, vec![car("x", "Fiat", None)]).await;

    let outer = client.clone();
    client
        .run_in_transaction(&Session::new(), |tx| async move {
            let handle = outer.request().get_by_id::<Car>(&tx, &["x"]).await;
            assert!(handle.is_ready());
            assert_eq!(handle.wait().await?.records[0].make, "Fiat");
            Ok::<(), Error>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn create_conflict_fails_commit() {
    let (store, client) = setup();

    let outer = client.clone();
    let racer = client.clone();
    let racing_store = store.clone();
    let err = client
        .run_in_transaction(&Session::new(), |tx| async move {
            outer.request().create(&tx, &mut [car("z", "Jeep", None)]).await?;
            // someone else stores the same id first
            racer
                .request()
                .create(&Session::new(), &mut [car("z", "Fiat", None)])
                .await?;
            Ok::<(), Error>(())
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let stored = racing_store.fetch_one(None, &addr("Car/z")).await.unwrap();
    assert_eq!(stored.fields().unwrap().text("make"), Some("Fiat"));
}
