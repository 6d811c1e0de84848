//! Postgres-backed store checks.
//! Requires DRINKS_TEST_DATABASE_URL pointing to a scratch database.
use std::env;

use drinks_service::drink::Ingredient;
use drinks_service::store::{MenuStore, PgMenuStore, StoreError};
use sqlx::PgPool;

async fn store() -> Option<PgMenuStore> {
    let url = match env::var("DRINKS_TEST_DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("skipping: DRINKS_TEST_DATABASE_URL not set");
            return None;
        }
    };
    let pool = PgPool::connect(&url).await.expect("connect db");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrate");
    sqlx::query("TRUNCATE drinks RESTART IDENTITY")
        .execute(&pool)
        .await
        .expect("truncate");
    Some(PgMenuStore::new(pool))
}

fn milk(parts: i64) -> Ingredient {
    Ingredient { color: "white".into(), name: "milk".into(), parts }
}

#[tokio::test]
async fn pg_store_round_trip() {
    let Some(store) = store().await else { return };

    let latte = store.create("Latte", &[milk(2)]).await.expect("create latte");
    store.create("Americano", &[]).await.expect("create americano");
    store.create("affogato", &[]).await.expect("create affogato");

    let titles: Vec<String> = store
        .list_all()
        .await
        .expect("list")
        .into_iter()
        .map(|d| d.title)
        .collect();
    // byte order, same as the in-memory store
    assert_eq!(titles, vec!["Americano", "Latte", "affogato"]);

    let err = store.create("Latte", &[]).await.expect_err("duplicate");
    assert!(matches!(err, StoreError::Duplicate(_)));

    let updated = store.update(latte.id, None, Some(&[milk(3)][..])).await.expect("update");
    assert_eq!(updated.title, "Latte");
    assert_eq!(updated.recipe, vec![milk(3)]);

    store.delete(latte.id).await.expect("delete");
    assert!(store.get(latte.id).await.expect("get").is_none());
    assert!(matches!(store.delete(latte.id).await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        store.update(latte.id, Some("Ghost"), None).await,
        Err(StoreError::NotFound(_))
    ));
}
