use chrono::{TimeDelta, Utc};
use hermes_core::models::{ExtractionResult, parse_body};
use hermes_core::testutil::{make_test_results, test_catalog};
use hermes_core::{HttpMethod, SnapshotStore};
use hermes_db::SnapshotRepository;

use crate::integration::common::setup_test_db;

#[tokio::test]
async fn insert_and_list_round_trips_results() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool);
    let catalog = test_catalog();

    for result in make_test_results(&catalog) {
        repo.insert(&result).await.unwrap();
    }

    let listed = repo.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "cities");
    assert_eq!(listed[0].request.method, HttpMethod::Get);
    assert_eq!(listed[0].data, serde_json::json!({"index": 0}));
    assert_eq!(listed[1].name, "home & search");
    assert_eq!(listed[1].request.method, HttpMethod::Post);
    assert_eq!(
        listed[1].request.url,
        "https://api.example.com/rest/sponsors/home.json?page=1"
    );
}

#[tokio::test]
async fn list_orders_by_fetched_at_then_insertion() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool);
    let catalog = test_catalog();
    let targets = catalog.targets();
    let now = Utc::now();

    // Inserted out of time order; the last two share a timestamp.
    let late = ExtractionResult::new(&targets[0], parse_body("\"late\""), now + TimeDelta::seconds(5));
    let tie_a = ExtractionResult::new(&targets[1], parse_body("\"a\""), now);
    let tie_b = ExtractionResult::new(&targets[0], parse_body("\"b\""), now);
    repo.insert(&late).await.unwrap();
    repo.insert(&tie_a).await.unwrap();
    repo.insert(&tie_b).await.unwrap();

    let data: Vec<_> = repo
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.data)
        .collect();
    assert_eq!(
        data,
        vec![
            serde_json::json!("a"),
            serde_json::json!("b"),
            serde_json::json!("late"),
        ]
    );
}

#[tokio::test]
async fn raw_text_results_survive_storage() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool);
    let catalog = test_catalog();

    let result = ExtractionResult::new(
        &catalog.targets()[0],
        parse_body("<html>maintenance</html>"),
        Utc::now(),
    );
    repo.insert(&result).await.unwrap();

    let listed = repo.list().await.unwrap();
    assert!(listed[0].is_raw_text());
    assert_eq!(listed[0].data_hash(), result.data_hash());
}

#[tokio::test]
async fn nul_characters_survive_storage() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool);
    let catalog = test_catalog();

    let raw = ExtractionResult::new(&catalog.targets()[0], parse_body("a\0b"), Utc::now());
    assert_eq!(raw.data, serde_json::json!({"rawText": "a\u{0}b"}));
    let escaped = ExtractionResult::new(
        &catalog.targets()[1],
        parse_body(r#"{"note": "x\u0000y"}"#),
        Utc::now() + TimeDelta::milliseconds(1),
    );
    repo.insert(&raw).await.unwrap();
    repo.insert(&escaped).await.unwrap();

    let listed = repo.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].data, serde_json::json!({"rawText": "a\u{0}b"}));
    assert_eq!(listed[1].data["note"], "x\u{0}y");
}

#[tokio::test]
async fn clear_removes_everything() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool);
    let catalog = test_catalog();

    for result in make_test_results(&catalog) {
        repo.insert(&result).await.unwrap();
    }
    assert_eq!(repo.count().await.unwrap(), 2);

    let removed = SnapshotStore::clear(&repo).await.unwrap();
    assert_eq!(removed, 2);
    assert!(repo.list().await.unwrap().is_empty());
    assert_eq!(SnapshotStore::clear(&repo).await.unwrap(), 0);
}

#[tokio::test]
async fn list_on_missing_table_is_database_error() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool.clone());

    sqlx::query("DROP TABLE snapshot_results")
        .execute(&pool)
        .await
        .unwrap();

    let err = repo.list().await.unwrap_err();
    assert!(matches!(err, hermes_core::AppError::DatabaseError(_)));
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    let repo = SnapshotRepository::new(pool);
    repo.health_check().await.unwrap();
}
