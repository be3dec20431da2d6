use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use hermes_core::testutil::{CITIES_URL, MockBrowser, MockReporter, SEARCH_URL, make_test_results};
use hermes_core::{Refresh, RunOutcome};
use hermes_server::error::FETCH_ERROR_MESSAGE;
use hermes_server::routes::UNAVAILABLE_MESSAGE;

use crate::integration::common::{TestApp, setup_test_app};

async fn get(app: &TestApp, uri: &str) -> Response {
    app.router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn working_browser() -> MockBrowser {
    MockBrowser::new()
        .with_page(CITIES_URL, r#"[{"id": 23, "name": "Riyadh"}]"#)
        .with_page(SEARCH_URL, r#"{"trips": 4}"#)
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn data_returns_503_before_any_run() {
    let app = setup_test_app().await;

    let response = get(&app, "/api/data").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(response).await, UNAVAILABLE_MESSAGE);
}

#[tokio::test]
async fn data_returns_snapshot_after_successful_run() {
    let app = setup_test_app().await;
    let browser = working_browser();

    let refresh = app.engine(browser.clone()).refresh(&MockReporter::new()).await;
    assert!(matches!(refresh, Refresh::Ran(ref record) if record.outcome.is_success()));

    let response = get(&app, "/api/data").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["info"]["name"], "test catalog");
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), app.catalog.len());
    assert_eq!(results[0]["name"], "cities");
    assert_eq!(results[0]["data"][0]["name"], "Riyadh");
    assert_eq!(results[1]["name"], "home & search");
    assert_eq!(results[1]["request"]["method"], "POST");
    assert_eq!(results[1]["data"], serde_json::json!({"trips": 4}));

    // The search navigation left the browser as a form POST.
    let requests = browser.requests();
    assert_eq!(requests[1].method, "POST");
    assert_eq!(
        requests[1].body.as_deref(),
        Some("from_city=23&tripDate=2025-01-06")
    );
}

#[tokio::test]
async fn non_json_page_is_served_as_raw_text() {
    let app = setup_test_app().await;
    let browser = MockBrowser::new()
        .with_page(CITIES_URL, "not json")
        .with_page(SEARCH_URL, "{}");

    app.engine(browser).refresh(&MockReporter::new()).await;

    let json = body_json(get(&app, "/api/data").await).await;
    assert_eq!(
        json["results"][0]["data"],
        serde_json::json!({"rawText": "not json"})
    );
}

#[tokio::test]
async fn cold_cache_falls_back_to_store_then_serves_from_cache() {
    let app = setup_test_app().await;
    for result in make_test_results(&app.catalog) {
        app.repo.insert(&result).await.unwrap();
    }

    let response = get(&app, "/api/data").await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["results"].as_array().unwrap().len(), 2);
    assert_eq!(first["results"][0]["data"], serde_json::json!({"index": 0}));

    // Once cached, the store is no longer consulted.
    sqlx::query("DELETE FROM snapshot_results")
        .execute(&app.pool)
        .await
        .unwrap();

    let response = get(&app, "/api/data").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, first);
}

#[tokio::test]
async fn data_returns_500_when_store_is_unreachable() {
    let app = setup_test_app().await;
    sqlx::query("DROP TABLE snapshot_results")
        .execute(&app.pool)
        .await
        .unwrap();

    let response = get(&app, "/api/data").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, FETCH_ERROR_MESSAGE);
    assert!(app.cache.get().await.is_none());
}

#[tokio::test]
async fn failed_run_keeps_serving_previous_snapshot() {
    let app = setup_test_app().await;
    app.engine(working_browser())
        .refresh(&MockReporter::new())
        .await;
    let before = body_json(get(&app, "/api/data").await).await;

    let failing = MockBrowser::new()
        .with_page(CITIES_URL, r#"[{"id": 1}]"#)
        .with_navigation_error(SEARCH_URL, "net::ERR_CONNECTION_RESET");
    let refresh = app.engine(failing).refresh(&MockReporter::new()).await;
    assert!(matches!(
        refresh,
        Refresh::Ran(ref record) if matches!(record.outcome, RunOutcome::Failed { .. })
    ));

    // The store holds only the prefix of the failed run...
    let stored = app.repo.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "cities");

    // ...while the cache still serves the last complete snapshot.
    let response = get(&app, "/api/data").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, before);
}

#[tokio::test]
async fn status_reports_last_run() {
    let app = setup_test_app().await;

    let json = body_json(get(&app, "/api/status").await).await;
    assert_eq!(json["running"], false);
    assert_eq!(json["runs_started"], 0);
    assert_eq!(json["targets"], 2);
    assert!(json["last_run"].is_null());

    let failing = MockBrowser::new().with_navigation_error(CITIES_URL, "net::ERR_NAME_NOT_RESOLVED");
    app.engine(failing).refresh(&MockReporter::new()).await;

    let response = get(&app, "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["runs_started"], 1);
    assert_eq!(json["runs_failed"], 1);
    assert_eq!(json["last_run"]["status"], "failed");
    assert_eq!(json["last_run"]["error_kind"], "navigation_error");
    assert!(json["last_run"]["results"].is_null());
}
