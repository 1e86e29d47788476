use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use products_catalog::{create_router, AppState, MemoryStore, Product, ProductSource};

/// 固定结果的数据源
struct FixedSource(Option<Vec<Product>>);

#[async_trait]
impl ProductSource for FixedSource {
    fn credentials_found(&self) -> bool {
        self.0.is_some()
    }

    async fn fetch_products(&self) -> Option<Vec<Product>> {
        self.0.clone()
    }
}

/// 响应慢于请求超时的数据源
struct SlowSource(Duration);

#[async_trait]
impl ProductSource for SlowSource {
    fn credentials_found(&self) -> bool {
        true
    }

    async fn fetch_products(&self) -> Option<Vec<Product>> {
        tokio::time::sleep(self.0).await;
        Some(Vec::new())
    }
}

struct PanickingSource;

#[async_trait]
impl ProductSource for PanickingSource {
    fn credentials_found(&self) -> bool {
        true
    }

    async fn fetch_products(&self) -> Option<Vec<Product>> {
        panic!("row decoder blew up");
    }
}

fn router_with<S: ProductSource + 'static>(source: S, request_timeout: Duration) -> Router {
    let state = AppState::new(Arc::new(source), Arc::new(MemoryStore::seeded()));
    create_router(state, request_timeout)
}

fn app_with(source: FixedSource) -> Router {
    router_with(source, Duration::from_secs(5))
}

fn unavailable_app() -> Router {
    app_with(FixedSource(None))
}

fn store_product(id: i64, name: &str) -> Product {
    Product {
        id,
        name: name.to_string(),
        price: dec!(10.00),
        created_at: "2024-03-01T12:00:00Z".parse().unwrap(),
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, location, json)
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn unavailable_store_lists_seeded_products() {
    let started = Utc::now();
    let app = unavailable_app();

    let (status, _, body) = send(&app, "GET", "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 2, 3]);

    let products = body.as_array().unwrap();
    assert_eq!(products[0]["name"], "Laptop");
    assert_eq!(products[0]["price"], json!(999.99));
    assert_eq!(products[1]["name"], "Mouse");
    assert_eq!(products[1]["price"], json!(29.99));
    assert_eq!(products[2]["name"], "Keyboard");
    assert_eq!(products[2]["price"], json!(79.99));

    for product in products {
        let created: DateTime<Utc> = product["createdAt"].as_str().unwrap().parse().unwrap();
        assert!(created < started);
    }
}

#[tokio::test]
async fn empty_store_does_not_fall_back() {
    let app = app_with(FixedSource(Some(Vec::new())));

    let (status, _, body) = send(&app, "GET", "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _, _) = send(&app, "GET", "/products/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_rows_are_sorted_by_id() {
    let rows = vec![
        store_product(30, "c"),
        store_product(10, "a"),
        store_product(20, "b"),
    ];
    let app = app_with(FixedSource(Some(rows)));

    let (status, _, body) = send(&app, "GET", "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![10, 20, 30]);

    let (status, _, body) = send(&app, "GET", "/products/20", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "b");
}

#[tokio::test]
async fn create_then_get_from_memory() {
    let app = unavailable_app();
    let before = Utc::now();

    let (status, location, created) = send(
        &app,
        "POST",
        "/products",
        Some(json!({"name": "Monitor", "price": 199.99})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(location.as_deref(), Some("/products/4"));
    assert_eq!(created["id"], 4);
    assert_eq!(created["name"], "Monitor");
    assert_eq!(created["price"], json!(199.99));
    let created_at: DateTime<Utc> = created["createdAt"].as_str().unwrap().parse().unwrap();
    assert!(created_at >= before);

    let (status, _, fetched) = send(&app, "GET", "/products/4", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (_, _, list) = send(&app, "GET", "/products", None).await;
    assert_eq!(ids(&list), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn created_product_is_hidden_while_store_has_rows() {
    let app = app_with(FixedSource(Some(vec![store_product(1, "db")])));

    let (status, _, created) = send(
        &app,
        "POST",
        "/products",
        Some(json!({"name": "Monitor", "price": 199.99})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, _, list) = send(&app, "GET", "/products", None).await;
    assert_eq!(ids(&list), vec![1]);

    let uri = format!("/products/{}", created["id"]);
    let (status, _, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_changes_name_and_price_only() {
    let app = unavailable_app();
    let (_, _, original) = send(&app, "GET", "/products/2", None).await;

    let (status, _, updated) = send(
        &app,
        "PUT",
        "/products/2",
        Some(json!({"name": "Mouse Pro", "price": 34.99})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], 2);
    assert_eq!(updated["name"], "Mouse Pro");
    assert_eq!(updated["price"], json!(34.99));
    assert_eq!(updated["createdAt"], original["createdAt"]);
}

#[tokio::test]
async fn update_missing_product_is_404_and_leaves_list_unchanged() {
    let app = unavailable_app();
    let (_, _, before) = send(&app, "GET", "/products", None).await;

    let (status, _, _) = send(
        &app,
        "PUT",
        "/products/999",
        Some(json!({"name": "Ghost", "price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, after) = send(&app, "GET", "/products", None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn delete_twice_returns_404_second_time() {
    let app = unavailable_app();

    let (status, _, body) = send(&app, "DELETE", "/products/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, _, _) = send(&app, "DELETE", "/products/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, list) = send(&app, "GET", "/products", None).await;
    assert_eq!(ids(&list), vec![2, 3]);
}

#[tokio::test]
async fn delete_nonexistent_is_404() {
    let app = unavailable_app();
    let (status, _, body) = send(&app, "DELETE", "/products/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn malformed_input_is_400() {
    let app = unavailable_app();

    let cases = vec![
        json!({"name": "Monitor", "price": "abc"}),
        json!({"name": "   ", "price": 10}),
        json!({"price": 10}),
        json!({"name": "Monitor"}),
    ];
    for case in cases {
        let (status, _, _) = send(&app, "POST", "/products", Some(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case: {}", case);
    }

    let (status, _, _) = send(&app, "GET", "/products/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, list) = send(&app, "GET", "/products", None).await;
    assert_eq!(ids(&list), vec![1, 2, 3]);
}

#[tokio::test]
async fn health_reports_healthy() {
    let app = unavailable_app();
    let (status, _, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn diagnose_reports_fallback_when_unavailable() {
    let app = unavailable_app();
    let (status, _, body) = send(&app, "GET", "/diagnose", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"credentialsFound": false, "rowsRetrieved": 0, "usedFallback": true})
    );
}

#[tokio::test]
async fn diagnose_reports_row_count_when_available() {
    let app = app_with(FixedSource(Some(vec![
        store_product(1, "a"),
        store_product(2, "b"),
    ])));
    let (_, _, body) = send(&app, "GET", "/diagnose", None).await;
    assert_eq!(
        body,
        json!({"credentialsFound": true, "rowsRetrieved": 2, "usedFallback": false})
    );
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = unavailable_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn slow_store_hits_request_timeout() {
    let app = router_with(SlowSource(Duration::from_secs(5)), Duration::from_millis(200));

    let response = app
        .oneshot(Request::builder().uri("/products").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn handler_panic_becomes_500() {
    let app = router_with(PanickingSource, Duration::from_secs(5));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/products").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));

    // 服务仍可继续处理请求
    let (status, _, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
