use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use shopfloor_api::{app, AppState};
use shopfloor_catalog::SalesClassifier;
use shopfloor_core::{Order, OrderItem};
use shopfloor_order::{InMemoryOrderStore, ShippingPolicy};

fn placed() -> DateTime<Utc> {
    // Friday
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

async fn seeded_app() -> (Arc<InMemoryOrderStore>, Router) {
    let store = Arc::new(InMemoryOrderStore::new());

    let mut order = Order::new(1001);
    order.approved = true;
    order.order_date = placed();
    order.product_total = dec!(90.00);

    let mut partial = OrderItem::new(1001, 1, "PLQ12-BLK".to_string(), 5, dec!(10.00), dec!(4.00));
    partial.quantity_shipped = 3;
    partial.quantity_needed = 2;
    partial.detail_date = placed();
    let mut done = OrderItem::new(1001, 2, "MUG01".to_string(), 2, dec!(20.00), dec!(5.00));
    done.quantity_shipped = 2;
    done.quantity_needed = 0;
    done.backordered = false;
    done.detail_date = placed();
    let marker = OrderItem::adjustment(1001, 3, "Product".to_string(), dec!(12.00));

    store.seed_order(order, vec![partial, done, marker]).await;

    let state = AppState::new(store.clone(), ShippingPolicy::default(), SalesClassifier::default(), 90);
    (store, app(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (_, app) = seeded_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_advance_item_then_read_station() {
    let (store, app) = seeded_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/items/100101/status",
        Some(json!({
            "status": "Welding",
            "initials": "CDB",
            "note": "second pass",
            "at": "2024-03-05T09:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Welding");

    let (status, body) = send(&app, "GET", "/v1/items/1001.01/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], "100101");
    assert_eq!(body["status"], "Welding");

    let (status, body) = send(
        &app,
        "GET",
        "/v1/items/100101/station?at=2024-03-07T12:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["station_name"], "Welding");
    assert_eq!(body["ordinal"], 2);
    assert_eq!(body["elapsed_business_days"], 2);

    let notes = store.notes().await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].text, "Item 1 in Welding second pass");
}

#[tokio::test]
async fn test_unknown_item_status_reads_cancelled() {
    let (_, app) = seeded_app().await;
    let (status, body) = send(&app, "GET", "/v1/items/100199/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn test_advance_errors_map_to_status_codes() {
    let (_, app) = seeded_app().await;
    let body = json!({ "status": "Welding", "initials": "CDB" });

    let (status, _) = send(&app, "POST", "/v1/items/100109/status", Some(body.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/v1/items/ab/status", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/items/100101/status",
        Some(json!({ "status": "Welding", "initials": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_wide_advance() {
    let (_, app) = seeded_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/orders/1001/status",
        Some(json!({ "status": "Packaging", "initials": "CDB" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skus"], json!(["PLQ12-BLK", "MUG01"]));

    let (status, _) = send(
        &app,
        "POST",
        "/v1/orders/4242/status",
        Some(json!({ "status": "Packaging", "initials": "CDB" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ship_splits_backorder() {
    let (store, app) = seeded_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/orders/1001/ship",
        Some(json!({ "initials": "CDB", "at": "2024-03-06T15:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "SPLIT");
    assert_eq!(body["source_order_number"], 1001);
    assert_eq!(body["successor_order_number"], 1002);
    assert_eq!(body["skus"], json!(["PLQ12-BLK"]));

    let successor = store.items(1002).await;
    assert_eq!(successor.len(), 1);
    assert_eq!(successor[0].quantity_ordered, 2);

    // Marker is gone, so a second ship is not ready
    let (status, body) = send(&app, "POST", "/v1/orders/1001/ship", Some(json!({ "initials": "CDB" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "NOT_READY");
    assert_eq!(body["state"], "SHIPPED");
}

#[tokio::test]
async fn test_aging_report() {
    let (_, app) = seeded_app().await;
    let (status, body) = send(&app, "GET", "/v1/reports/aging?at=2024-03-06T12:00:00Z", None).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["order_string"], "100101");
    assert_eq!(rows[0]["ship_by"], "UNSCHEDULED");
    assert_eq!(body["summary"]["backordered_sets"], 2);

    let (_, body) = send(&app, "GET", "/v1/reports/aging?status=Welding", None).await;
    assert!(body["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_classify_and_insufficient_data() {
    let (_, app) = seeded_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/sales/classify",
        Some(json!({ "units": { "A": 100, "B": 100, "C": 50 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tiers"], json!({ "A": "A", "B": "A", "C": "D" }));

    let (status, _) = send(&app, "POST", "/v1/sales/classify", Some(json!({ "units": {} }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_sales_records_by_family() {
    let (_, app) = seeded_app().await;
    let (status, body) = send(
        &app,
        "GET",
        "/v1/sales/records?skus=PLQ12,MUG01&at=2024-03-20T00:00:00Z",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let records = body["records"].as_array().unwrap();
    assert_eq!(records[0]["sku"], "PLQ12");
    assert_eq!(records[0]["units"], 3);
    assert_eq!(records[1]["units"], 2);
    assert_eq!(records[0]["tier"], "A");

    let (status, _) = send(&app, "GET", "/v1/sales/records?skus=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_business_days() {
    let (_, app) = seeded_app().await;
    let (status, body) = send(
        &app,
        "GET",
        "/v1/calendar/business-days?start=2024-03-01&end=2024-03-04",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["business_days"], 1);
}

#[tokio::test]
async fn test_out_of_range_sales_inputs_are_bad_requests() {
    let (_, app) = seeded_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/v1/sales/classify",
        Some(json!({ "units": { "A": i64::MAX, "B": 1 } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/v1/sales/records?skus=MUG01&days=1000000000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
