//! API tests against the router backed by the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use storefront_core::{
    CartStore, CheckoutStore, InventoryStore, MemoryStorefront, Product, SessionStatus,
};
use storefront_server::{build_router, AppState};
use tower::ServiceExt;

fn app() -> (Router, Arc<MemoryStorefront>) {
    let store = Arc::new(MemoryStorefront::new());
    let state = AppState::new(
        Arc::clone(&store) as Arc<dyn InventoryStore>,
        Arc::clone(&store) as Arc<dyn CartStore>,
        Arc::clone(&store) as Arc<dyn CheckoutStore>,
        chrono::Duration::minutes(30),
    );
    (build_router(state), store)
}

async fn request(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn address_json() -> Value {
    json!({
        "name": "Ada Lovelace",
        "line1": "12 Analytical Way",
        "line2": null,
        "city": "London",
        "region": "Greater London",
        "postal_code": "N1 9GU",
        "country": "GB",
    })
}

async fn seed_product(store: &MemoryStorefront, sku: &str, stock: i64) -> Product {
    store
        .create_product(sku, "Test product", 499, stock, 0)
        .await
        .unwrap()
}

async fn cart_with_item(router: &Router, store: &MemoryStorefront, sku: &str, stock: i64, quantity: u32) -> String {
    seed_product(store, sku, stock).await;
    let (status, body) = request(
        router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "guest", "token": uuid::Uuid::new_v4() },
            "sku": sku,
            "quantity": quantity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let (router, _) = app();
    let (status, body) = request(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn add_item_creates_the_cart_on_first_use() {
    let (router, store) = app();
    seed_product(&store, "TOWEL-01", 10).await;

    let token = uuid::Uuid::new_v4();
    let (status, body) = request(
        &router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "guest", "token": token },
            "sku": "TOWEL-01",
            "quantity": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["lines"][0]["sku"], "TOWEL-01");
    assert_eq!(body["lines"][0]["quantity"], 2);

    // Second add for the same owner lands in the same cart and sums.
    let (status, second) = request(
        &router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "guest", "token": token },
            "sku": "TOWEL-01",
            "quantity": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], body["id"]);
    assert_eq!(second["lines"][0]["quantity"], 5);
}

#[tokio::test]
async fn unknown_sku_is_a_404_envelope() {
    let (router, _) = app();
    let (status, body) = request(
        &router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "guest", "token": uuid::Uuid::new_v4() },
            "sku": "NOPE-00",
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("NOPE-00"));
}

#[tokio::test]
async fn invalid_quantity_is_a_422_with_field_details() {
    let (router, store) = app();
    seed_product(&store, "SOAP-02", 10).await;

    let (status, body) = request(
        &router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "guest", "token": uuid::Uuid::new_v4() },
            "sku": "SOAP-02",
            "quantity": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["field"], "quantity");
    assert_eq!(body["error"]["details"]["limit"], 1000);
}

#[tokio::test]
async fn update_item_sets_the_quantity() {
    let (router, store) = app();
    let cart_id = cart_with_item(&router, &store, "MOP-09", 10, 2).await;
    let cart = store
        .get_cart(storefront_core::CartId::from_uuid(cart_id.parse::<uuid::Uuid>().unwrap()))
        .await
        .unwrap();
    let line_id = cart.lines[0].id;

    let (status, body) = request(
        &router,
        "PUT",
        &format!("/api/cart/items/{line_id}"),
        Some(json!({ "cart_id": cart_id, "quantity": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][0]["quantity"], 7);
}

#[tokio::test]
async fn checkout_session_create_fetch_cancel_round_trip() {
    let (router, store) = app();
    let cart_id = cart_with_item(&router, &store, "TOWEL-01", 10, 4).await;
    let product = store.product_by_sku("TOWEL-01").await.unwrap();

    let (status, session) = request(
        &router,
        "POST",
        "/api/checkout/sessions",
        Some(json!({
            "cart_id": cart_id,
            "shipping_address": address_json(),
            "billing_address": address_json(),
            "shipping_method": "express",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["status"], "active");
    let session_id = session["id"].as_str().unwrap().to_string();
    assert_eq!(store.stock_level(product.id).await.unwrap().quantity, 6);

    let (status, fetched) = request(
        &router,
        "GET",
        &format!("/api/checkout/sessions/{session_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["items"][0]["sku"], "TOWEL-01");
    assert_eq!(fetched["shipping_method"], "express");

    let (status, cancelled) = request(
        &router,
        "POST",
        &format!("/api/checkout/sessions/{session_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(store.stock_level(product.id).await.unwrap().quantity, 10);

    // Cancelling again is a no-op that reports the same terminal state.
    let (status, again) = request(
        &router,
        "POST",
        &format!("/api/checkout/sessions/{session_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "cancelled");
    assert_eq!(store.stock_level(product.id).await.unwrap().quantity, 10);
    assert_eq!(
        store
            .get_session(storefront_core::SessionId::from_uuid(
                session_id.parse::<uuid::Uuid>().unwrap()
            ))
            .await
            .unwrap()
            .status,
        SessionStatus::Cancelled
    );
}

#[tokio::test]
async fn insufficient_stock_is_a_409_naming_every_short_sku() {
    let (router, store) = app();
    let cart_id = cart_with_item(&router, &store, "TOWEL-01", 2, 3).await;

    let (status, body) = request(
        &router,
        "POST",
        "/api/checkout/sessions",
        Some(json!({
            "cart_id": cart_id,
            "shipping_address": address_json(),
            "billing_address": address_json(),
            "shipping_method": "standard",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    let shortages = body["error"]["details"]["shortages"].as_array().unwrap();
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0]["sku"], "TOWEL-01");
    assert_eq!(shortages[0]["requested"], 3);
    assert_eq!(shortages[0]["available"], 2);
}

#[tokio::test]
async fn second_session_on_a_cart_is_a_409() {
    let (router, store) = app();
    let cart_id = cart_with_item(&router, &store, "SOAP-02", 10, 1).await;

    let create = json!({
        "cart_id": cart_id,
        "shipping_address": address_json(),
        "billing_address": address_json(),
        "shipping_method": "standard",
    });
    let (status, _) = request(&router, "POST", "/api/checkout/sessions", Some(create.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(&router, "POST", "/api/checkout/sessions", Some(create)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "SESSION_ALREADY_ACTIVE");
    assert_eq!(body["error"]["details"]["cart_id"], cart_id);
}

#[tokio::test]
async fn merge_endpoint_combines_guest_and_user_carts() {
    let (router, store) = app();
    seed_product(&store, "TOWEL-01", 100).await;

    let guest_token = uuid::Uuid::new_v4();
    let (_, guest_cart) = request(
        &router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "guest", "token": guest_token },
            "sku": "TOWEL-01",
            "quantity": 2,
        })),
    )
    .await;
    let (_, user_cart) = request(
        &router,
        "POST",
        "/api/cart/items",
        Some(json!({
            "owner": { "kind": "user", "user_id": uuid::Uuid::new_v4() },
            "sku": "TOWEL-01",
            "quantity": 3,
        })),
    )
    .await;

    let (status, merged) = request(
        &router,
        "POST",
        "/api/cart/merge",
        Some(json!({
            "guest_cart_id": guest_cart["id"],
            "user_cart_id": user_cart["id"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(merged["id"], user_cart["id"]);
    assert_eq!(merged["lines"][0]["quantity"], 5);
}

#[tokio::test]
async fn admin_product_and_stock_flow() {
    let (router, _) = app();

    let (status, created) = request(
        &router,
        "POST",
        "/api/admin/products",
        Some(json!({
            "sku": "GLOVE-07",
            "name": "Rubber gloves",
            "unit_price_cents": 250,
            "initial_quantity": 5,
            "low_stock_threshold": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["stock"]["quantity"], 5);
    let product_id = created["product"]["id"].as_str().unwrap().to_string();

    let (status, adjusted) = request(
        &router,
        "PUT",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "delta": -2, "reason": "recount", "note": "stocktake" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adjusted["stock"]["quantity"], 3);
    assert_eq!(adjusted["entry"]["reason"], "recount");

    // Reasons outside the closed set are rejected.
    let (status, body) = request(
        &router,
        "PUT",
        &format!("/api/admin/products/{product_id}/stock"),
        Some(json!({ "delta": 1, "reason": "damaged" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, ledger) = request(
        &router,
        "GET",
        &format!("/api/admin/products/{product_id}/ledger?limit=10"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = ledger["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["reason"], "recount");
    assert_eq!(entries[1]["reason"], "initial");

    let (status, stock) = request(
        &router,
        "GET",
        &format!("/api/admin/products/{product_id}/stock"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["quantity"], 3);
}
