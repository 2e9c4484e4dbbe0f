//! HTTP API tests against in-memory cart persistence.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;
use tower::ServiceExt;

use iwishbag_cart::{CartContents, CartItem, CartItemMetadata, CartPersistence};
use iwishbag_core::{CurrencyCode, QuoteStatus, UserId};
use iwishbag_integration_tests::{TestApp, approved_quote, decimal, item_ids};
use iwishbag_storefront::middleware::{REQUEST_ID_HEADER, USER_ID_HEADER};

// =============================================================================
// Health & Auth
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let live = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.body, json!("ok"));

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn test_cart_requires_user_header() {
    let app = TestApp::new();

    let missing = app.request(Method::GET, "/api/cart", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["error"], "unauthorized");

    let request = Request::builder()
        .uri("/api/cart")
        .header(USER_ID_HEADER, "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let malformed = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let response = app.get("/api/cart", UserId::generate()).await;
    assert!(response.headers.contains_key(REQUEST_ID_HEADER));
}

// =============================================================================
// Cart Operations
// =============================================================================

#[tokio::test]
async fn test_new_cart_is_empty_and_synced() {
    let app = TestApp::new();
    let user = UserId::generate();

    let cart = app.get("/api/cart", user).await;

    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["items"], json!([]));
    assert_eq!(cart.body["sync_status"], "synced");
    assert_eq!(cart.body["initialized"], true);
    assert_eq!(cart.body["user_id"], user.to_string());
}

#[tokio::test]
async fn test_add_item_then_add_again() {
    let app = TestApp::new();
    let user = UserId::generate();
    let quote = approved_quote("120.50", "IN");

    let first = app.add_quote(user, &quote).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["metadata"]["total_items"], 1);
    assert_eq!(
        decimal(&first.body["metadata"]["total_value_usd"]),
        "120.50".parse().unwrap()
    );

    let second = app.add_quote(user, &quote).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(item_ids(&second.body), vec![quote.id.to_string()]);

    // Persisted once.
    assert_eq!(app.persistence.save_calls(), 1);
    assert_eq!(app.persistence.get(user).unwrap().version, 1);
}

#[tokio::test]
async fn test_add_with_metadata() {
    let app = TestApp::new();
    let user = UserId::generate();
    let quote = approved_quote("10", "NP");
    let body = json!({
        "quote": quote,
        "metadata": { "added_from": "quote_page", "priority": "high", "notes": "birthday" }
    });

    let response = app.post("/api/cart/items", user, Some(&body)).await;

    assert_eq!(response.status, StatusCode::CREATED);
    let item: CartItem = serde_json::from_value(response.body["items"][0].clone()).unwrap();
    assert_eq!(item.metadata.notes.as_deref(), Some("birthday"));
    assert_ne!(item.metadata, CartItemMetadata::default());
}

#[tokio::test]
async fn test_add_unapproved_quote_is_unprocessable() {
    let app = TestApp::new();
    let user = UserId::generate();
    let mut quote = approved_quote("10", "IN");
    quote.status = QuoteStatus::Pending;

    let response = app.add_quote(user, &quote).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "validation_failed");
    assert_eq!(app.persistence.save_calls(), 0);
}

#[tokio::test]
async fn test_remove_item() {
    let app = TestApp::new();
    let user = UserId::generate();
    let keep = approved_quote("10", "IN");
    let drop = approved_quote("20", "IN");
    app.add_quote(user, &keep).await;
    app.add_quote(user, &drop).await;

    let response = app
        .delete(&format!("/api/cart/items/{}", drop.id), user)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(item_ids(&response.body), vec![keep.id.to_string()]);
    assert_eq!(response.body["metadata"]["total_items"], 1);

    let missing = app
        .delete(&format!("/api/cart/items/{}", drop.id), user)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "item_not_found");
}

#[tokio::test]
async fn test_update_item_metadata() {
    let app = TestApp::new();
    let user = UserId::generate();
    let quote = approved_quote("10", "IN");
    app.add_quote(user, &quote).await;

    let response = app
        .patch(
            &format!("/api/cart/items/{}", quote.id),
            user,
            &json!({ "notes": "ship together", "priority": "low" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["metadata"]["notes"], "ship together");
    assert_eq!(response.body["metadata"]["priority"], "low");
}

#[tokio::test]
async fn test_toggle_item() {
    let app = TestApp::new();
    let user = UserId::generate();
    let body = json!({ "quote": approved_quote("10", "IN") });

    let on = app.post("/api/cart/toggle", user, Some(&body)).await;
    assert_eq!(on.status, StatusCode::OK);
    assert_eq!(on.body["added"], true);
    assert_eq!(on.body["cart"]["metadata"]["total_items"], 1);

    let off = app.post("/api/cart/toggle", user, Some(&body)).await;
    assert_eq!(off.body["added"], false);
    assert_eq!(off.body["cart"]["items"], json!([]));
}

#[tokio::test]
async fn test_clear_then_undo() {
    let app = TestApp::new();
    let user = UserId::generate();
    let a = approved_quote("10", "IN");
    let b = approved_quote("15", "NP");
    app.add_quote(user, &a).await;
    app.add_quote(user, &b).await;

    let cleared = app.delete("/api/cart", user).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["removed"], 2);
    assert_eq!(cleared.body["cart"]["items"], json!([]));

    let undone = app.post("/api/cart/undo", user, None).await;
    assert_eq!(undone.body["restored"], true);
    assert_eq!(
        item_ids(&undone.body["cart"]),
        vec![a.id.to_string(), b.id.to_string()]
    );

    let again = app.post("/api/cart/undo", user, None).await;
    assert_eq!(again.body["restored"], true);
    assert_eq!(item_ids(&again.body["cart"]), vec![a.id.to_string()]);
}

#[tokio::test]
async fn test_summary_groups_by_destination() {
    let app = TestApp::new();
    let user = UserId::generate();
    app.add_quote(user, &approved_quote("10", "NP")).await;
    app.add_quote(user, &approved_quote("20", "IN")).await;
    app.add_quote(user, &approved_quote("5", "IN")).await;

    let summary = app.get("/api/cart/summary", user).await;

    assert_eq!(summary.status, StatusCode::OK);
    assert_eq!(summary.body["total_items"], 3);
    let groups = summary.body["by_destination"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["destination_country"], "IN");
    assert_eq!(groups[0]["item_count"], 2);
    assert_eq!(
        decimal(&groups[0]["total_value_usd"]),
        "25".parse().unwrap()
    );
    assert_eq!(groups[1]["destination_country"], "NP");
}

#[tokio::test]
async fn test_analytics_counts_operations() {
    let app = TestApp::new();
    let user = UserId::generate();
    let quote = approved_quote("10", "IN");
    app.add_quote(user, &quote).await;
    app.delete(&format!("/api/cart/items/{}", quote.id), user)
        .await;

    let analytics = app.get("/api/cart/analytics", user).await;

    assert_eq!(analytics.body["add_count"], 1);
    assert_eq!(analytics.body["remove_count"], 1);
    assert_eq!(analytics.body["failure_count"], 0);
}

// =============================================================================
// Persistence Failures & Sync
// =============================================================================

#[tokio::test]
async fn test_persistence_failure_rolls_back() {
    let app = TestApp::new();
    let user = UserId::generate();
    app.add_quote(user, &approved_quote("10", "IN")).await;

    app.persistence.fail_next_saves(1);
    let failed = app.add_quote(user, &approved_quote("99", "IN")).await;

    assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
    assert_eq!(failed.body["error"], "persistence_unavailable");

    let cart = app.get("/api/cart", user).await;
    assert_eq!(cart.body["metadata"]["total_items"], 1);
    assert_eq!(
        decimal(&cart.body["metadata"]["total_value_usd"]),
        "10".parse().unwrap()
    );
    assert_eq!(cart.body["sync_status"], "error");
}

#[tokio::test]
async fn test_write_from_another_device_conflicts() {
    let app = TestApp::new();
    let user = UserId::generate();
    app.get("/api/cart", user).await;

    // Another device saves first.
    let mut remote = CartContents::empty(CurrencyCode::USD);
    remote.items.push(CartItem::new(
        approved_quote("42", "GB"),
        CartItemMetadata::default(),
    ));
    app.persistence
        .save_cart_state(user, &remote, None)
        .await
        .unwrap();

    let response = app.add_quote(user, &approved_quote("10", "IN")).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "conflict");

    let cart = app.get("/api/cart", user).await;
    assert_eq!(cart.body["sync_status"], "conflict");
    assert_eq!(item_ids(&cart.body), vec![remote.items[0].id.to_string()]);
    assert_eq!(cart.body["version"], 1);
}

#[tokio::test]
async fn test_sync_pulls_and_push_overwrites() {
    let app = TestApp::new();
    let user = UserId::generate();
    app.add_quote(user, &approved_quote("10", "IN")).await;

    let mut remote = CartContents::empty(CurrencyCode::USD);
    remote.items.push(CartItem::new(
        approved_quote("7", "NP"),
        CartItemMetadata::default(),
    ));
    app.persistence
        .save_cart_state(user, &remote, None)
        .await
        .unwrap();

    let synced = app.post("/api/cart/sync", user, None).await;
    assert_eq!(synced.status, StatusCode::OK);
    assert_eq!(item_ids(&synced.body), vec![remote.items[0].id.to_string()]);
    assert_eq!(synced.body["version"], 2);

    let pushed = app.post("/api/cart/push", user, None).await;
    assert_eq!(pushed.status, StatusCode::OK);
    assert_eq!(pushed.body["version"], 3);
    assert_eq!(app.persistence.get(user).unwrap().version, 3);
}

#[tokio::test]
async fn test_event_stream_delivers_cart_events() {
    let app = TestApp::new();
    let user = UserId::generate();
    let quote = approved_quote("10", "IN");

    let response = app
        .send(Method::GET, "/api/cart/events", Some(user), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
    let mut stream = response.into_body().into_data_stream();

    let added = app.add_quote(user, &quote).await;
    assert_eq!(added.status, StatusCode::CREATED);

    let expected = format!(
        "event: item_added\ndata: {{\"type\":\"item_added\",\"quote_id\":\"{}\"}}\n",
        quote.id
    );
    let mut received = String::new();
    let delivered = timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            received.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if received.contains(&expected) {
                return true;
            }
        }
        false
    })
    .await;

    assert_eq!(delivered, Ok(true), "stream so far: {received:?}");
    // Sync events for the save arrive ahead of the item event.
    assert!(received.contains("event: sync_completed\n"));
}
