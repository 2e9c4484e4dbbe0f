//! Several sessions sharing one persisted cart.
//!
//! Each `CartStore` stands for a browser tab or device of the same user.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use iwishbag_cart::{
    CartConfig, CartError, CartStore, FixedIdentity, GuestIdentity, InMemoryCartPersistence,
    SyncStatus,
};
use iwishbag_core::UserId;
use iwishbag_integration_tests::{TestApp, approved_quote, item_ids};

fn session(persistence: &InMemoryCartPersistence, user_id: UserId) -> CartStore {
    CartStore::new(
        Arc::new(persistence.clone()),
        Arc::new(FixedIdentity(user_id)),
        CartConfig::default(),
    )
}

#[tokio::test]
async fn test_second_device_sees_first_after_sync() {
    let persistence = InMemoryCartPersistence::new();
    let user_id = UserId::generate();
    let phone = session(&persistence, user_id);
    let laptop = session(&persistence, user_id);
    phone.initialize().await.unwrap();
    laptop.initialize().await.unwrap();

    let quote = approved_quote("64.20", "IN");
    phone.add_item(quote.clone(), None).await.unwrap();
    assert!(!laptop.contains(quote.id));

    laptop.sync_with_server().await.unwrap();
    assert!(laptop.contains(quote.id));
    assert_eq!(laptop.sync_status(), SyncStatus::Synced);
}

#[tokio::test]
async fn test_stale_device_loses_race_and_recovers() {
    let persistence = InMemoryCartPersistence::new();
    let user_id = UserId::generate();
    let phone = session(&persistence, user_id);
    let laptop = session(&persistence, user_id);
    phone.initialize().await.unwrap();
    laptop.initialize().await.unwrap();

    phone
        .add_item(approved_quote("10", "IN"), None)
        .await
        .unwrap();
    // Laptop still shows an empty cart, so clearing saves nothing.
    assert_eq!(laptop.clear_cart().await.unwrap(), 0);

    let late = approved_quote("5", "NP");
    let err = laptop.add_item(late.clone(), None).await.unwrap_err();
    assert!(matches!(err, CartError::Conflict { .. }));
    assert_eq!(laptop.state().items, phone.state().items);

    laptop.add_item(late, None).await.unwrap();
    phone.sync_with_server().await.unwrap();
    assert_eq!(phone.item_count(), 2);
    assert_eq!(phone.state().version, laptop.state().version);
}

#[tokio::test]
async fn test_guest_cart_stays_local() {
    let persistence = InMemoryCartPersistence::new();
    let guest = CartStore::new(
        Arc::new(persistence.clone()),
        Arc::new(GuestIdentity),
        CartConfig::default(),
    );
    guest.initialize().await.unwrap();

    guest
        .add_item(approved_quote("10", "IN"), None)
        .await
        .unwrap();
    assert!(guest.undo().await.unwrap());

    assert!(persistence.is_empty());
    assert_eq!(persistence.save_calls(), 0);
    assert!(matches!(
        guest.sync_with_server().await,
        Err(CartError::Offline)
    ));
}

#[tokio::test]
async fn test_evicted_store_reloads_from_persistence() {
    let app = TestApp::new();
    let user = UserId::generate();
    let quote = approved_quote("33", "IN");
    app.add_quote(user, &quote).await;

    app.state.carts().evict(user).await;

    let cart = app.get("/api/cart", user).await;
    assert_eq!(item_ids(&cart.body), vec![quote.id.to_string()]);
    assert_eq!(cart.body["version"], 1);
}
