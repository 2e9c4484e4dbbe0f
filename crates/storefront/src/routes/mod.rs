//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness
//! GET    /health/ready           - Readiness (cart persistence reachable)
//!
//! # Cart API (requires x-user-id)
//! GET    /api/cart               - Cart state
//! DELETE /api/cart               - Clear cart
//! GET    /api/cart/summary       - Checkout summary by destination
//! GET    /api/cart/analytics     - Operation counters
//! POST   /api/cart/items         - Add quote (201, or 200 if present)
//! DELETE /api/cart/items/{id}    - Remove quote
//! PATCH  /api/cart/items/{id}    - Update line metadata
//! POST   /api/cart/toggle        - Add or remove quote
//! POST   /api/cart/undo          - Restore previous state
//! POST   /api/cart/sync          - Pull persisted snapshot
//! POST   /api/cart/push          - Overwrite persisted snapshot
//! GET    /api/cart/events        - Server-sent cart events
//! ```

pub mod cart;
pub mod events;
pub mod health;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/summary", get(cart::summary))
        .route("/analytics", get(cart::analytics))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            delete(cart::remove_item).patch(cart::update_item),
        )
        .route("/toggle", post(cart::toggle))
        .route("/undo", post(cart::undo))
        .route("/sync", post(cart::sync))
        .route("/push", post(cart::push))
        .route("/events", get(events::stream_events))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/cart", cart_routes())
}
