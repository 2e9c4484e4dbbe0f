//! Cart API handlers.
//!
//! Every handler resolves the caller's [`CartStore`] from the registry and
//! returns JSON. Errors map to status codes in [`crate::error::AppError`].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use iwishbag_cart::{
    AddOutcome, CartAnalytics, CartItem, CartItemMetadata, CartState, CartStore, CartSummary,
    MetadataPatch, ToggleOutcome,
};
use iwishbag_core::{Quote, QuoteId, UserId};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// Body of `POST /api/cart/items` and `POST /api/cart/toggle`.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub quote: Quote,
    #[serde(default)]
    pub metadata: Option<CartItemMetadata>,
}

/// Response of `POST /api/cart/toggle`.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    /// `true` if the quote is in the cart afterwards.
    pub added: bool,
    pub cart: CartState,
}

/// Response of `DELETE /api/cart`.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
    pub cart: CartState,
}

/// Response of `POST /api/cart/undo`.
#[derive(Debug, Serialize)]
pub struct UndoResponse {
    /// `false` when there was no earlier state to restore.
    pub restored: bool,
    pub cart: CartState,
}

async fn store(state: &AppState, user_id: UserId) -> Result<CartStore> {
    Ok(state.carts().store_for(user_id).await?)
}

/// GET /api/cart
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartState>> {
    let cart = store(&state, user_id).await?;
    Ok(Json(cart.state()))
}

/// GET /api/cart/summary
#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartSummary>> {
    let cart = store(&state, user_id).await?;
    Ok(Json(cart.summary()))
}

/// GET /api/cart/analytics
#[instrument(skip(state))]
pub async fn analytics(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartAnalytics>> {
    let cart = store(&state, user_id).await?;
    Ok(Json(cart.analytics()))
}

/// POST /api/cart/items
///
/// Responds `201 Created` when the quote was added and `200 OK` when it was
/// already in the cart.
#[instrument(skip(state, request), fields(quote_id = %request.quote.id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<QuoteRequest>,
) -> Result<(StatusCode, Json<CartState>)> {
    let cart = store(&state, user_id).await?;
    let status = match cart.add_item(request.quote, request.metadata).await? {
        AddOutcome::Added => StatusCode::CREATED,
        AddOutcome::AlreadyPresent => StatusCode::OK,
    };
    Ok((status, Json(cart.state())))
}

/// DELETE /api/cart/items/{id}
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(quote_id): Path<QuoteId>,
) -> Result<Json<CartState>> {
    let cart = store(&state, user_id).await?;
    cart.remove_item(quote_id).await?;
    Ok(Json(cart.state()))
}

/// PATCH /api/cart/items/{id}
#[instrument(skip(state, patch))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(quote_id): Path<QuoteId>,
    Json(patch): Json<MetadataPatch>,
) -> Result<Json<CartItem>> {
    let cart = store(&state, user_id).await?;
    let item = cart.update_item_metadata(quote_id, patch).await?;
    Ok(Json(item))
}

/// POST /api/cart/toggle
#[instrument(skip(state, request), fields(quote_id = %request.quote.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<ToggleResponse>> {
    let cart = store(&state, user_id).await?;
    let outcome = cart.toggle_item(request.quote, request.metadata).await?;
    Ok(Json(ToggleResponse {
        added: outcome == ToggleOutcome::Added,
        cart: cart.state(),
    }))
}

/// DELETE /api/cart
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<ClearResponse>> {
    let cart = store(&state, user_id).await?;
    let removed = cart.clear_cart().await?;
    Ok(Json(ClearResponse {
        removed,
        cart: cart.state(),
    }))
}

/// POST /api/cart/undo
#[instrument(skip(state))]
pub async fn undo(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<UndoResponse>> {
    let cart = store(&state, user_id).await?;
    let restored = cart.undo().await?;
    Ok(Json(UndoResponse {
        restored,
        cart: cart.state(),
    }))
}

/// POST /api/cart/sync
///
/// Replace the cached cart with the persisted snapshot.
#[instrument(skip(state))]
pub async fn sync(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartState>> {
    let cart = store(&state, user_id).await?;
    cart.sync_with_server().await?;
    Ok(Json(cart.state()))
}

/// POST /api/cart/push
///
/// Overwrite the persisted snapshot with the cached cart.
#[instrument(skip(state))]
pub async fn push(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartState>> {
    let cart = store(&state, user_id).await?;
    cart.force_sync_to_server().await?;
    Ok(Json(cart.state()))
}
