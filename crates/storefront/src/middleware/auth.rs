//! Caller identity extractor.
//!
//! Authentication happens at the gateway, which forwards the customer's id in
//! the `x-user-id` header. Handlers that touch a cart take [`RequireUser`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use iwishbag_core::UserId;

use crate::error::set_sentry_user;

/// The HTTP header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn show_cart(RequireUser(user_id): RequireUser) -> impl IntoResponse {
///     format!("cart of {user_id}")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub UserId);

/// Why a request was rejected by [`RequireUser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRejection {
    /// No `x-user-id` header.
    Missing,
    /// Header present but not a UUID.
    Malformed,
}

impl IntoResponse for UserRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Missing => "missing x-user-id header",
            Self::Malformed => "x-user-id header is not a valid id",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": message })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = UserRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(UserRejection::Missing)?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<UserId>().ok())
            .ok_or(UserRejection::Malformed)?;

        set_sentry_user(&user_id);
        Ok(Self(user_id))
    }
}
