//! Integration tests for the iwishBag cart service.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory HTTP tests
//! cargo test -p iwishbag-integration-tests
//!
//! # Include PostgreSQL tests (needs a migrated database)
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p iwishbag-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_api` - HTTP API against in-memory persistence
//! - `cart_sessions` - Several stores sharing one persisted cart
//! - `postgres_persistence` - `PgCartPersistence` against a real database

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use iwishbag_cart::InMemoryCartPersistence;
use iwishbag_core::{CountryCode, CurrencyCode, Quote, QuoteId, QuoteStatus, UserId};
use iwishbag_storefront::config::StorefrontConfig;
use iwishbag_storefront::middleware::USER_ID_HEADER;
use iwishbag_storefront::state::AppState;

/// Router over in-memory persistence, plus a handle on that persistence.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub persistence: InMemoryCartPersistence,
}

/// Status, headers and JSON body of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StorefrontConfig::default())
    }

    #[must_use]
    pub fn with_config(config: StorefrontConfig) -> Self {
        let persistence = InMemoryCartPersistence::new();
        let state = AppState::new(config, Arc::new(persistence.clone()));
        let router = iwishbag_storefront::app(state.clone());
        Self {
            router,
            state,
            persistence,
        }
    }

    /// Send a request and return the unread response.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<UserId>,
        body: Option<&Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user {
            builder = builder.header(USER_ID_HEADER, user_id.to_string());
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");

        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Send a request and collect its JSON body.
    ///
    /// Non-JSON bodies come back as a JSON string; empty bodies as `null`.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<UserId>,
        body: Option<&Value>,
    ) -> TestResponse {
        let response = self.send(method, uri, user, body).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: UserId) -> TestResponse {
        self.request(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: UserId, body: Option<&Value>) -> TestResponse {
        self.request(Method::POST, uri, Some(user), body).await
    }

    pub async fn delete(&self, uri: &str, user: UserId) -> TestResponse {
        self.request(Method::DELETE, uri, Some(user), None).await
    }

    pub async fn patch(&self, uri: &str, user: UserId, body: &Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(user), Some(body)).await
    }

    /// Add `quote` through the API and return the response.
    pub async fn add_quote(&self, user: UserId, quote: &Quote) -> TestResponse {
        let body = serde_json::json!({ "quote": quote });
        self.post("/api/cart/items", user, Some(&body)).await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Approved US-origin quote with the given USD total and destination.
///
/// # Panics
///
/// Panics on an invalid total or country code.
#[must_use]
pub fn approved_quote(total_usd: &str, destination: &str) -> Quote {
    let id = QuoteId::generate();
    Quote {
        id,
        display_id: format!("IWB-TEST-{}", id.as_uuid().simple()),
        status: QuoteStatus::Approved,
        origin_country: CountryCode::parse("US").expect("valid country"),
        destination_country: CountryCode::parse(destination).expect("valid country"),
        customer_currency: CurrencyCode::INR,
        final_total_usd: total_usd.parse().expect("valid decimal"),
        items: Vec::new(),
        created_at: Utc::now(),
    }
}

/// Parse a decimal serialized as a JSON string or number.
///
/// # Panics
///
/// Panics if `value` is not a decimal.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        other => other.to_string().parse().expect("decimal number"),
    }
}

/// Quote ids of the items in a serialized cart state, in order.
#[must_use]
pub fn item_ids(cart: &Value) -> Vec<String> {
    cart["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
