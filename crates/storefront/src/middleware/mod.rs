//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Caller identity is an extractor ([`RequireUser`]) rather than a layer, so
//! health checks stay unauthenticated.

pub mod auth;
pub mod request_id;

pub use auth::{RequireUser, USER_ID_HEADER, UserRejection};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
