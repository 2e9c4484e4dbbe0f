//! Cart error type.

use thiserror::Error;

use iwishbag_core::QuoteId;

use crate::identity::IdentityError;
use crate::persistence::PersistenceError;

/// Errors returned by cart store and engine operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// An operation was called before `initialize()`.
    #[error("cart store is not initialized")]
    NotInitialized,

    /// The operation needs an authenticated user.
    #[error("cart is offline: no authenticated user")]
    Offline,

    /// The quote may not be placed in the cart.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No cart line for this quote.
    #[error("quote {0} is not in the cart")]
    ItemNotFound(QuoteId),

    /// A save lost a version race; server state has been adopted.
    #[error("cart changed elsewhere (local version {local:?}, server version {remote})")]
    Conflict {
        /// Version the local change was based on.
        local: Option<u64>,
        /// Version found on the server.
        remote: u64,
    },

    /// Persistence backend failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Current user could not be determined.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl CartError {
    /// Whether the caller can reasonably retry the same action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::Persistence(_) | Self::Identity(_)
        )
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
