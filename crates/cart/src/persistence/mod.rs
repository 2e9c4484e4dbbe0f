//! Durable storage of cart snapshots.
//!
//! The persistence service owns the durable copy of a user's cart. Every
//! successful save assigns a new, strictly greater `version`; callers pass the
//! version their change was based on so that a concurrent writer (another
//! tab or device) is detected instead of silently overwritten.
//!
//! # Backends
//!
//! - [`InMemoryCartPersistence`] - process-local map, used for guest demos,
//!   tests and dry runs
//! - [`PgCartPersistence`] - `storefront.cart_snapshot` table (`postgres` feature)

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryCartPersistence;
#[cfg(feature = "postgres")]
pub use postgres::PgCartPersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use iwishbag_core::UserId;

use crate::item::CartContents;

/// Errors raised by persistence backends.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The stored version is not the one the save was based on.
    #[error("version conflict: expected {expected}, stored {actual}")]
    VersionConflict {
        /// Version the caller based its change on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Database operation failed.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data is invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The backend is not reachable.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// A persisted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub user_id: UserId,
    #[serde(flatten)]
    pub contents: CartContents,
    pub version: u64,
    pub saved_at: DateTime<Utc>,
}

/// Load/save capability for cart snapshots.
#[async_trait]
pub trait CartPersistence: Send + Sync {
    /// Load the stored cart for `user_id`, if any.
    async fn load_cart_state(&self, user_id: UserId)
    -> Result<Option<CartSnapshot>, PersistenceError>;

    /// Store `contents` for `user_id`.
    ///
    /// With `expected_version = Some(v)` the save only succeeds if the stored
    /// version is `v` (a missing row counts as version 0). `None` overwrites
    /// unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::VersionConflict`] when the stored version
    /// differs from `expected_version`.
    async fn save_cart_state(
        &self,
        user_id: UserId,
        contents: &CartContents,
        expected_version: Option<u64>,
    ) -> Result<CartSnapshot, PersistenceError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
