//! Shopping cart for approved iwishBag quotes.
//!
//! A [`CartStore`] keeps the cart of one customer in memory, applies every
//! change optimistically, and persists it through a [`CartPersistence`]
//! backend with version checks. Failed saves roll back; saves that lose a
//! race against another session adopt the server copy.
//!
//! # Modules
//!
//! - [`store`] - Reactive store and public cart operations
//! - [`engine`] - Validation, persistence delegation, lifecycle events
//! - [`persistence`] - Storage trait plus in-memory and `PostgreSQL` backends
//! - [`history`] - Bounded undo history
//! - [`optimistic`] - Apply/persist/revert helper

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod identity;
pub mod item;
pub mod optimistic;
pub mod persistence;
pub mod store;

#[cfg(test)]
mod test_support;

pub use analytics::{CartAnalytics, Operation};
pub use config::{CartConfig, ConfigError};
pub use engine::CartEngine;
pub use error::CartError;
pub use events::{CartEvent, EventBus};
pub use history::History;
pub use identity::{FixedIdentity, GuestIdentity, IdentityError, IdentityProvider};
pub use item::{
    CartContents, CartItem, CartItemMetadata, CartMetadata, CartState, CartSummary,
    ConflictStrategy, DestinationGroup, MetadataPatch, Priority, SyncStatus,
};
pub use persistence::{CartPersistence, CartSnapshot, InMemoryCartPersistence, PersistenceError};
#[cfg(feature = "postgres")]
pub use persistence::PgCartPersistence;
pub use store::{AddOutcome, CartStore, ToggleOutcome};
