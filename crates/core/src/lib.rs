//! iwishBag Core - Shared types library.
//!
//! This crate provides common types used across all iwishBag cart components:
//! - `cart` - Cart store, engine and persistence
//! - `storefront` - HTTP API serving the cart to customers
//! - `cli` - Command-line tools for migrations and cart maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, countries, quotes and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
