//! Core types for iwishBag.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod country;
pub mod id;
pub mod price;
pub mod quote;
pub mod status;

pub use country::{CountryCode, CountryCodeError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use quote::{Quote, QuoteItem};
pub use status::*;
