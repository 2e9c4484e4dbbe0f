//! Cart configuration.
//!
//! # Environment Variables
//!
//! All optional:
//! - `CART_MAX_HISTORY` - Undo states retained (default: 20)
//! - `CART_MAX_ITEMS` - Maximum lines in one cart (default: 50)
//! - `CART_DISPLAY_CURRENCY` - ISO 4217 code for display totals (default: USD)
//! - `CART_DISPLAY_RATE` - USD → display currency rate (default: 1)
//! - `CART_EVENT_CAPACITY` - Event channel buffer per cart (default: 64)

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use iwishbag_core::CurrencyCode;

use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::history::DEFAULT_MAX_HISTORY;

/// Default maximum number of lines per cart.
pub const DEFAULT_MAX_ITEMS: usize = 50;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Tunables shared by every cart store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Undo states retained per cart
    pub max_history_size: usize,
    /// Maximum number of lines in one cart
    pub max_items: usize,
    /// Currency used for `total_value_display`
    pub display_currency: CurrencyCode,
    /// Multiplier from USD to `display_currency`
    pub display_rate: Decimal,
    /// Event channel buffer per cart
    pub event_capacity: usize,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            max_history_size: DEFAULT_MAX_HISTORY,
            max_items: DEFAULT_MAX_ITEMS,
            display_currency: CurrencyCode::USD,
            display_rate: Decimal::ONE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed, or if
    /// the display rate is not positive.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let display_rate: Decimal = parse_env_or("CART_DISPLAY_RATE", defaults.display_rate)?;
        if display_rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "CART_DISPLAY_RATE".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            max_history_size: parse_env_or("CART_MAX_HISTORY", defaults.max_history_size)?,
            max_items: parse_env_or("CART_MAX_ITEMS", defaults.max_items)?,
            display_currency: parse_env_or("CART_DISPLAY_CURRENCY", defaults.display_currency)?,
            display_rate,
            event_capacity: parse_env_or("CART_EVENT_CAPACITY", defaults.event_capacity)?,
        })
    }
}

/// Parse an environment variable, using `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CartConfig::default();
        assert_eq!(config.max_history_size, 20);
        assert_eq!(config.max_items, 50);
        assert_eq!(config.display_currency, CurrencyCode::USD);
        assert_eq!(config.display_rate, Decimal::ONE);
    }

    #[test]
    fn test_parse_env_or_default_when_unset() {
        let value: usize = parse_env_or("IWISHBAG_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
