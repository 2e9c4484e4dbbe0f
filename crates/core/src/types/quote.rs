//! Quote snapshot types.
//!
//! A [`Quote`] is the priced shipping/customs estimate a customer places in
//! the cart. The cart keeps an owned copy so that later edits by the quoting
//! service do not change what the customer saw when they added it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CountryCode, CurrencyCode, QuoteId, QuoteStatus};

/// A single product line inside a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    /// Product name as entered by the customer.
    pub name: String,
    pub quantity: u32,
    /// Unit price at the origin merchant, in USD.
    pub price_usd: Decimal,
    /// Unit weight in kilograms.
    pub weight_kg: Decimal,
    /// Harmonized System Nomenclature code used for duty lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,
}

/// A priced quote between an origin and a destination country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    /// Human-facing identifier (e.g. `IWB-2026-00042`).
    pub display_id: String,
    pub status: QuoteStatus,
    pub origin_country: CountryCode,
    pub destination_country: CountryCode,
    /// Currency the customer pays in.
    pub customer_currency: CurrencyCode,
    /// Grand total including shipping, customs and fees, in USD.
    pub final_total_usd: Decimal,
    #[serde(default)]
    pub items: Vec<QuoteItem>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// Total number of units across all quote lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Total shipping weight across all quote lines.
    #[must_use]
    pub fn total_weight_kg(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.weight_kg * Decimal::from(item.quantity))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Quote {
        Quote {
            id: QuoteId::generate(),
            display_id: "IWB-2026-00042".to_string(),
            status: QuoteStatus::Approved,
            origin_country: CountryCode::parse("US").unwrap(),
            destination_country: CountryCode::parse("IN").unwrap(),
            customer_currency: CurrencyCode::INR,
            final_total_usd: "142.30".parse().unwrap(),
            items: vec![
                QuoteItem {
                    name: "Headphones".to_string(),
                    quantity: 2,
                    price_usd: "49.99".parse().unwrap(),
                    weight_kg: "0.35".parse().unwrap(),
                    hsn_code: Some("851830".to_string()),
                },
                QuoteItem {
                    name: "Charger".to_string(),
                    quantity: 1,
                    price_usd: "19.00".parse().unwrap(),
                    weight_kg: "0.2".parse().unwrap(),
                    hsn_code: None,
                },
            ],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_count_and_weight() {
        let quote = sample();
        assert_eq!(quote.unit_count(), 3);
        assert_eq!(quote.total_weight_kg(), "0.90".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_hsn_code_omitted_when_absent() {
        let quote = sample();
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json["items"][1].get("hsn_code").is_none());
        assert_eq!(json["items"][0]["hsn_code"], "851830");
    }
}
