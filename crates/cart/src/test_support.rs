//! Fixtures shared by unit tests.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::Utc;

use iwishbag_core::{CountryCode, CurrencyCode, Quote, QuoteId, QuoteStatus};

/// Approved US-origin quote with the given USD total and destination.
pub fn quote(total_usd: &str, destination: &str) -> Quote {
    let id = QuoteId::generate();
    Quote {
        id,
        display_id: format!("IWB-{}", &id.to_string()[..8]),
        status: QuoteStatus::Approved,
        origin_country: CountryCode::parse("US").unwrap(),
        destination_country: CountryCode::parse(destination).unwrap(),
        customer_currency: CurrencyCode::INR,
        final_total_usd: total_usd.parse().unwrap(),
        items: Vec::new(),
        created_at: Utc::now(),
    }
}
