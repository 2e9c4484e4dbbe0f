//! Cart state types.
//!
//! [`CartState`] is the value published to subscribers on every change. It is
//! a plain data snapshot; all mutation goes through [`crate::CartStore`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use iwishbag_core::{CountryCode, CurrencyCode, Price, Quote, QuoteId, UserId};

/// Caller-supplied priority of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Free-form annotations on a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartItemMetadata {
    /// Surface the item was added from (e.g. `quote_page`, `dashboard`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_from: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial update of [`CartItemMetadata`]. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MetadataPatch {
    #[serde(default)]
    pub added_from: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MetadataPatch {
    /// Returns true if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.added_from.is_none() && self.priority.is_none() && self.notes.is_none()
    }

    /// Apply the patch to `metadata`.
    pub fn apply(self, metadata: &mut CartItemMetadata) {
        if let Some(added_from) = self.added_from {
            metadata.added_from = Some(added_from);
        }
        if let Some(priority) = self.priority {
            metadata.priority = priority;
        }
        if let Some(notes) = self.notes {
            metadata.notes = Some(notes);
        }
    }
}

/// A quote placed in the cart.
///
/// Identity is the underlying quote id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: QuoteId,
    /// Owned snapshot of the quote as it was when added.
    pub quote: Quote,
    pub added_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub metadata: CartItemMetadata,
}

impl CartItem {
    /// Create a cart line for `quote`, stamped with the current time.
    #[must_use]
    pub fn new(quote: Quote, metadata: CartItemMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: quote.id,
            quote,
            added_at: now,
            last_updated: now,
            metadata,
        }
    }

    /// Value this line contributes to the cart total, in USD.
    #[must_use]
    pub const fn value_usd(&self) -> Decimal {
        self.quote.final_total_usd
    }
}

/// How disagreements between local and persisted state are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// The persisted snapshot replaces local state. No merging.
    #[default]
    ServerWins,
}

/// Relationship between local and remote cart state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No authenticated user, or not yet initialized. Nothing is persisted.
    #[default]
    Offline,
    Syncing,
    Synced,
    /// The last save lost a version race and server state was adopted.
    Conflict,
    /// The last remote call failed.
    Error,
}

/// Aggregate counters kept alongside the item list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartMetadata {
    pub total_items: usize,
    pub total_value_usd: Decimal,
    pub total_value_display: Price,
    pub last_sync: Option<DateTime<Utc>>,
    pub display_currency: CurrencyCode,
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
}

impl CartMetadata {
    /// Empty-cart metadata for the given display currency.
    #[must_use]
    pub const fn empty(display_currency: CurrencyCode) -> Self {
        Self {
            total_items: 0,
            total_value_usd: Decimal::ZERO,
            total_value_display: Price::zero(display_currency),
            last_sync: None,
            display_currency,
            conflict_strategy: ConflictStrategy::ServerWins,
        }
    }

    /// Account for one added line worth `value_usd`.
    ///
    /// Totals saturate; [`crate::CartEngine::validate`] rejects quotes that
    /// would push them out of range.
    pub fn record_added(&mut self, value_usd: Decimal, rate: Decimal) {
        self.total_items += 1;
        self.total_value_usd = self.total_value_usd.saturating_add(value_usd);
        self.refresh_display(rate);
    }

    /// Account for one removed line worth `value_usd`.
    pub fn record_removed(&mut self, value_usd: Decimal, rate: Decimal) {
        self.total_items = self.total_items.saturating_sub(1);
        self.total_value_usd = self.total_value_usd.saturating_sub(value_usd);
        self.refresh_display(rate);
    }

    /// Zero the counters, keeping sync time and currency.
    pub fn clear_totals(&mut self) {
        self.total_items = 0;
        self.total_value_usd = Decimal::ZERO;
        self.total_value_display = Price::zero(self.display_currency);
    }

    /// Recompute the counters from scratch.
    pub fn recompute(&mut self, items: &[CartItem], rate: Decimal) {
        self.total_items = items.len();
        self.total_value_usd = items
            .iter()
            .map(CartItem::value_usd)
            .fold(Decimal::ZERO, Decimal::saturating_add);
        self.refresh_display(rate);
    }

    fn refresh_display(&mut self, rate: Decimal) {
        self.total_value_display =
            Price::from_usd(self.total_value_usd, rate, self.display_currency);
    }
}

/// Items plus their aggregate metadata.
///
/// This is both the unit of undo history and the persisted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartContents {
    pub items: Vec<CartItem>,
    pub metadata: CartMetadata,
}

impl CartContents {
    /// Empty contents for the given display currency.
    #[must_use]
    pub const fn empty(display_currency: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            metadata: CartMetadata::empty(display_currency),
        }
    }
}

/// Full observable state of a cart store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub metadata: CartMetadata,
    pub sync_status: SyncStatus,
    /// Authenticated owner, `None` in guest mode.
    pub user_id: Option<UserId>,
    /// Persisted version the local state is based on.
    pub version: Option<u64>,
    pub initialized: bool,
}

impl CartState {
    /// Uninitialized state for the given display currency.
    #[must_use]
    pub const fn new(display_currency: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            metadata: CartMetadata::empty(display_currency),
            sync_status: SyncStatus::Offline,
            user_id: None,
            version: None,
            initialized: false,
        }
    }

    /// Whether a line for `id` is present.
    #[must_use]
    pub fn contains(&self, id: QuoteId) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Index of the line for `id`.
    #[must_use]
    pub fn position(&self, id: QuoteId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Line for `id`.
    #[must_use]
    pub fn get(&self, id: QuoteId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Copy of the items and metadata.
    #[must_use]
    pub fn contents(&self) -> CartContents {
        CartContents {
            items: self.items.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Replace items and metadata, re-deriving totals for `rate`.
    ///
    /// The display currency of the current state is kept.
    pub fn replace_contents(&mut self, contents: CartContents, rate: Decimal) {
        let currency = self.metadata.display_currency;
        self.items = contents.items;
        self.metadata = contents.metadata;
        self.metadata.display_currency = currency;
        self.metadata.recompute(&self.items, rate);
    }

    /// Put back lines from `previous` that are no longer present, at their
    /// old positions where possible, and re-derive totals. Lines added since
    /// `previous` was taken are kept.
    pub fn restore_items(&mut self, previous: Vec<CartItem>, rate: Decimal) {
        for (index, item) in previous.into_iter().enumerate() {
            if !self.contains(item.id) {
                let pos = index.min(self.items.len());
                self.items.insert(pos, item);
            }
        }
        self.metadata.recompute(&self.items, rate);
    }

    /// Checkout summary grouped by destination country.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        let mut groups: BTreeMap<CountryCode, DestinationGroup> = BTreeMap::new();
        for item in &self.items {
            let country = item.quote.destination_country.clone();
            let group = groups
                .entry(country.clone())
                .or_insert_with(|| DestinationGroup {
                    destination_country: country,
                    item_count: 0,
                    total_value_usd: Decimal::ZERO,
                });
            group.item_count += 1;
            group.total_value_usd = group.total_value_usd.saturating_add(item.value_usd());
        }

        CartSummary {
            total_items: self.metadata.total_items,
            total_value_usd: self.metadata.total_value_usd,
            total_value_display: self.metadata.total_value_display,
            by_destination: groups.into_values().collect(),
        }
    }
}

/// Cart lines shipping to one destination country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationGroup {
    pub destination_country: CountryCode,
    pub item_count: usize,
    pub total_value_usd: Decimal,
}

/// Totals shown on the checkout screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub total_items: usize,
    pub total_value_usd: Decimal,
    pub total_value_display: Price,
    /// Sorted by country code.
    pub by_destination: Vec<DestinationGroup>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::quote;

    #[test]
    fn test_record_added_and_removed_keep_display_in_step() {
        let rate: Decimal = "83".parse().unwrap();
        let mut metadata = CartMetadata::empty(CurrencyCode::INR);

        metadata.record_added("10.50".parse().unwrap(), rate);
        assert_eq!(metadata.total_items, 1);
        assert_eq!(
            metadata.total_value_display.amount,
            "871.50".parse::<Decimal>().unwrap()
        );

        metadata.record_removed("10.50".parse().unwrap(), rate);
        assert_eq!(metadata.total_items, 0);
        assert_eq!(metadata.total_value_usd, Decimal::ZERO);
    }

    #[test]
    fn test_replace_contents_recomputes_totals() {
        let mut state = CartState::new(CurrencyCode::USD);
        let items = vec![
            CartItem::new(quote("25.00", "IN"), CartItemMetadata::default()),
            CartItem::new(quote("5.00", "NP"), CartItemMetadata::default()),
        ];
        // Stale counters in the payload must not survive.
        let mut metadata = CartMetadata::empty(CurrencyCode::GBP);
        metadata.total_items = 7;

        state.replace_contents(CartContents { items, metadata }, Decimal::ONE);

        assert_eq!(state.metadata.total_items, 2);
        assert_eq!(state.metadata.display_currency, CurrencyCode::USD);
        assert_eq!(
            state.metadata.total_value_usd,
            "30.00".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let mut metadata = CartMetadata::empty(CurrencyCode::INR);
        let rate: Decimal = "83".parse().unwrap();

        metadata.record_added(Decimal::MAX, rate);
        metadata.record_added(Decimal::MAX, rate);

        assert_eq!(metadata.total_items, 2);
        assert_eq!(metadata.total_value_usd, Decimal::MAX);
        assert_eq!(metadata.total_value_display.amount, Decimal::MAX);
    }

    #[test]
    fn test_restore_items_keeps_lines_added_meanwhile() {
        let mut state = CartState::new(CurrencyCode::USD);
        let first = CartItem::new(quote("10", "IN"), CartItemMetadata::default());
        let second = CartItem::new(quote("20", "NP"), CartItemMetadata::default());
        let later = CartItem::new(quote("5", "GB"), CartItemMetadata::default());
        let previous = vec![first.clone(), second.clone()];

        // Cleared, then a line added before the clear was rolled back.
        state.items.push(later.clone());
        state.metadata.recompute(&state.items, Decimal::ONE);

        state.restore_items(previous, Decimal::ONE);

        let ids: Vec<QuoteId> = state.items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![first.id, second.id, later.id]);
        assert_eq!(state.metadata.total_items, 3);
        assert_eq!(
            state.metadata.total_value_usd,
            "35".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_summary_groups_by_destination() {
        let mut state = CartState::new(CurrencyCode::USD);
        let items = vec![
            CartItem::new(quote("10", "NP"), CartItemMetadata::default()),
            CartItem::new(quote("20", "IN"), CartItemMetadata::default()),
            CartItem::new(quote("5", "IN"), CartItemMetadata::default()),
        ];
        state.replace_contents(
            CartContents {
                items,
                metadata: CartMetadata::empty(CurrencyCode::USD),
            },
            Decimal::ONE,
        );

        let summary = state.summary();
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.by_destination.len(), 2);
        assert_eq!(summary.by_destination[0].destination_country.as_str(), "IN");
        assert_eq!(summary.by_destination[0].item_count, 2);
        assert_eq!(
            summary.by_destination[0].total_value_usd,
            "25".parse::<Decimal>().unwrap()
        );
    }

    #[test]
    fn test_metadata_patch_leaves_unset_fields() {
        let mut metadata = CartItemMetadata {
            added_from: Some("quote_page".to_string()),
            priority: Priority::Low,
            notes: None,
        };
        MetadataPatch {
            priority: Some(Priority::High),
            ..MetadataPatch::default()
        }
        .apply(&mut metadata);

        assert_eq!(metadata.added_from.as_deref(), Some("quote_page"));
        assert_eq!(metadata.priority, Priority::High);
    }

    #[test]
    fn test_sync_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::Synced).unwrap(),
            "\"synced\""
        );
        assert_eq!(
            serde_json::to_string(&ConflictStrategy::ServerWins).unwrap(),
            "\"server-wins\""
        );
    }
}
