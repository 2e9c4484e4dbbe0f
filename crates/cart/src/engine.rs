//! Cart business rules, persistence delegation and lifecycle events.
//!
//! The engine is stateless with respect to cart contents: it validates,
//! talks to the persistence backend, publishes events and keeps analytics.
//! Contents live in [`crate::CartStore`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{instrument, warn};

use iwishbag_core::{Quote, UserId};

use crate::analytics::{CartAnalytics, Operation};
use crate::config::CartConfig;
use crate::error::CartError;
use crate::events::{CartEvent, EventBus};
use crate::item::CartContents;
use crate::persistence::{CartPersistence, CartSnapshot, PersistenceError};

/// Validation, persistence and event hub for one cart.
pub struct CartEngine {
    persistence: Arc<dyn CartPersistence>,
    bus: EventBus,
    analytics: Mutex<CartAnalytics>,
    max_items: usize,
    display_rate: Decimal,
}

impl CartEngine {
    #[must_use]
    pub fn new(persistence: Arc<dyn CartPersistence>, config: &CartConfig) -> Self {
        Self {
            persistence,
            bus: EventBus::new(config.event_capacity),
            analytics: Mutex::new(CartAnalytics::default()),
            max_items: config.max_items,
            display_rate: config.display_rate,
        }
    }

    /// Check that `quote` may be added to a cart currently holding
    /// `current_items` lines worth `current_total_usd`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if the quote is not approved, has a
    /// non-positive total, the cart is full, or the new cart total (in USD or
    /// converted for display) would not fit in a `Decimal`.
    pub fn validate(
        &self,
        quote: &Quote,
        current_items: usize,
        current_total_usd: Decimal,
    ) -> Result<(), CartError> {
        if !quote.status.is_cart_eligible() {
            return Err(CartError::Validation(format!(
                "quote {} is {}, only approved quotes can be added",
                quote.display_id, quote.status
            )));
        }
        if quote.final_total_usd <= Decimal::ZERO {
            return Err(CartError::Validation(format!(
                "quote {} has no payable total",
                quote.display_id
            )));
        }
        if current_items >= self.max_items {
            return Err(CartError::Validation(format!(
                "cart is full ({} items max)",
                self.max_items
            )));
        }
        let in_range = current_total_usd
            .checked_add(quote.final_total_usd)
            .and_then(|total| total.checked_mul(self.display_rate))
            .is_some();
        if !in_range {
            return Err(CartError::Validation(format!(
                "quote {} would put the cart total out of range",
                quote.display_id
            )));
        }
        Ok(())
    }

    /// Load the persisted cart for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Persistence` if the backend fails.
    #[instrument(skip(self))]
    pub async fn load(&self, user_id: UserId) -> Result<Option<CartSnapshot>, CartError> {
        self.bus.publish(CartEvent::SyncStarted);
        match self.persistence.load_cart_state(user_id).await {
            Ok(snapshot) => {
                self.bus.publish(CartEvent::SyncCompleted {
                    version: snapshot.as_ref().map_or(0, |s| s.version),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "failed to load cart");
                self.bus.publish(CartEvent::SyncFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Save `contents` for `user_id` on top of `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Conflict` when the stored version moved on, and
    /// `CartError::Persistence` for any other backend failure.
    #[instrument(skip(self, contents), fields(items = contents.items.len()))]
    pub async fn persist(
        &self,
        user_id: UserId,
        contents: &CartContents,
        expected_version: Option<u64>,
    ) -> Result<CartSnapshot, CartError> {
        self.bus.publish(CartEvent::SyncStarted);
        match self
            .persistence
            .save_cart_state(user_id, contents, expected_version)
            .await
        {
            Ok(snapshot) => {
                self.bus.publish(CartEvent::SyncCompleted {
                    version: snapshot.version,
                });
                Ok(snapshot)
            }
            Err(PersistenceError::VersionConflict { actual, .. }) => {
                warn!(
                    local_version = ?expected_version,
                    remote_version = actual,
                    "cart save conflicted"
                );
                self.analytics().record_conflict();
                self.bus.publish(CartEvent::ConflictDetected {
                    local_version: expected_version,
                    remote_version: actual,
                });
                Err(CartError::Conflict {
                    local: expected_version,
                    remote: actual,
                })
            }
            Err(e) => {
                warn!(error = %e, "failed to save cart");
                self.bus.publish(CartEvent::SyncFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Check that the persistence backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Persistence` if it is not.
    pub async fn ping(&self) -> Result<(), CartError> {
        Ok(self.persistence.ping().await?)
    }

    /// Publish a lifecycle event.
    pub fn emit(&self, event: CartEvent) {
        self.bus.publish(event);
    }

    /// Subscribe to lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.bus.subscribe()
    }

    /// Record a finished store operation.
    pub fn record(&self, operation: Operation, elapsed: Duration, succeeded: bool) {
        self.analytics().record(operation, elapsed, succeeded);
    }

    /// Snapshot of the analytics counters.
    #[must_use]
    pub fn analytics_snapshot(&self) -> CartAnalytics {
        self.analytics().clone()
    }

    fn analytics(&self) -> MutexGuard<'_, CartAnalytics> {
        self.analytics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("max_items", &self.max_items)
            .finish_non_exhaustive()
    }
}
