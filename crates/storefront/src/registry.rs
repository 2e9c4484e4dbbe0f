//! Per-user cart stores.
//!
//! Each authenticated user gets one [`CartStore`], shared by all of their
//! concurrent requests and evicted after a period of inactivity. Stores are
//! cached with `moka`; an evicted store is rebuilt from persistence on the
//! next request.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use iwishbag_cart::{CartConfig, CartError, CartPersistence, CartStore, FixedIdentity};
use iwishbag_core::UserId;

use crate::config::StorefrontConfig;

/// Cache of initialized cart stores keyed by user.
#[derive(Clone)]
pub struct CartRegistry {
    stores: Cache<UserId, CartStore>,
    persistence: Arc<dyn CartPersistence>,
    config: CartConfig,
}

impl CartRegistry {
    #[must_use]
    pub fn new(persistence: Arc<dyn CartPersistence>, config: &StorefrontConfig) -> Self {
        let stores = Cache::builder()
            .max_capacity(config.max_cart_stores)
            .time_to_idle(config.cart_idle_ttl)
            .build();

        Self {
            stores,
            persistence,
            config: config.cart.clone(),
        }
    }

    /// Get the initialized cart store for `user_id`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the persisted cart cannot be loaded. The store
    /// stays cached and the next request retries initialization.
    pub async fn store_for(&self, user_id: UserId) -> Result<CartStore, CartError> {
        let store = self
            .stores
            .get_with(user_id, async {
                debug!(%user_id, "creating cart store");
                CartStore::new(
                    Arc::clone(&self.persistence),
                    Arc::new(FixedIdentity(user_id)),
                    self.config.clone(),
                )
            })
            .await;

        store.initialize().await?;
        Ok(store)
    }

    /// Drop the cached store for `user_id`. Persisted state is untouched.
    pub async fn evict(&self, user_id: UserId) {
        self.stores.invalidate(&user_id).await;
    }

    /// Number of cached stores (approximate).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.stores.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the persistence backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Persistence` if it is not.
    pub async fn ping(&self) -> Result<(), CartError> {
        Ok(self.persistence.ping().await?)
    }
}

impl std::fmt::Debug for CartRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRegistry")
            .field("stores", &self.stores.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use iwishbag_cart::InMemoryCartPersistence;

    fn registry(persistence: &InMemoryCartPersistence) -> CartRegistry {
        CartRegistry::new(
            Arc::new(persistence.clone()),
            &StorefrontConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_same_user_shares_store() {
        let registry = registry(&InMemoryCartPersistence::new());
        let user_id = UserId::generate();

        let first = registry.store_for(user_id).await.unwrap();
        let second = registry.store_for(user_id).await.unwrap();
        assert_eq!(second.state().user_id, Some(user_id));

        // Both handles point at one store.
        first.reset();
        assert!(!second.state().initialized);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let persistence = InMemoryCartPersistence::new();
        persistence.fail_next_loads(1);
        let registry = registry(&persistence);
        let user_id = UserId::generate();

        assert!(registry.store_for(user_id).await.is_err());
        assert!(registry.store_for(user_id).await.is_ok());
    }
}
