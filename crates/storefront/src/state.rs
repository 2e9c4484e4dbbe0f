//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use iwishbag_cart::{CartPersistence, InMemoryCartPersistence, PgCartPersistence};

use crate::config::StorefrontConfig;
use crate::registry::CartRegistry;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the per-user cart stores.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    carts: CartRegistry,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create state backed by an arbitrary persistence implementation.
    #[must_use]
    pub fn new(config: StorefrontConfig, persistence: Arc<dyn CartPersistence>) -> Self {
        let carts = CartRegistry::new(persistence, &config);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                carts,
                pool: None,
            }),
        }
    }

    /// Create state that persists carts in `PostgreSQL`.
    #[must_use]
    pub fn with_pool(config: StorefrontConfig, pool: PgPool) -> Self {
        let persistence = Arc::new(PgCartPersistence::new(pool.clone()));
        let carts = CartRegistry::new(persistence, &config);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                carts,
                pool: Some(pool),
            }),
        }
    }

    /// Create state that keeps carts in process memory only.
    #[must_use]
    pub fn in_memory(config: StorefrontConfig) -> Self {
        Self::new(config, Arc::new(InMemoryCartPersistence::new()))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the per-user cart stores.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }

    /// Database pool, if carts are persisted in `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("carts", &self.inner.carts)
            .field("postgres", &self.inner.pool.is_some())
            .finish_non_exhaustive()
    }
}
