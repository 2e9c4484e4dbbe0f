//! Reactive cart store.
//!
//! [`CartStore`] owns the in-memory cart of one user (or guest) and exposes
//! mutation operations that apply locally first and then persist through the
//! [`CartEngine`]. A failed save reverts the local change and returns the
//! error; a save that lost a version race adopts the server snapshot.
//!
//! State is published through a [`tokio::sync::watch`] channel, lifecycle
//! events through the engine's broadcast bus.
//!
//! Mutations on one store run one at a time: each holds the store's write
//! lock from its membership checks until its save has settled, so every
//! save is based on the version the previous one produced. Version
//! conflicts therefore only come from other stores writing the same cart.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = CartStore::new(
//!     Arc::new(PgCartPersistence::new(pool)),
//!     Arc::new(FixedIdentity(user_id)),
//!     CartConfig::from_env()?,
//! );
//! store.initialize().await?;
//! store.add_item(quote, None).await?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use iwishbag_core::{Quote, QuoteId, UserId};

use crate::analytics::{CartAnalytics, Operation};
use crate::config::CartConfig;
use crate::engine::CartEngine;
use crate::error::CartError;
use crate::events::CartEvent;
use crate::history::History;
use crate::identity::IdentityProvider;
use crate::item::{
    CartContents, CartItem, CartItemMetadata, CartState, CartSummary, MetadataPatch, SyncStatus,
};
use crate::optimistic;
use crate::persistence::{CartPersistence, CartSnapshot};

/// Result of [`CartStore::add_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The quote was already in the cart; nothing changed.
    AlreadyPresent,
}

/// Result of [`CartStore::toggle_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Handle to a cart. Cloning is cheap and shares the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Inner>,
}

struct Inner {
    engine: CartEngine,
    identity: Arc<dyn IdentityProvider>,
    config: CartConfig,
    state: watch::Sender<CartState>,
    history: Mutex<History>,
    init_lock: tokio::sync::Mutex<()>,
    /// Held by mutations and syncs for their whole duration.
    write_lock: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl CartStore {
    /// Create an uninitialized store.
    #[must_use]
    pub fn new(
        persistence: Arc<dyn CartPersistence>,
        identity: Arc<dyn IdentityProvider>,
        config: CartConfig,
    ) -> Self {
        let engine = CartEngine::new(persistence, &config);
        let (state, _) = watch::channel(CartState::new(config.display_currency));
        let history = History::new(config.max_history_size);

        Self {
            inner: Arc::new(Inner {
                engine,
                identity,
                config,
                state,
                history: Mutex::new(history),
                init_lock: tokio::sync::Mutex::new(()),
                write_lock: tokio::sync::Mutex::new(()),
                listener: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Resolve the user, load their persisted cart and start listening to
    /// engine events.
    ///
    /// Calling this on an initialized store does nothing. Without an
    /// authenticated user the store runs in guest mode: status `offline`, no
    /// persistence calls.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Identity` or `CartError::Persistence` if the user
    /// or the snapshot cannot be fetched. The store stays uninitialized and
    /// the call may be retried.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), CartError> {
        let _guard = self.inner.init_lock.lock().await;
        if self.inner.state.borrow().initialized {
            return Ok(());
        }

        let user = self
            .inner
            .identity
            .current_user()
            .await
            .inspect_err(|e| error!(error = %e, "failed to resolve current user"))?;

        let Some(user_id) = user else {
            info!("no authenticated user, cart running in guest mode");
            self.inner.state.send_modify(|s| {
                s.user_id = None;
                s.version = None;
                s.sync_status = SyncStatus::Offline;
                s.initialized = true;
            });
            self.reset_history();
            self.start_listener();
            return Ok(());
        };

        let snapshot = self
            .inner
            .engine
            .load(user_id)
            .await
            .inspect_err(|e| error!(%user_id, error = %e, "failed to load cart"))?;

        self.adopt(snapshot, SyncStatus::Synced);
        self.inner.state.send_modify(|s| {
            s.user_id = Some(user_id);
            s.initialized = true;
        });
        self.reset_history();
        self.start_listener();

        info!(%user_id, items = self.item_count(), "cart initialized");
        Ok(())
    }

    /// Drop all local state and history. The store must be initialized again
    /// before use. Persisted state is untouched.
    pub fn reset(&self) {
        if let Some(handle) = lock(&self.inner.listener).take() {
            handle.abort();
        }
        self.inner
            .state
            .send_replace(CartState::new(self.inner.config.display_currency));
        self.history().clear();
        debug!("cart store reset");
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quote` to the cart.
    ///
    /// Adding a quote that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` if the engine rejects the quote,
    /// `CartError::Conflict` if the save lost a version race, or
    /// `CartError::Persistence` if the save failed. On any error the cart is
    /// left as it was before the call (or replaced by server state on
    /// conflict).
    #[instrument(skip(self, quote, metadata), fields(quote_id = %quote.id))]
    pub async fn add_item(
        &self,
        quote: Quote,
        metadata: Option<CartItemMetadata>,
    ) -> Result<AddOutcome, CartError> {
        let _write = self.inner.write_lock.lock().await;
        self.add_locked(quote, metadata).await
    }

    async fn add_locked(
        &self,
        quote: Quote,
        metadata: Option<CartItemMetadata>,
    ) -> Result<AddOutcome, CartError> {
        self.ensure_initialized()?;
        let quote_id = quote.id;

        let (current_items, current_total) = {
            let state = self.inner.state.borrow();
            if state.contains(quote_id) {
                debug!("quote already in cart");
                return Ok(AddOutcome::AlreadyPresent);
            }
            (state.items.len(), state.metadata.total_value_usd)
        };
        self.inner
            .engine
            .validate(&quote, current_items, current_total)?;

        let started = Instant::now();
        let item = CartItem::new(quote, metadata.unwrap_or_default());
        let value = item.value_usd();
        let rate = self.rate();

        let result = self
            .commit(
                move |s| {
                    s.items.push(item);
                    s.metadata.record_added(value, rate);
                },
                move |s| {
                    if let Some(pos) = s.position(quote_id) {
                        s.items.remove(pos);
                        s.metadata.record_removed(value, rate);
                    }
                },
            )
            .await;
        self.finish(Operation::Add, started, result.is_ok());
        result?;

        self.inner.engine.emit(CartEvent::ItemAdded { quote_id });
        self.record_history();
        Ok(AddOutcome::Added)
    }

    /// Remove the line for `quote_id`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the quote is not in the cart, and
    /// the same persistence errors as [`Self::add_item`]. A failed save puts
    /// the line back at its original position.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, quote_id: QuoteId) -> Result<(), CartError> {
        let _write = self.inner.write_lock.lock().await;
        self.remove_locked(quote_id).await
    }

    async fn remove_locked(&self, quote_id: QuoteId) -> Result<(), CartError> {
        self.ensure_initialized()?;

        let (index, item) = self
            .inner
            .state
            .borrow()
            .items
            .iter()
            .enumerate()
            .find(|(_, item)| item.id == quote_id)
            .map(|(index, item)| (index, item.clone()))
            .ok_or(CartError::ItemNotFound(quote_id))?;

        let started = Instant::now();
        let value = item.value_usd();
        let rate = self.rate();

        let result = self
            .commit(
                move |s| {
                    if let Some(pos) = s.position(quote_id) {
                        s.items.remove(pos);
                        s.metadata.record_removed(value, rate);
                    }
                },
                move |s| {
                    if !s.contains(quote_id) {
                        let pos = index.min(s.items.len());
                        s.items.insert(pos, item);
                        s.metadata.record_added(value, rate);
                    }
                },
            )
            .await;
        self.finish(Operation::Remove, started, result.is_ok());
        result?;

        self.inner.engine.emit(CartEvent::ItemRemoved { quote_id });
        self.record_history();
        Ok(())
    }

    /// Add `quote` if absent, remove it if present.
    ///
    /// # Errors
    ///
    /// See [`Self::add_item`] and [`Self::remove_item`].
    pub async fn toggle_item(
        &self,
        quote: Quote,
        metadata: Option<CartItemMetadata>,
    ) -> Result<ToggleOutcome, CartError> {
        let _write = self.inner.write_lock.lock().await;
        self.ensure_initialized()?;
        if self.contains(quote.id) {
            self.remove_locked(quote.id).await?;
            Ok(ToggleOutcome::Removed)
        } else {
            self.add_locked(quote, metadata).await?;
            Ok(ToggleOutcome::Added)
        }
    }

    /// Remove every line. Returns the number of lines removed.
    ///
    /// # Errors
    ///
    /// Same persistence errors as [`Self::add_item`]; on failure the previous
    /// item list and totals are restored.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<usize, CartError> {
        let _write = self.inner.write_lock.lock().await;
        self.ensure_initialized()?;

        let previous = self.inner.state.borrow().contents();
        let removed = previous.items.len();
        if removed == 0 {
            return Ok(0);
        }

        let started = Instant::now();
        let rate = self.rate();
        let result = self
            .commit(
                |s| {
                    s.items.clear();
                    s.metadata.clear_totals();
                },
                move |s| s.restore_items(previous.items, rate),
            )
            .await;
        self.finish(Operation::Clear, started, result.is_ok());
        result?;

        self.inner.engine.emit(CartEvent::CartCleared { removed });
        self.record_history();
        Ok(removed)
    }

    /// Patch the metadata of the line for `quote_id` and bump its
    /// `last_updated`. Returns the updated line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the quote is not in the cart, and
    /// the same persistence errors as [`Self::add_item`].
    #[instrument(skip(self, patch))]
    pub async fn update_item_metadata(
        &self,
        quote_id: QuoteId,
        patch: MetadataPatch,
    ) -> Result<CartItem, CartError> {
        let _write = self.inner.write_lock.lock().await;
        self.ensure_initialized()?;

        let original = self
            .inner
            .state
            .borrow()
            .get(quote_id)
            .cloned()
            .ok_or(CartError::ItemNotFound(quote_id))?;
        if patch.is_empty() {
            return Ok(original);
        }

        let started = Instant::now();
        let result = self
            .commit(
                move |s| {
                    if let Some(item) = s.items.iter_mut().find(|i| i.id == quote_id) {
                        patch.apply(&mut item.metadata);
                        item.last_updated = Utc::now();
                    }
                },
                move |s| {
                    if let Some(item) = s.items.iter_mut().find(|i| i.id == quote_id) {
                        item.metadata = original.metadata;
                        item.last_updated = original.last_updated;
                    }
                },
            )
            .await;
        self.finish(Operation::Update, started, result.is_ok());
        result?;

        self.inner.engine.emit(CartEvent::ItemUpdated { quote_id });
        self.record_history();
        self.inner
            .state
            .borrow()
            .get(quote_id)
            .cloned()
            .ok_or(CartError::ItemNotFound(quote_id))
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Replace local state with the persisted snapshot (server wins).
    ///
    /// # Errors
    ///
    /// Returns `CartError::Offline` in guest mode and
    /// `CartError::Persistence` if the load fails (status becomes `error`).
    #[instrument(skip(self))]
    pub async fn sync_with_server(&self) -> Result<(), CartError> {
        let _write = self.inner.write_lock.lock().await;
        let user_id = self.require_user()?;
        let started = Instant::now();
        self.set_status(SyncStatus::Syncing);

        let result = self.inner.engine.load(user_id).await;
        self.finish(Operation::Sync, started, result.is_ok());

        match result {
            Ok(snapshot) => {
                let local_version = self.inner.state.borrow().version;
                let remote_version = snapshot.as_ref().map_or(0, |s| s.version);
                if local_version != Some(remote_version) {
                    info!(
                        ?local_version,
                        remote_version, "cart changed elsewhere, adopting server state"
                    );
                }
                self.adopt(snapshot, SyncStatus::Synced);
                self.record_history();
                Ok(())
            }
            Err(e) => {
                self.set_status(SyncStatus::Error);
                Err(e)
            }
        }
    }

    /// Overwrite the persisted snapshot with local state, ignoring versions.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Offline` in guest mode and
    /// `CartError::Persistence` if the save fails (status becomes `error`).
    #[instrument(skip(self))]
    pub async fn force_sync_to_server(&self) -> Result<(), CartError> {
        let _write = self.inner.write_lock.lock().await;
        let user_id = self.require_user()?;
        let started = Instant::now();
        self.set_status(SyncStatus::Syncing);

        let contents = self.inner.state.borrow().contents();
        let result = self.inner.engine.persist(user_id, &contents, None).await;
        self.finish(Operation::Sync, started, result.is_ok());

        match result {
            Ok(snapshot) => {
                self.mark_synced(&snapshot);
                Ok(())
            }
            Err(e) => {
                self.set_status(SyncStatus::Error);
                Err(e)
            }
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Restore the previous committed state.
    ///
    /// Returns `false` (and changes nothing) when there is no earlier state.
    ///
    /// # Errors
    ///
    /// Same persistence errors as [`Self::add_item`]; on failure both the
    /// cart and the history are left as they were.
    #[instrument(skip(self))]
    pub async fn undo(&self) -> Result<bool, CartError> {
        let _write = self.inner.write_lock.lock().await;
        self.ensure_initialized()?;

        let Some((discarded, previous)) = self.history().step_back() else {
            debug!("nothing to undo");
            return Ok(false);
        };

        let started = Instant::now();
        let before = self.inner.state.borrow().contents();
        let rate = self.rate();

        let result = self
            .commit(
                move |s| {
                    let last_sync = s.metadata.last_sync;
                    s.replace_contents(previous, rate);
                    s.metadata.last_sync = last_sync;
                },
                move |s| s.replace_contents(before, rate),
            )
            .await;
        self.finish(Operation::Undo, started, result.is_ok());

        match result {
            Ok(()) => {
                let total_items = self.item_count();
                self.inner
                    .engine
                    .emit(CartEvent::HistoryRestored { total_items });
                Ok(true)
            }
            // Server state was recorded as the new current entry.
            Err(e @ CartError::Conflict { .. }) => Err(e),
            Err(e) => {
                self.history().restore(discarded);
                Err(e)
            }
        }
    }

    /// Not supported: history keeps no forward states. Always returns `false`.
    pub fn redo(&self) -> bool {
        warn!("redo requested but the cart keeps no redo stack");
        false
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Receiver of engine lifecycle events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.engine.subscribe()
    }

    #[must_use]
    pub fn contains(&self, quote_id: QuoteId) -> bool {
        self.inner.state.borrow().contains(quote_id)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.inner.state.borrow().items.len()
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.inner.state.borrow().sync_status
    }

    #[must_use]
    pub fn summary(&self) -> CartSummary {
        self.inner.state.borrow().summary()
    }

    #[must_use]
    pub fn analytics(&self) -> CartAnalytics {
        self.inner.engine.analytics_snapshot()
    }

    /// Number of recorded history states, current one included.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history().len()
    }

    #[must_use]
    pub fn config(&self) -> &CartConfig {
        &self.inner.config
    }

    /// Check that the persistence backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Persistence` if it is not.
    pub async fn ping(&self) -> Result<(), CartError> {
        self.inner.engine.ping().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply `apply` locally and persist; on failure apply `revert`.
    ///
    /// Callers hold `write_lock`. Guest carts only apply locally.
    async fn commit(
        &self,
        apply: impl FnOnce(&mut CartState),
        revert: impl FnOnce(&mut CartState),
    ) -> Result<(), CartError> {
        let user_id = self.inner.state.borrow().user_id;
        let Some(user_id) = user_id else {
            self.inner.state.send_modify(apply);
            return Ok(());
        };

        let engine = &self.inner.engine;
        let result = optimistic::run(
            &self.inner.state,
            |s| {
                apply(s);
                s.sync_status = SyncStatus::Syncing;
            },
            |s| {
                revert(s);
                s.sync_status = SyncStatus::Error;
            },
            |applied| async move {
                let contents = applied.contents();
                engine.persist(user_id, &contents, applied.version).await
            },
        )
        .await;

        match result {
            Ok(snapshot) => {
                self.mark_synced(&snapshot);
                Ok(())
            }
            Err(e @ CartError::Conflict { .. }) => {
                self.adopt_server_state(user_id).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace local state with the server snapshot after a lost race.
    async fn adopt_server_state(&self, user_id: UserId) {
        match self.inner.engine.load(user_id).await {
            Ok(snapshot) => {
                self.adopt(snapshot, SyncStatus::Conflict);
                self.record_history();
            }
            Err(e) => {
                error!(%user_id, error = %e, "failed to reload cart after conflict");
                self.set_status(SyncStatus::Error);
            }
        }
    }

    /// Replace items, metadata and version with `snapshot` (empty if `None`).
    fn adopt(&self, snapshot: Option<CartSnapshot>, status: SyncStatus) {
        let rate = self.rate();
        let currency = self.inner.config.display_currency;
        self.inner.state.send_modify(|s| {
            match snapshot {
                Some(snapshot) => {
                    s.replace_contents(snapshot.contents, rate);
                    s.version = Some(snapshot.version);
                }
                None => {
                    s.replace_contents(CartContents::empty(currency), rate);
                    s.version = Some(0);
                }
            }
            s.metadata.last_sync = Some(Utc::now());
            s.sync_status = status;
        });
    }

    fn mark_synced(&self, snapshot: &CartSnapshot) {
        self.inner.state.send_modify(|s| {
            s.version = Some(snapshot.version);
            s.metadata.last_sync = Some(snapshot.saved_at);
            s.sync_status = SyncStatus::Synced;
        });
    }

    fn set_status(&self, status: SyncStatus) {
        self.inner.state.send_modify(|s| s.sync_status = status);
    }

    fn ensure_initialized(&self) -> Result<(), CartError> {
        if self.inner.state.borrow().initialized {
            Ok(())
        } else {
            Err(CartError::NotInitialized)
        }
    }

    fn require_user(&self) -> Result<UserId, CartError> {
        let state = self.inner.state.borrow();
        if !state.initialized {
            return Err(CartError::NotInitialized);
        }
        state.user_id.ok_or(CartError::Offline)
    }

    fn rate(&self) -> Decimal {
        self.inner.config.display_rate
    }

    fn finish(&self, operation: Operation, started: Instant, succeeded: bool) {
        self.inner
            .engine
            .record(operation, started.elapsed(), succeeded);
    }

    fn history(&self) -> MutexGuard<'_, History> {
        lock(&self.inner.history)
    }

    fn record_history(&self) {
        let contents = self.inner.state.borrow().contents();
        self.history().record(contents);
    }

    fn reset_history(&self) {
        let contents = self.inner.state.borrow().contents();
        self.history().reset_to(contents);
    }

    /// Log engine events until the engine goes away or the store is reset.
    fn start_listener(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no tokio runtime, cart event listener not started");
            return;
        };

        let mut events = self.inner.engine.subscribe();
        let handle = runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => debug!(event = event.name(), ?event, "cart event"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "cart event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = lock(&self.inner.listener).replace(handle) {
            previous.abort();
        }
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("CartStore")
            .field("user_id", &state.user_id)
            .field("items", &state.items.len())
            .field("sync_status", &state.sync_status)
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
