//! Process-local persistence backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use iwishbag_core::UserId;

use super::{CartPersistence, CartSnapshot, PersistenceError};
use crate::item::CartContents;

/// Snapshots kept in a shared in-memory map.
///
/// Cloning shares the underlying map. Failures can be injected to exercise
/// rollback paths without a real backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartPersistence {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshots: Mutex<HashMap<UserId, CartSnapshot>>,
    failing_saves: AtomicUsize,
    failing_loads: AtomicUsize,
    save_calls: AtomicUsize,
}

impl InMemoryCartPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` saves fail with [`PersistenceError::Unavailable`].
    pub fn fail_next_saves(&self, count: usize) {
        self.inner.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` loads fail with [`PersistenceError::Unavailable`].
    pub fn fail_next_loads(&self, count: usize) {
        self.inner.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Number of save attempts seen, including injected failures.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.inner.save_calls.load(Ordering::SeqCst)
    }

    /// Stored snapshot for `user_id`.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<CartSnapshot> {
        self.snapshots().get(&user_id).cloned()
    }

    /// Number of stored carts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots().is_empty()
    }

    fn snapshots(&self) -> MutexGuard<'_, HashMap<UserId, CartSnapshot>> {
        self.inner
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CartPersistence for InMemoryCartPersistence {
    async fn load_cart_state(
        &self,
        user_id: UserId,
    ) -> Result<Option<CartSnapshot>, PersistenceError> {
        if Self::take_failure(&self.inner.failing_loads) {
            return Err(PersistenceError::Unavailable(
                "injected load failure".to_string(),
            ));
        }
        Ok(self.get(user_id))
    }

    async fn save_cart_state(
        &self,
        user_id: UserId,
        contents: &CartContents,
        expected_version: Option<u64>,
    ) -> Result<CartSnapshot, PersistenceError> {
        self.inner.save_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.inner.failing_saves) {
            return Err(PersistenceError::Unavailable(
                "injected save failure".to_string(),
            ));
        }

        let mut snapshots = self.snapshots();
        let stored = snapshots.get(&user_id).map_or(0, |s| s.version);
        if let Some(expected) = expected_version
            && expected != stored
        {
            return Err(PersistenceError::VersionConflict {
                expected,
                actual: stored,
            });
        }

        let snapshot = CartSnapshot {
            user_id,
            contents: contents.clone(),
            version: stored + 1,
            saved_at: Utc::now(),
        };
        snapshots.insert(user_id, snapshot.clone());
        Ok(snapshot)
    }
}
