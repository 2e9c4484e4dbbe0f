//! Bounded undo history.
//!
//! The front entry is always the current committed state; older states
//! follow. Undo discards the front and exposes the next one, so a history
//! holding a single entry has nothing to undo. There is no redo stack.

use std::collections::VecDeque;

use crate::item::CartContents;

/// Default number of states retained.
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Ring buffer of committed cart states, newest first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<CartContents>,
    max_size: usize,
}

impl History {
    /// Create an empty history retaining at most `max_size` states.
    ///
    /// A `max_size` of zero is treated as one.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Record a newly committed state, evicting the oldest past capacity.
    pub fn record(&mut self, contents: CartContents) {
        self.entries.push_front(contents);
        self.entries.truncate(self.max_size);
    }

    /// Drop everything and start again from `contents`.
    pub fn reset_to(&mut self, contents: CartContents) {
        self.entries.clear();
        self.entries.push_front(contents);
    }

    /// Discard the current state and return `(discarded, previous)`.
    ///
    /// Returns `None` without modifying anything if fewer than two states are
    /// recorded.
    pub fn step_back(&mut self) -> Option<(CartContents, CartContents)> {
        if self.entries.len() <= 1 {
            return None;
        }
        let discarded = self.entries.pop_front()?;
        let previous = self.entries.front()?.clone();
        Some((discarded, previous))
    }

    /// Put back a state removed by [`Self::step_back`].
    pub fn restore(&mut self, contents: CartContents) {
        self.record(contents);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Current committed state.
    #[must_use]
    pub fn current(&self) -> Option<&CartContents> {
        self.entries.front()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use iwishbag_core::CurrencyCode;

    fn contents(total_items: usize) -> CartContents {
        let mut contents = CartContents::empty(CurrencyCode::USD);
        contents.metadata.total_items = total_items;
        contents
    }

    #[test]
    fn test_never_exceeds_max_size() {
        let mut history = History::default();
        for n in 0..50 {
            history.record(contents(n));
            assert!(history.len() <= DEFAULT_MAX_HISTORY);
        }
        assert_eq!(history.len(), DEFAULT_MAX_HISTORY);
        assert_eq!(history.current().unwrap().metadata.total_items, 49);
    }

    #[test]
    fn test_step_back_with_single_entry_is_noop() {
        let mut history = History::new(5);
        assert!(history.step_back().is_none());

        history.reset_to(contents(0));
        assert!(history.step_back().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_step_back_walks_to_oldest() {
        let mut history = History::new(5);
        history.reset_to(contents(0));
        history.record(contents(1));
        history.record(contents(2));

        let (discarded, previous) = history.step_back().unwrap();
        assert_eq!(discarded.metadata.total_items, 2);
        assert_eq!(previous.metadata.total_items, 1);

        let (_, previous) = history.step_back().unwrap();
        assert_eq!(previous.metadata.total_items, 0);

        assert!(history.step_back().is_none());
    }

    #[test]
    fn test_restore_undoes_step_back() {
        let mut history = History::new(5);
        history.reset_to(contents(0));
        history.record(contents(1));

        let (discarded, _) = history.step_back().unwrap();
        history.restore(discarded);

        assert_eq!(history.len(), 2);
        assert_eq!(history.current().unwrap().metadata.total_items, 1);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history = History::new(0);
        history.record(contents(1));
        history.record(contents(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.max_size(), 1);
    }
}
