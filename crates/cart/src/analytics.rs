//! Operation counters and response-time tracking.

use std::time::Duration;

use serde::Serialize;

/// Kind of store operation being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
    Update,
    Clear,
    Undo,
    Sync,
}

/// Counters collected by the cart engine.
///
/// Counts only include successful operations; failures are counted once in
/// `failure_count` regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CartAnalytics {
    pub add_count: u64,
    pub remove_count: u64,
    pub update_count: u64,
    pub clear_count: u64,
    pub undo_count: u64,
    pub sync_count: u64,
    pub failure_count: u64,
    pub conflict_count: u64,
    /// Number of samples folded into `average_response_ms`.
    pub measured_operations: u64,
    /// Rolling mean of operation latency, successes and failures alike.
    pub average_response_ms: f64,
}

impl CartAnalytics {
    /// Record one finished operation.
    pub fn record(&mut self, operation: Operation, elapsed: Duration, succeeded: bool) {
        if succeeded {
            let counter = match operation {
                Operation::Add => &mut self.add_count,
                Operation::Remove => &mut self.remove_count,
                Operation::Update => &mut self.update_count,
                Operation::Clear => &mut self.clear_count,
                Operation::Undo => &mut self.undo_count,
                Operation::Sync => &mut self.sync_count,
            };
            *counter += 1;
        } else {
            self.failure_count += 1;
        }
        self.fold_response_time(elapsed);
    }

    /// Record a version conflict.
    pub fn record_conflict(&mut self) {
        self.conflict_count += 1;
    }

    fn fold_response_time(&mut self, elapsed: Duration) {
        self.measured_operations += 1;
        let sample = elapsed.as_secs_f64() * 1000.0;
        #[allow(clippy::cast_precision_loss)] // Operation count will never exceed f64 precision
        let n = self.measured_operations as f64;
        self.average_response_ms += (sample - self.average_response_ms) / n;
    }
}
