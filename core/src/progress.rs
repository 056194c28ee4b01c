//! Progress reporting and cooperative cancellation for batch exports.
//!
//! Events arrive strictly in entry order: one start event per entry that
//! begins, then a single completion event once the loop finishes. A cancelled
//! batch produces no completion event.

use crate::error::{MigcheckError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Label of the final progress event
pub const BATCH_COMPLETE: &str = "batch complete";

/// Result of one batch entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Succeeded { artifact: String },
    Failed { reason: String },
}

impl EntryStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EntryStatus::Succeeded { .. })
    }
}

pub trait BatchProgress: Send + Sync {
    /// `current` is the 0-based entry index, or `total` for the completion event
    fn on_progress(&self, current: usize, total: usize, label: &str);

    fn on_entry_finished(&self, _index: usize, _key: &str, _status: &EntryStatus) {}
}

impl<F> BatchProgress for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn on_progress(&self, current: usize, total: usize, label: &str) {
        self(current, total, label)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl BatchProgress for NoProgress {
    fn on_progress(&self, _current: usize, _total: usize, _label: &str) {}
}

/// Shared stop signal, checked before each entry starts
#[derive(Debug, Default, Clone)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded,
    PartiallySucceeded,
    Cancelled,
}

impl BatchOutcome {
    /// Classify a pipeline result. Errors other than cancellation are passed through.
    pub fn from_result(result: Result<bool>) -> Result<Self> {
        match result {
            Ok(true) => Ok(BatchOutcome::Succeeded),
            Ok(false) => Ok(BatchOutcome::PartiallySucceeded),
            Err(MigcheckError::Cancelled) => Ok(BatchOutcome::Cancelled),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_progress() {
        let events = Mutex::new(Vec::new());
        let progress = |current: usize, total: usize, label: &str| {
            events.lock().unwrap().push(format!("{current}/{total} {label}"));
        };
        progress.on_progress(0, 2, "users");
        progress.on_entry_finished(0, "users", &EntryStatus::Failed { reason: "x".into() });
        assert_eq!(*events.lock().unwrap(), vec!["0/2 users"]);
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(BatchOutcome::from_result(Ok(true)).unwrap(), BatchOutcome::Succeeded);
        assert_eq!(BatchOutcome::from_result(Ok(false)).unwrap(), BatchOutcome::PartiallySucceeded);
        assert_eq!(
            BatchOutcome::from_result(Err(MigcheckError::Cancelled)).unwrap(),
            BatchOutcome::Cancelled
        );
        assert!(BatchOutcome::from_result(Err(MigcheckError::config("bad"))).is_err());
    }
}
