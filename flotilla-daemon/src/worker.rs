//! The write-once result slot shared between a worker task and the
//! dispatcher's `results` handler (ยง4.4, ยง9).
//!
//! Mirrors the historical source's `sync.Mutex`-guarded nullable `*result`
//! field rather than a channel: a channel would need an idle task parked on
//! it just in case nobody ever reads the value.

use std::sync::Arc;

use flotilla_core::WorkerResult;
use parking_lot::Mutex;

use flotilla_core::RESULTS_NOT_READY;

#[derive(Clone, Default)]
pub struct ResultSlot(Arc<Mutex<Option<WorkerResult>>>);

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, result: WorkerResult) {
        *self.0.lock() = Some(result);
    }

    /// Returns the deposited result, or the soft "not ready" failure the
    /// client is expected to retry on (ยง7, ยง9).
    pub fn get(&self) -> Result<WorkerResult, String> {
        self.0.lock().clone().ok_or_else(|| RESULTS_NOT_READY.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unset_slot_reports_not_ready() {
        let slot = ResultSlot::new();
        assert_eq!(slot.get().unwrap_err(), RESULTS_NOT_READY);
    }

    #[test]
    fn set_slot_returns_the_deposited_result() {
        let slot = ResultSlot::new();
        slot.set(WorkerResult::success(1.0, 2.0, None));
        assert!(slot.get().unwrap().error.is_none());
    }
}
