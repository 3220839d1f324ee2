//! Debounced progress writes
//!
//! The position feed ticks about once a second; writing every tick would be
//! wasteful. [`ProgressDebouncer`] holds the newest record and saves it only
//! after a quiet period with no further updates, or immediately on
//! [`flush`](ProgressDebouncer::flush).

use crate::collaborators::{ProgressRecord, ProgressStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

type PendingSlot = Arc<Mutex<Option<ProgressRecord>>>;

/// Coalesces progress records into one write per quiet period
///
/// A record is written at most once: whoever takes it out of the pending
/// slot (the timer or a flush) saves it.
pub struct ProgressDebouncer {
    store: Arc<dyn ProgressStore>,
    quiet_period: Duration,
    pending: PendingSlot,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressDebouncer {
    pub fn new(store: Arc<dyn ProgressStore>, quiet_period: Duration) -> Self {
        Self {
            store,
            quiet_period,
            pending: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Replaces the pending record and restarts the quiet period
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, record: ProgressRecord) {
        let Ok(mut timer) = self.timer.lock() else {
            log::error!("Debounce timer lock poisoned, saving progress directly");
            self.store.save(record);
            return;
        };

        if let Some(previous) = timer.take() {
            previous.abort();
        }
        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(record);
        }

        let pending = Arc::clone(&self.pending);
        let store = Arc::clone(&self.store);
        let quiet_period = self.quiet_period;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            let record = pending.lock().ok().and_then(|mut slot| slot.take());
            if let Some(record) = record {
                log::debug!(
                    "Persisting progress: track {} at {}ms",
                    record.track_index,
                    record.position_ms
                );
                store.save(record);
            }
        }));
    }

    /// Writes the pending record now, if there is one
    ///
    /// Returns true when a record was written.
    pub fn flush(&self) -> bool {
        self.abort_timer();
        match self.take_pending() {
            Some(record) => {
                log::debug!(
                    "Flushing progress: track {} at {}ms",
                    record.track_index,
                    record.position_ms
                );
                self.store.save(record);
                true
            }
            None => false,
        }
    }

    /// Drops the pending record without writing it
    pub fn cancel(&self) {
        self.abort_timer();
        if self.take_pending().is_some() {
            log::debug!("Discarded pending progress write");
        }
    }

    /// True while a record is waiting to be written
    pub fn has_pending(&self) -> bool {
        self.pending.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn abort_timer(&self) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }

    fn take_pending(&self) -> Option<ProgressRecord> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Drop for ProgressDebouncer {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

impl std::fmt::Debug for ProgressDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressDebouncer")
            .field("quiet_period", &self.quiet_period)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}
