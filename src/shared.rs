//! State shared between the telemetry listener and the periodic cycle.
//!
//! Both values are swapped as a whole under a critical section; a reader
//! gets either the old value or the new one, never a mix.
//!
//! ```text
//!  listener ──publish──▶ TelemetryStore ◀──latest── controller
//!  intake ───replace──▶ DeferredActivationQueue ◀──remove── admission
//! ```

use core::cell::RefCell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use log::warn;

use crate::pins::PIN_COUNT;
use crate::radiator::{DeferredActivationEntry, RadiatorId};
use crate::teleinfo::TelemetrySnapshot;

// ───────────────────────────────────────────────────────────────
// TelemetryStore
// ───────────────────────────────────────────────────────────────

/// Latest completed teleinfo frame.
pub struct TelemetryStore {
    latest: Mutex<CriticalSectionRawMutex, RefCell<Option<Arc<TelemetrySnapshot>>>>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryStore {
    pub const fn new() -> Self {
        Self {
            latest: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn publish(&self, snapshot: TelemetrySnapshot) -> Arc<TelemetrySnapshot> {
        let snapshot = Arc::new(snapshot);
        self.latest
            .lock(|cell| *cell.borrow_mut() = Some(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.latest.lock(|cell| cell.borrow().clone())
    }
}

// ───────────────────────────────────────────────────────────────
// DeferredActivationQueue
// ───────────────────────────────────────────────────────────────

/// One entry per radiator at most, and there is one radiator per pin.
pub const QUEUE_CAPACITY: usize = PIN_COUNT as usize;

type Entries = heapless::Vec<DeferredActivationEntry, QUEUE_CAPACITY>;

/// Radiators waiting for power.  Always replaced wholesale.
pub struct DeferredActivationQueue {
    entries: Mutex<CriticalSectionRawMutex, RefCell<Entries>>,
}

impl Default for DeferredActivationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredActivationQueue {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Swap in a new queue.  Repeated radiators keep their last entry.
    pub fn replace(&self, entries: &[DeferredActivationEntry]) {
        let next = dedup(entries);
        self.entries.lock(|cell| *cell.borrow_mut() = next);
    }

    /// Drop the entries for `ids`, leaving everything else in place.
    /// Entries swapped in by a concurrent intake survive unless named.
    pub fn remove(&self, ids: &[RadiatorId]) {
        self.entries
            .lock(|cell| cell.borrow_mut().retain(|e| !ids.contains(&e.radiator_id)));
    }

    pub fn snapshot(&self) -> Vec<DeferredActivationEntry> {
        self.entries.lock(|cell| cell.borrow().to_vec())
    }

    pub fn len(&self) -> usize {
        self.entries.lock(|cell| cell.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dedup(entries: &[DeferredActivationEntry]) -> Entries {
    let mut out = Entries::new();
    for e in entries {
        if let Some(slot) = out.iter_mut().find(|s| s.radiator_id == e.radiator_id) {
            *slot = *e;
        } else if out.push(*e).is_err() {
            warn!(
                "admission queue full ({QUEUE_CAPACITY}), dropping radiator {}",
                e.radiator_id
            );
        }
    }
    out
}
