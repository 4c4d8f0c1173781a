//! Database ↔ hardware reconciliation.
//!
//! ```text
//!  RadiatorStore ──rows──▶ apply ──set_pin × N──▶ PinDriver
//!                                                    │
//!  RadiatorStore ◀──batch── diff ◀──one sweep────────┘
//! ```
//!
//! **Apply** drives every radiator's pin from its `requested_state`,
//! best effort per pin.  **Observe** reads all sixteen pins at once and
//! writes back only the rows whose `actual_state` or `error` moved.  The
//! driver lock is held across both phases so nothing slips in between.
//!
//! This is the only writer of `actual_state`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::drivers::mcp23017::{BusOpener, PinDriver, PinObservations, PinWrite, SharedPinDriver};
use crate::error::{HardwareError, StoreError};
use crate::mapper::{pin_level_for, state_for};
use crate::radiator::Radiator;

use super::events::SyncSummary;
use super::ports::{ObservedUpdate, RadiatorStore};

pub struct RadiatorSyncService<O: BusOpener> {
    driver: Arc<SharedPinDriver<O>>,
}

impl<O: BusOpener> Clone for RadiatorSyncService<O> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
        }
    }
}

impl<O: BusOpener> RadiatorSyncService<O> {
    pub fn new(driver: Arc<SharedPinDriver<O>>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<SharedPinDriver<O>> {
        &self.driver
    }

    /// One full apply + observe cycle.
    pub fn synchronize<S: RadiatorStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<SyncSummary, StoreError> {
        let rows = store.load_all()?;
        let now = Utc::now();

        let (writes, observed) = self.driver.with(|d| {
            let writes = apply(d, &rows);
            (writes, d.get_all_pin_states())
        });

        let updates = diff_observations(&rows, &writes, &observed, now);
        let written = if updates.is_empty() {
            0
        } else {
            store.apply_observations(&updates)?
        };
        if written != updates.len() {
            warn!(
                "sync: wrote {written} of {} radiator updates: {:?}",
                updates.len(),
                updates.iter().map(|u| u.id).collect::<Vec<_>>()
            );
        }

        Ok(SyncSummary {
            applied: writes.len(),
            apply_failures: writes.iter().filter(|w| !w.applied).count(),
            changed: updates.len(),
            written,
            bus_faults: writes
                .iter()
                .filter(|w| w.error.as_ref().is_some_and(HardwareError::is_bus_fault))
                .count(),
            sweep_failed: observed.iter().any(|(_, o)| o.error.is_some()),
        })
    }
}

/// Push every row's requested state to its pin.  A failing pin is logged
/// and the loop moves on.
pub fn apply<O: BusOpener>(driver: &mut PinDriver<O>, rows: &[Radiator]) -> Vec<PinWrite> {
    rows.iter()
        .map(|r| {
            let w = driver.write_verified(r.control_pin, pin_level_for(r.requested_state));
            if let Some(e) = &w.error {
                warn!("sync: radiator {} ({}): {e}", r.id, r.name);
            }
            w
        })
        .collect()
}

/// Rows whose observed state or error differs from what is stored.
///
/// The error attached to a row is the sweep's error for that pin, or
/// failing that, the apply-phase error for the same pin.
pub fn diff_observations(
    rows: &[Radiator],
    writes: &[PinWrite],
    observed: &PinObservations,
    at: DateTime<Utc>,
) -> Vec<ObservedUpdate> {
    let mut updates = Vec::new();
    for r in rows {
        let obs = observed.get(r.control_pin);
        let actual_state = state_for(obs.state);
        let error = obs.error.or_else(|| {
            writes
                .iter()
                .find(|w| w.pin == r.control_pin)
                .and_then(|w| w.error.as_ref())
                .map(ToString::to_string)
        });

        if r.actual_state == actual_state && r.error == error {
            continue;
        }
        debug!(
            "sync: radiator {} {} -> {} ({:?})",
            r.id, r.actual_state, actual_state, error
        );
        updates.push(ObservedUpdate {
            id: r.id,
            actual_state,
            error,
            observed_at: at,
        });
    }
    updates
}
