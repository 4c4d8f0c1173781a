//! JSON-backed radiator table.
//!
//! Implements [`RadiatorStore`] with the whole table in memory behind a
//! mutex, optionally mirrored to a JSON file after every write.  A write
//! is staged on a copy, persisted, and only then swapped in, so a failed
//! save leaves both the file and the in-memory table untouched.
//!
//! Admin tooling edits the same file while the controller runs.  Every
//! read and write first compares the file's modification time and length
//! with what was last loaded or saved, and reloads on any difference.
//!
//! `id`, `name` and `control_pin` are unique.  Pins outside the expander
//! range are accepted here; reconciliation reports them per row.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::app::ports::{ObservedUpdate, RadiatorStore};
use crate::error::StoreError;
use crate::radiator::{Radiator, RadiatorId, RequestedState};

/// Modification time and length of the backing file.
type Stamp = (SystemTime, u64);

struct Table {
    rows: Vec<Radiator>,
    stamp: Option<Stamp>,
}

pub struct JsonRadiatorStore {
    path: Option<PathBuf>,
    table: Mutex<Table>,
}

impl JsonRadiatorStore {
    /// Table without a backing file.
    pub fn in_memory(rows: Vec<Radiator>) -> Result<Self, StoreError> {
        check_unique(&rows)?;
        Ok(Self {
            path: None,
            table: Mutex::new(Table { rows, stamp: None }),
        })
    }

    /// Load `path`; a missing file is an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let stamp = stamp(&path);
        let rows = match stamp {
            Some(_) => read_rows(&path)?,
            None => Vec::new(),
        };
        info!("RadiatorStore: {} radiators from {}", rows.len(), path.display());
        Ok(Self {
            path: Some(path),
            table: Mutex::new(Table { rows, stamp }),
        })
    }

    /// Register a radiator (admin tooling, tests).
    pub fn insert(&self, radiator: Radiator) -> Result<(), StoreError> {
        self.update(|rows| {
            rows.push(radiator);
            check_unique(rows)?;
            Ok(1)
        })
        .map(|_| ())
    }

    pub fn get(&self, id: RadiatorId) -> Option<Radiator> {
        self.load_all().ok()?.into_iter().find(|r| r.id == id)
    }

    /// Drop a row (admin tooling).  Returns whether it existed.
    pub fn remove(&self, id: RadiatorId) -> Result<bool, StoreError> {
        self.update(|rows| {
            let before = rows.len();
            rows.retain(|r| r.id != id);
            Ok(before - rows.len())
        })
        .map(|n| n > 0)
    }

    /// Lock the table, reloading it first if the file changed underneath.
    fn lock(&self) -> Result<MutexGuard<'_, Table>, StoreError> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = &self.path {
            let current = stamp(path);
            if current.is_some() && current != table.stamp {
                table.rows = read_rows(path)?;
                table.stamp = current;
                info!(
                    "RadiatorStore: reloaded {} radiators after external edit",
                    table.rows.len()
                );
            } else if current.is_none() && table.stamp.is_some() {
                warn!("RadiatorStore: {} disappeared, keeping rows in memory", path.display());
                table.stamp = None;
            }
        }
        Ok(table)
    }

    /// Stage `f` on a copy, persist, then commit.
    fn update(
        &self,
        f: impl FnOnce(&mut Vec<Radiator>) -> Result<usize, StoreError>,
    ) -> Result<usize, StoreError> {
        let mut table = self.lock()?;
        let mut staged = table.rows.clone();
        let written = f(&mut staged)?;
        if written > 0 {
            table.stamp = self.persist(&staged)?;
            table.rows = staged;
        }
        Ok(written)
    }

    fn persist(&self, rows: &[Radiator]) -> Result<Option<Stamp>, StoreError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let json = serde_json::to_vec_pretty(rows)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        super::write_atomically(path, &json)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        debug!("RadiatorStore: saved {} rows", rows.len());
        Ok(stamp(path))
    }
}

fn stamp(path: &Path) -> Option<Stamp> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

fn read_rows(path: &Path) -> Result<Vec<Radiator>, StoreError> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
    let rows: Vec<Radiator> = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::Corrupted(format!("{}: {e}", path.display())))?;
    check_unique(&rows)?;
    Ok(rows)
}

fn check_unique(rows: &[Radiator]) -> Result<(), StoreError> {
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            if a.id == b.id {
                return Err(StoreError::Conflict(format!("duplicate id {}", a.id)));
            }
            if a.name == b.name {
                return Err(StoreError::Conflict(format!("duplicate name {:?}", a.name)));
            }
            if a.control_pin == b.control_pin {
                return Err(StoreError::Conflict(format!(
                    "pin {} used by radiators {} and {}",
                    a.control_pin, a.id, b.id
                )));
            }
        }
    }
    Ok(())
}

impl RadiatorStore for JsonRadiatorStore {
    fn load_all(&self) -> Result<Vec<Radiator>, StoreError> {
        Ok(self.lock()?.rows.clone())
    }

    fn set_requested_state(
        &self,
        ids: &[RadiatorId],
        state: RequestedState,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.update(|rows| {
            let mut n = 0;
            for r in rows
                .iter_mut()
                .filter(|r| ids.contains(&r.id) && r.requested_state != state)
            {
                r.requested_state = state;
                r.last_requested = at;
                n += 1;
            }
            Ok(n)
        })
    }

    fn apply_observations(&self, updates: &[ObservedUpdate]) -> Result<usize, StoreError> {
        self.update(|rows| {
            let mut n = 0;
            for u in updates {
                if let Some(r) = rows.iter_mut().find(|r| r.id == u.id) {
                    r.actual_state = u.actual_state;
                    r.error.clone_from(&u.error);
                    r.last_observed = Some(u.observed_at);
                    n += 1;
                }
            }
            Ok(n)
        })
    }
}
