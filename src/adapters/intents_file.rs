//! Heating-intent feed from the schedule.
//!
//! The heating schedule writes the current room wishes as a JSON array:
//!
//! ```json
//! [{"radiator_id": 1, "wants_heat": true}, {"radiator_id": 2, "wants_heat": false}]
//! ```
//!
//! A missing file means "no opinion" and yields no intents.

use std::path::PathBuf;

use crate::app::ports::IntentSource;
use crate::error::StoreError;
use crate::radiator::HeatingIntent;

pub struct IntentsFile {
    path: PathBuf,
}

impl IntentsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IntentSource for IntentsFile {
    fn current_intents(&self) -> Result<Vec<HeatingIntent>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupted(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(format!("{}: {e}", self.path.display()))),
        }
    }
}
