//! Frame buffer: collects validated fields until a frame is complete.
//!
//! ```text
//!        empty ──(ADCO)──▶ open ──(any key)──▶ open
//!          ▲                 │                   │
//!          │              (ADCO)          (all required keys)
//!          │                 ▼                   ▼
//!          │             restart            snapshot + clear
//!          └─────────────────────────────────────┘
//! ```
//!
//! Until the first-field key arrives everything is ignored, so the
//! buffer syncs on its own after start-up or line noise.

use std::time::Instant;

use log::debug;

use super::line::{parse_line, Field};
use super::{Fields, TelemetrySnapshot, FIRST_FRAME_KEY, REQUIRED_KEYS};

#[derive(Debug, Default)]
pub struct FrameBuffer {
    fields: Fields,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn has(&self, key: &str) -> bool {
        self.fields.keys().any(|k| k.as_str() == key)
    }

    fn is_open(&self) -> bool {
        self.has(FIRST_FRAME_KEY)
    }

    /// Whether `key` would be taken in the current state.
    pub fn can_accept(&self, key: &str) -> bool {
        (self.fields.is_empty() && key == FIRST_FRAME_KEY) || self.is_open()
    }

    /// Store a field.  Returns `false` if it was ignored.
    pub fn accept(&mut self, field: Field) -> bool {
        if field.key.as_str() == FIRST_FRAME_KEY && !self.fields.is_empty() {
            debug!("teleinfo: frame start while {} fields buffered, restarting", self.len());
            self.fields.clear();
        }
        if !self.can_accept(&field.key) {
            return false;
        }
        if self.fields.insert(field.key, field.value).is_err() {
            debug!("teleinfo: frame overflowed {} fields, dropping", self.len());
            self.fields.clear();
            return false;
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        REQUIRED_KEYS.iter().all(|k| self.has(k))
    }

    /// If complete, freeze the buffer into a snapshot and clear it.
    pub fn take_complete(&mut self, now: Instant) -> Option<TelemetrySnapshot> {
        if !self.is_complete() {
            return None;
        }
        Some(TelemetrySnapshot::new(core::mem::take(&mut self.fields), now))
    }

    /// Parse, accept and complete in one step.
    pub fn push_line(&mut self, raw: &[u8], now: Instant) -> Option<TelemetrySnapshot> {
        if let Some(field) = parse_line(raw) {
            self.accept(field);
        }
        self.take_complete(now)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}
