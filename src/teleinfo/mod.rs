//! Historic-mode teleinfo (TIC) decoding.
//!
//! The meter streams one field per line at 1200 baud:
//!
//! ```text
//! STX
//! ADCO 021728123456 @ CR LF      ◀── first field of every frame
//! OPTARIF HC.. < CR LF
//! ISOUSC 45 ? CR LF
//! ...
//! MOTDETAT 000000 B CR ETX
//! ```
//!
//! - [`line`] validates one line (checksum) and extracts `(key, value)`.
//! - [`frame`] collects fields into a self-resynchronising buffer and
//!   yields a [`TelemetrySnapshot`] once every required key is present.
//! - [`assembler`] turns raw serial chunks into lines.

pub mod assembler;
pub mod frame;
pub mod line;

use std::time::{Duration, Instant};

use heapless::FnvIndexMap;

/// Longest label we accept (historic labels are at most 8 chars).
pub const KEY_CAPACITY: usize = 16;
/// Longest value we accept (ADCO is 12 digits).
pub const VALUE_CAPACITY: usize = 32;
/// Distinct fields kept per frame.  Must be a power of two.
pub const MAX_FIELDS: usize = 32;

pub type Key = heapless::String<KEY_CAPACITY>;
pub type Value = heapless::String<VALUE_CAPACITY>;
pub type Fields = FnvIndexMap<Key, Value, MAX_FIELDS>;

/// Field labels used by the controller.
pub mod label {
    /// Meter address.
    pub const ADCO: &str = "ADCO";
    /// Tariff option.
    pub const OPTARIF: &str = "OPTARIF";
    /// Subscribed current (A).
    pub const ISOUSC: &str = "ISOUSC";
    /// Current tariff period.
    pub const PTEC: &str = "PTEC";
    /// Instantaneous current (A).
    pub const IINST: &str = "IINST";
    /// Peak current (A).
    pub const IMAX: &str = "IMAX";
    /// Apparent power (VA).
    pub const PAPP: &str = "PAPP";
    /// Meter status word.
    pub const MOTDETAT: &str = "MOTDETAT";
}

/// Every frame starts with this field; the buffer only opens on it.
pub const FIRST_FRAME_KEY: &str = label::ADCO;

/// A frame is complete once all of these have been seen.
pub const REQUIRED_KEYS: [&str; 4] = [label::ADCO, label::MOTDETAT, label::IINST, label::ISOUSC];

/// One completed frame, frozen at the moment it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    captured_at: Instant,
    fields: Fields,
}

impl TelemetrySnapshot {
    pub fn new(fields: Fields, captured_at: Instant) -> Self {
        Self {
            captured_at,
            fields,
        }
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Time elapsed between capture and `now` (zero if `now` is earlier).
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key)?.parse().ok()
    }

    /// ISOUSC, if it parses as an integer.
    pub fn subscribed_current(&self) -> Option<u32> {
        self.get_u32(label::ISOUSC)
    }

    /// IINST, if it parses as an integer.
    pub fn instantaneous_current(&self) -> Option<u32> {
        self.get_u32(label::IINST)
    }

    pub fn apparent_power(&self) -> Option<u32> {
        self.get_u32(label::PAPP)
    }

    pub fn tariff_period(&self) -> Option<&str> {
        self.get(label::PTEC)
    }

    pub fn meter_address(&self) -> Option<&str> {
        self.get(label::ADCO)
    }

    pub fn status_word(&self) -> Option<&str> {
        self.get(label::MOTDETAT)
    }
}

impl core::fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (k, v) in &self.fields {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}
