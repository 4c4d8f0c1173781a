//! Power budget: spare wattage under the subscribed contract.
//!
//! ```text
//! available = max(0, ISOUSC − IINST) × nominal voltage
//! ```
//!
//! `None` means *unknown* (no snapshot, stale snapshot, unparseable
//! currents) and is deliberately distinct from `Some(0)`.  Every consumer
//! treats unknown as the unsafe case.

use std::time::{Duration, Instant};

use crate::config::ControllerConfig;
use crate::teleinfo::TelemetrySnapshot;

/// Reserve kept free before any admission decision (W).
pub const DEFAULT_SAFETY_MARGIN_W: u32 = 2000;
/// Mains voltage used to turn amps into watts.
pub const DEFAULT_NOMINAL_VOLTAGE: u32 = 220;
/// Snapshots older than this are unknown.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5);

/// Parameters of the budget computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerBudget {
    pub nominal_voltage: u32,
    pub freshness: Duration,
    pub safety_margin: u32,
}

impl Default for PowerBudget {
    fn default() -> Self {
        Self {
            nominal_voltage: DEFAULT_NOMINAL_VOLTAGE,
            freshness: DEFAULT_FRESHNESS,
            safety_margin: DEFAULT_SAFETY_MARGIN_W,
        }
    }
}

impl From<&ControllerConfig> for PowerBudget {
    fn from(cfg: &ControllerConfig) -> Self {
        Self {
            nominal_voltage: cfg.nominal_voltage,
            freshness: Duration::from_secs(u64::from(cfg.telemetry_freshness_secs)),
            safety_margin: cfg.safety_margin_w,
        }
    }
}

impl PowerBudget {
    /// Spare watts according to `snapshot`, judged at `now`.
    pub fn available_power(
        &self,
        snapshot: Option<&TelemetrySnapshot>,
        now: Instant,
    ) -> Option<u32> {
        let snapshot = snapshot?;
        if snapshot.age(now) > self.freshness {
            return None;
        }
        let subscribed = snapshot.subscribed_current()?;
        let used = snapshot.instantaneous_current()?;
        Some(subscribed.saturating_sub(used).saturating_mul(self.nominal_voltage))
    }
}
