//! Outbound application events.
//!
//! The [`Controller`](super::service::Controller) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::radiator::RadiatorId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A teleinfo frame completed.
    Telemetry(TelemetryData),

    /// Radiators cut to recover power.  `available_w` is `None` when
    /// the meter was unreadable.
    LoadShed {
        ids: Vec<RadiatorId>,
        available_w: Option<u32>,
    },

    /// Outcome of an admission pass.
    Admission {
        admitted: Vec<RadiatorId>,
        deferred: Vec<RadiatorId>,
    },

    /// Heating intents processed.
    IntentsApplied {
        turned_off: Vec<RadiatorId>,
        queued: Vec<RadiatorId>,
    },

    /// One reconciliation cycle finished.
    Synchronized(SyncSummary),

    /// Fewer rows written than intended.
    SyncShortfall { intended: usize, written: usize },

    /// The controller has started.
    Started { radiators: usize, simulated: bool },
}

/// A completed-frame summary suitable for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryData {
    pub subscribed_a: Option<u32>,
    pub instantaneous_a: Option<u32>,
    pub apparent_va: Option<u32>,
    pub tariff_period: Option<String>,
    pub available_w: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Pins driven in the apply phase.
    pub applied: usize,
    /// Pins whose write could not be verified.
    pub apply_failures: usize,
    /// Rows whose state or error changed.
    pub changed: usize,
    /// Rows the store actually wrote.
    pub written: usize,
    /// Pin writes that failed on the bus itself.
    pub bus_faults: usize,
    /// The read-back sweep could not reach the expander.
    pub sweep_failed: bool,
}

impl SyncSummary {
    /// The expander answered every transaction.  A stuck relay or a bad
    /// pin number is a row problem, not a bus problem.
    pub fn hardware_ok(&self) -> bool {
        self.bus_faults == 0 && !self.sweep_failed
    }
}
