//! Radiator records and their state vocabulary.
//!
//! A radiator carries two independent states:
//!
//! - [`RequestedState`]: what the system *wants* (written by load shedding,
//!   admission and the heating-schedule collaborator).
//! - [`ActualState`]: what the hardware *was last seen doing*.  Only the
//!   reconciliation service's observe phase writes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable radiator identity (primary key of the persisted row).
pub type RadiatorId = u32;

/// Heating importance.  Higher ordinal sheds first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Importance {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Importance {
    /// Ordinal rank (0 = CRITICAL … 3 = LOW).
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// True for importances kept on when telemetry is lost.
    pub const fn survives_blind_shedding(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl core::fmt::Display for Importance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Critical => write!(f, "CRITICAL"),
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// System intention for a radiator.
///
/// `Off` and `LoadShed` drive the same pin level; `LoadShed` marks an
/// involuntary cut so the rest of the system can tell it apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedState {
    Off,
    On,
    LoadShed,
}

impl core::fmt::Display for RequestedState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Off => write!(f, "OFF"),
            Self::On => write!(f, "ON"),
            Self::LoadShed => write!(f, "LOAD_SHED"),
        }
    }
}

/// Last known hardware state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActualState {
    Off,
    On,
    Undefined,
}

impl core::fmt::Display for ActualState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Off => write!(f, "OFF"),
            Self::On => write!(f, "ON"),
            Self::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

/// A controllable heater as persisted by the radiator store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Radiator {
    pub id: RadiatorId,
    /// Unique display name.
    pub name: String,
    /// Rated electrical power in watts.
    pub power: u32,
    /// Expander pin (0–15), unique per radiator.
    pub control_pin: u8,
    pub importance: Importance,
    #[serde(default = "default_requested")]
    pub requested_state: RequestedState,
    #[serde(default = "default_actual")]
    pub actual_state: ActualState,
    /// When `requested_state` last changed.  Traceability only.
    #[serde(default = "Utc::now")]
    pub last_requested: DateTime<Utc>,
    /// When the observe phase last wrote `actual_state`/`error`.
    #[serde(default)]
    pub last_observed: Option<DateTime<Utc>>,
    /// Diagnostic from the last hardware interaction.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_requested() -> RequestedState {
    RequestedState::Off
}

fn default_actual() -> ActualState {
    ActualState::Undefined
}

impl Radiator {
    /// A freshly registered radiator: requested OFF, hardware state unknown.
    pub fn new(
        id: RadiatorId,
        name: impl Into<String>,
        power: u32,
        control_pin: u8,
        importance: Importance,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            power,
            control_pin,
            importance,
            requested_state: RequestedState::Off,
            actual_state: ActualState::Undefined,
            last_requested: Utc::now(),
            last_observed: None,
            error: None,
        }
    }

    /// Whether this radiator may be picked by the shedding engine.
    pub fn is_shedding_candidate(&self) -> bool {
        self.actual_state == ActualState::On && self.power > 0
    }
}

/// A radiator that wants heat but was denied power on the last pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredActivationEntry {
    pub radiator_id: RadiatorId,
    pub power: u32,
    pub importance: Importance,
}

impl From<&Radiator> for DeferredActivationEntry {
    fn from(r: &Radiator) -> Self {
        Self {
            radiator_id: r.id,
            power: r.power,
            importance: r.importance,
        }
    }
}

/// Room-level heating wish for one radiator, as published by the
/// heating schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatingIntent {
    pub radiator_id: RadiatorId,
    pub wants_heat: bool,
}

impl HeatingIntent {
    /// The requested state this intent asks for.
    pub const fn target(self) -> RequestedState {
        if self.wants_heat { RequestedState::On } else { RequestedState::Off }
    }
}
