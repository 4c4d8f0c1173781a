//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (radiator table, meter line, intent feed, event sinks,
//! config file) implement these traits.  The
//! [`Controller`](super::service::Controller) consumes them via generics,
//! so the domain core never touches files or serial ports directly.
//!
//! All port errors are typed; callers must handle every variant explicitly.

use chrono::{DateTime, Utc};

use crate::config::ControllerConfig;
use crate::error::{SerialError, StoreError};
use crate::radiator::{ActualState, HeatingIntent, Radiator, RadiatorId, RequestedState};
use crate::scheduler::Job;

// ───────────────────────────────────────────────────────────────
// Radiator store port (driven adapter: domain ↔ persisted rows)
// ───────────────────────────────────────────────────────────────

/// One row's fresh hardware observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedUpdate {
    pub id: RadiatorId,
    pub actual_state: ActualState,
    pub error: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Persisted radiator rows.
///
/// Shared by the listener thread and the periodic cycle, hence `&self`
/// methods and `Send + Sync`.
pub trait RadiatorStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<Radiator>, StoreError>;

    /// Set `requested_state` (and stamp `last_requested`) on every id.
    /// Unknown ids and rows already in `state` are skipped, so
    /// `last_requested` marks the last change of intention.  Returns rows
    /// written.
    fn set_requested_state(
        &self,
        ids: &[RadiatorId],
        state: RequestedState,
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Write `actual_state`/`error` for every update in one batch.
    /// Rows that vanished are not counted.  Returns rows written.
    fn apply_observations(&self, updates: &[ObservedUpdate]) -> Result<usize, StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Telemetry source port (driven adapter: meter → domain)
// ───────────────────────────────────────────────────────────────

/// Raw teleinfo lines, one field per line.
pub trait TelemetrySource: Send {
    /// Block up to the read timeout.  `Ok(None)` means no line yet.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError>;
}

// ───────────────────────────────────────────────────────────────
// Intent source port (driven adapter: heating schedule → domain)
// ───────────────────────────────────────────────────────────────

/// Current room-level heating wishes.
pub trait IntentSource {
    fn current_intents(&self) -> Result<Vec<HeatingIntent>, StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Liveness port (driven adapter: domain → supervisor)
// ───────────────────────────────────────────────────────────────

/// External supervisor that restarts the process when pings stop.
pub trait Liveness: Send + Sync {
    fn ping(&self);
}

/// Liveness sink for tests and unsupervised runs.
impl Liveness for () {
    fn ping(&self) {}
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges should be rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ControllerConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<ControllerConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the controller)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a job is due.
///
/// The periodic cycle implements this by running the job against the
/// [`Controller`](super::service::Controller); the
/// [`Scheduler`](crate::scheduler::Scheduler) itself knows nothing
/// about radiators.
pub trait SchedulerDelegate {
    fn on_job_due(&mut self, job: Job);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first start).
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
