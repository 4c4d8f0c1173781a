//! Unified error types for the controller.
//!
//! One enum per failure domain, plus a crate-level [`Error`] that every
//! subsystem converts into so the binary's start-up path can use `?`
//! uniformly.  Routine protocol noise (bad checksum, partial line) never
//! becomes an error; the teleinfo parser degrades to "no data".

use core::fmt;

use crate::app::ports::ConfigError;
use crate::drivers::mcp23017::{PinLevel, PinState};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible controller operation funnels into this type.
///
/// Hardware and serial failures never reach it: the sync service folds
/// the former into per-row errors, and the listener retries the latter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The radiator store rejected a read or write.
    Store(StoreError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Failures talking to the MCP23017.
///
/// Every variant knows the best pin state it can vouch for; see
/// [`HardwareError::pin_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// The bus could not be opened; the driver stays disconnected.
    Unreachable(String),
    /// An I²C transaction failed.  `pin` is `None` for whole-port reads.
    Bus { pin: Option<u8>, detail: String },
    /// Pin number outside the expander's range.
    InvalidPin(u8),
    /// Read-back after a write disagreed with the requested level.
    WriteMismatch {
        pin: u8,
        requested: PinLevel,
        observed: PinLevel,
    },
}

impl HardwareError {
    /// Pin state carried by the error: the observed level for a write
    /// mismatch, `Undefined` for everything else.
    pub fn pin_state(&self) -> PinState {
        match self {
            Self::WriteMismatch { observed, .. } => PinState::from(*observed),
            _ => PinState::Undefined,
        }
    }

    /// Whether the bus itself misbehaved (as opposed to a bad argument or
    /// a relay that did not follow).
    pub fn is_bus_fault(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Bus { .. })
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(detail) => write!(f, "Unable to connect to MCP23017: {detail}"),
            Self::Bus {
                pin: Some(pin),
                detail,
            } => write!(f, "I2C communication error on pin {pin}: {detail}"),
            Self::Bus { pin: None, detail } => write!(f, "I2C communication error: {detail}"),
            Self::InvalidPin(pin) => write!(f, "Pin {pin} is not valid"),
            Self::WriteMismatch {
                pin,
                requested,
                observed,
            } => write!(
                f,
                "Pin {pin} state incorrect: requested {requested}, actual state {observed}"
            ),
        }
    }
}

impl std::error::Error for HardwareError {}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backing file could not be read or written.
    Io(String),
    /// Stored rows failed to deserialise.
    Corrupted(String),
    /// A uniqueness constraint (`name`, `control_pin`) was violated.
    Conflict(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Corrupted(msg) => write!(f, "corrupted rows: {msg}"),
            Self::Conflict(msg) => write!(f, "constraint violated: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Serial errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    /// Port could not be opened or configured.
    Open(String),
    /// A read failed after the port was open.
    Read(String),
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(msg) => write!(f, "cannot open serial port: {msg}"),
            Self::Read(msg) => write!(f, "serial read failed: {msg}"),
        }
    }
}

impl std::error::Error for SerialError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
