//! MCP23017 16-pin I/O expander driver.
//!
//! Every radiator's pilot wire hangs off one expander output.  The driver
//! speaks raw registers over any [`embedded_hal::i2c::I2c`] bus and adds
//! three behaviours on top:
//!
//! - **Lazy, self-healing connection.**  The bus is opened on first use via
//!   a [`BusOpener`].  If opening fails, or a transaction faults, the driver
//!   drops back to "disconnected" and the next call retries the open.
//! - **Write verification.**  [`PinDriver::set_pin`] re-reads the pin after
//!   writing the latch and fails with the *observed* level when the two
//!   disagree (stuck relay, bus glitch).
//! - **Simulation.**  In [`DriverMode::Simulated`] every call is a cheap
//!   deterministic no-op: writes succeed, reads return `Low`.
//!
//! ## Concurrency contract
//!
//! One driver instance per process, wrapped in [`SharedPinDriver`].  Each
//! bus operation is a full read/verify round trip and must not interleave
//! with another thread's.

use std::sync::{Mutex, PoisonError};

use embedded_hal::i2c::{Error as _, ErrorKind, ErrorType, I2c, Operation};
use log::{debug, info, warn};

use crate::error::HardwareError;
use crate::pins::{self, reg, PIN_COUNT};

// ───────────────────────────────────────────────────────────────
// Pin levels and observed states
// ───────────────────────────────────────────────────────────────

/// Electrical level of one expander output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub const fn from_bit(set: bool) -> Self {
        if set { Self::High } else { Self::Low }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

impl core::fmt::Display for PinLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// What a read could vouch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinState {
    Low,
    High,
    Undefined,
}

impl From<PinLevel> for PinState {
    fn from(level: PinLevel) -> Self {
        match level {
            PinLevel::Low => Self::Low,
            PinLevel::High => Self::High,
        }
    }
}

/// Result of reading one pin during a full sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinObservation {
    pub state: PinState,
    pub error: Option<String>,
}

impl PinObservation {
    pub const fn level(level: PinLevel) -> Self {
        Self {
            state: match level {
                PinLevel::Low => PinState::Low,
                PinLevel::High => PinState::High,
            },
            error: None,
        }
    }

    pub fn failed(err: &HardwareError) -> Self {
        Self {
            state: err.pin_state(),
            error: Some(err.to_string()),
        }
    }
}

/// All sixteen pins from one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinObservations {
    pins: [PinObservation; PIN_COUNT as usize],
}

impl PinObservations {
    fn uniform(obs: &PinObservation) -> Self {
        Self {
            pins: core::array::from_fn(|_| obs.clone()),
        }
    }

    fn from_ports(bits: u16) -> Self {
        Self {
            pins: core::array::from_fn(|pin| {
                PinObservation::level(PinLevel::from_bit(bits & (1 << pin) != 0))
            }),
        }
    }

    /// Observation for `pin`; an out-of-range pin reads as `Undefined`.
    pub fn get(&self, pin: u8) -> PinObservation {
        match self.pins.get(pin as usize) {
            Some(obs) => obs.clone(),
            None => PinObservation::failed(&HardwareError::InvalidPin(pin)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &PinObservation)> {
        self.pins.iter().enumerate().map(|(pin, obs)| (pin as u8, obs))
    }
}

/// Outcome of one verified write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinWrite {
    pub pin: u8,
    pub requested: PinLevel,
    /// True when the read-back matched `requested`.
    pub applied: bool,
    pub observed: PinState,
    pub error: Option<HardwareError>,
}

// ───────────────────────────────────────────────────────────────
// Bus opening
// ───────────────────────────────────────────────────────────────

/// Opens the I²C bus the expander sits on.  Called lazily, and again
/// after every bus fault.
pub trait BusOpener {
    type Bus: I2c;

    fn open(&mut self) -> Result<Self::Bus, HardwareError>;
}

/// Opener for builds without a hardware backend.  Never connects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBus;

/// Uninhabited bus type produced by [`NoBus`].
#[derive(Debug)]
pub enum Detached {}

impl ErrorType for Detached {
    type Error = ErrorKind;
}

impl I2c for Detached {
    fn transaction(
        &mut self,
        _address: u8,
        _operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match *self {}
    }
}

impl BusOpener for NoBus {
    type Bus = Detached;

    fn open(&mut self) -> Result<Detached, HardwareError> {
        Err(HardwareError::Unreachable(
            "no I2C backend in this build".into(),
        ))
    }
}

// ───────────────────────────────────────────────────────────────
// Register access
// ───────────────────────────────────────────────────────────────

struct Expander<B> {
    bus: B,
    address: u8,
}

impl<B: I2c> Expander<B> {
    fn read_reg(&mut self, register: u8) -> Result<u8, B::Error> {
        let mut buf = [0u8; 1];
        self.bus.write_read(self.address, &[register], &mut buf)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, register: u8, value: u8) -> Result<(), B::Error> {
        self.bus.write(self.address, &[register, value])
    }

    fn update_bit(&mut self, register: u8, mask: u8, set: bool) -> Result<(), B::Error> {
        let current = self.read_reg(register)?;
        let next = if set { current | mask } else { current & !mask };
        if next != current {
            self.write_reg(register, next)?;
        }
        Ok(())
    }

    /// Latch the level first, then flip the pin to output, so the pin
    /// never drives a stale latch value.
    fn drive(&mut self, pin: u8, level: PinLevel) -> Result<(), B::Error> {
        let (olat, mask) = pins::locate(reg::OLATA, pin);
        self.update_bit(olat, mask, level.is_high())?;
        let (iodir, mask) = pins::locate(reg::IODIRA, pin);
        self.update_bit(iodir, mask, false)
    }

    fn read_level(&mut self, pin: u8) -> Result<PinLevel, B::Error> {
        let (gpio, mask) = pins::locate(reg::GPIOA, pin);
        Ok(PinLevel::from_bit(self.read_reg(gpio)? & mask != 0))
    }

    /// Both port registers in one sequential read (GPIOA then GPIOB).
    fn read_ports(&mut self) -> Result<u16, B::Error> {
        let mut buf = [0u8; 2];
        self.bus.write_read(self.address, &[reg::GPIOA], &mut buf)?;
        Ok(u16::from(buf[0]) | (u16::from(buf[1]) << 8))
    }
}

fn bus_fault(pin: Option<u8>, e: &impl embedded_hal::i2c::Error) -> HardwareError {
    HardwareError::Bus {
        pin,
        detail: format!("{:?}", e.kind()),
    }
}

// ───────────────────────────────────────────────────────────────
// PinDriver
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    Hardware,
    /// No bus access at all; see module docs.
    Simulated,
}

pub struct PinDriver<O: BusOpener> {
    opener: O,
    address: u8,
    mode: DriverMode,
    expander: Option<Expander<O::Bus>>,
}

impl<O: BusOpener> PinDriver<O> {
    /// Hardware driver.  Nothing touches the bus until the first call.
    pub fn new(opener: O, address: u8) -> Self {
        Self {
            opener,
            address,
            mode: DriverMode::Hardware,
            expander: None,
        }
    }

    pub fn simulated(opener: O) -> Self {
        info!("MCP23017: simulation mode, no bus access");
        Self {
            opener,
            address: pins::MCP23017_DEFAULT_ADDRESS,
            mode: DriverMode::Simulated,
            expander: None,
        }
    }

    pub fn mode(&self) -> DriverMode {
        self.mode
    }

    pub fn is_connected(&self) -> bool {
        self.expander.is_some()
    }

    /// Drive `pin` to `level` and verify by reading it back.
    pub fn set_pin(&mut self, pin: u8, level: PinLevel) -> Result<(), HardwareError> {
        if self.mode == DriverMode::Simulated {
            debug!("MCP23017(sim): set_pin({pin}, {level})");
            return Ok(());
        }
        check_pin(pin)?;

        let result = self
            .expander()?
            .drive(pin, level)
            .map_err(|e| bus_fault(Some(pin), &e));
        self.settle(result)?;

        let observed = self.get_pin(pin)?;
        if observed != level {
            return Err(HardwareError::WriteMismatch {
                pin,
                requested: level,
                observed,
            });
        }
        debug!("MCP23017: pin {pin} set to {level}");
        Ok(())
    }

    /// Current level of `pin`.
    pub fn get_pin(&mut self, pin: u8) -> Result<PinLevel, HardwareError> {
        if self.mode == DriverMode::Simulated {
            debug!("MCP23017(sim): get_pin({pin}) -> LOW");
            return Ok(PinLevel::Low);
        }
        check_pin(pin)?;

        let result = self
            .expander()?
            .read_level(pin)
            .map_err(|e| bus_fault(Some(pin), &e));
        self.settle(result)
    }

    /// Read every pin in one pass.  Never fails: errors become
    /// `Undefined` observations carrying the error text.
    pub fn get_all_pin_states(&mut self) -> PinObservations {
        if self.mode == DriverMode::Simulated {
            return PinObservations::uniform(&PinObservation::level(PinLevel::Low));
        }

        let result = self
            .expander()
            .and_then(|exp| exp.read_ports().map_err(|e| bus_fault(None, &e)));
        match self.settle(result) {
            Ok(bits) => PinObservations::from_ports(bits),
            Err(e) => {
                warn!("MCP23017: pin sweep failed: {e}");
                PinObservations::uniform(&PinObservation::failed(&e))
            }
        }
    }

    /// [`set_pin`](Self::set_pin) folded into a single outcome value.
    pub fn write_verified(&mut self, pin: u8, level: PinLevel) -> PinWrite {
        match self.set_pin(pin, level) {
            Ok(()) => PinWrite {
                pin,
                requested: level,
                applied: true,
                observed: level.into(),
                error: None,
            },
            Err(e) => PinWrite {
                pin,
                requested: level,
                applied: false,
                observed: e.pin_state(),
                error: Some(e),
            },
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn expander(&mut self) -> Result<&mut Expander<O::Bus>, HardwareError> {
        if self.expander.is_none() {
            match self.opener.open() {
                Ok(bus) => {
                    info!("MCP23017: connected at 0x{:02x}", self.address);
                    self.expander = Some(Expander {
                        bus,
                        address: self.address,
                    });
                }
                Err(e) => {
                    warn!("MCP23017: connection failed: {e}");
                    return Err(e);
                }
            }
        }
        self.expander
            .as_mut()
            .ok_or_else(|| HardwareError::Unreachable("expander not connected".into()))
    }

    /// Drop the connection after a bus fault so the next call reopens it.
    fn settle<T>(&mut self, result: Result<T, HardwareError>) -> Result<T, HardwareError> {
        if let Err(e) = &result {
            if e.is_bus_fault() && self.expander.take().is_some() {
                warn!("MCP23017: dropping connection after bus fault");
            }
        }
        result
    }
}

fn check_pin(pin: u8) -> Result<(), HardwareError> {
    if pin < PIN_COUNT {
        Ok(())
    } else {
        Err(HardwareError::InvalidPin(pin))
    }
}

// ───────────────────────────────────────────────────────────────
// Shared handle
// ───────────────────────────────────────────────────────────────

/// The process-wide driver.  Every access holds the lock for the whole
/// operation, so bus round trips never interleave.
pub struct SharedPinDriver<O: BusOpener> {
    inner: Mutex<PinDriver<O>>,
}

impl<O: BusOpener> SharedPinDriver<O> {
    pub fn new(driver: PinDriver<O>) -> Self {
        Self {
            inner: Mutex::new(driver),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut PinDriver<O>) -> R) -> R {
        // A panic mid-operation leaves register state unknown either way;
        // the next sweep re-reads it.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
