//! Linux I²C bus opener (Raspberry Pi).
//!
//! `rppal`'s `hal` feature gives its `I2c` an `embedded_hal::i2c::I2c`
//! impl, so the expander driver talks to it like any other bus.

use log::info;
use rppal::i2c::I2c;

use crate::drivers::mcp23017::BusOpener;
use crate::error::HardwareError;

/// Opens `/dev/i2c-{bus}`.  The driver calls it again after a bus fault.
#[derive(Debug, Clone, Copy)]
pub struct RppalBus {
    bus: u8,
}

impl RppalBus {
    pub fn new(bus: u8) -> Self {
        Self { bus }
    }
}

impl BusOpener for RppalBus {
    type Bus = I2c;

    fn open(&mut self) -> Result<I2c, HardwareError> {
        let i2c = I2c::with_bus(self.bus)
            .map_err(|e| HardwareError::Unreachable(format!("/dev/i2c-{}: {e}", self.bus)))?;
        info!("I2C: opened bus {} at {} Hz", self.bus, i2c.clock_speed().unwrap_or(0));
        Ok(i2c)
    }
}
