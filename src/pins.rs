//! I/O expander and bus assignments for the radiator control board.
//!
//! Single source of truth: the pin driver and the reconciliation service
//! reference this module rather than hard-coding addresses or pin counts.
//!
//! Each radiator's pilot wire is switched by one MCP23017 output.  Pins
//! 0–7 live on port A (`GPA0`–`GPA7`), pins 8–15 on port B.

// ---------------------------------------------------------------------------
// MCP23017 I/O expander
// ---------------------------------------------------------------------------

/// Number of addressable output pins on the expander.
pub const PIN_COUNT: u8 = 16;
/// Pins per 8-bit port.
pub const PINS_PER_PORT: u8 = 8;

/// Default 7-bit I²C address (A0–A2 tied low).
pub const MCP23017_DEFAULT_ADDRESS: u8 = 0x20;

/// Register map with `IOCON.BANK = 0` (power-on default, A/B interleaved).
pub mod reg {
    /// Direction register, port A (1 = input, 0 = output).
    pub const IODIRA: u8 = 0x00;
    /// Direction register, port B.
    pub const IODIRB: u8 = 0x01;
    /// Port register, port A (reads reflect the pin level).
    pub const GPIOA: u8 = 0x12;
    /// Port register, port B.
    pub const GPIOB: u8 = 0x13;
    /// Output latch, port A.
    pub const OLATA: u8 = 0x14;
    /// Output latch, port B.
    pub const OLATB: u8 = 0x15;
}

/// Register address and bit mask for `pin` within a per-port register pair.
///
/// `port_a_reg` is the port-A register; its port-B twin is always at
/// `port_a_reg + 1` in BANK 0 mode.  Caller guarantees `pin < PIN_COUNT`.
pub const fn locate(port_a_reg: u8, pin: u8) -> (u8, u8) {
    if pin < PINS_PER_PORT {
        (port_a_reg, 1 << pin)
    } else {
        (port_a_reg + 1, 1 << (pin - PINS_PER_PORT))
    }
}

// ---------------------------------------------------------------------------
// Raspberry Pi buses
// ---------------------------------------------------------------------------

/// I²C bus carrying the expander (`/dev/i2c-1` on the 40-pin header).
pub const DEFAULT_I2C_BUS: u8 = 1;

/// Primary UART wired to the meter's teleinfo output.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyS0";
