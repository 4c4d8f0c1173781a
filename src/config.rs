//! Controller configuration parameters
//!
//! All tunable parameters for the radiator controller.
//! Loaded from a JSON file, then overridden by environment and CLI flags.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins::{DEFAULT_I2C_BUS, DEFAULT_SERIAL_PORT, MCP23017_DEFAULT_ADDRESS};
use crate::power::{DEFAULT_NOMINAL_VOLTAGE, DEFAULT_SAFETY_MARGIN_W};

/// UART parity for the teleinfo line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    None,
    Even,
}

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // --- Teleinfo serial line ---
    /// UART device wired to the meter
    pub serial_port: String,
    pub serial_baud: u32,
    pub serial_parity: SerialParity,
    pub serial_data_bits: u8,
    pub serial_stop_bits: u8,
    /// Per-read timeout (milliseconds)
    pub serial_timeout_ms: u32,

    // --- I/O expander ---
    pub i2c_bus: u8,
    /// 7-bit MCP23017 address (0x20–0x27)
    pub mcp23017_address: u8,
    /// Run without hardware: simulated meter, no-op pin driver
    pub unplugged: bool,

    // --- Power budget ---
    /// Reserve kept free before admitting a radiator (W)
    pub safety_margin_w: u32,
    /// Mains voltage for amps → watts (V)
    pub nominal_voltage: u32,
    /// Telemetry older than this is unknown (seconds)
    pub telemetry_freshness_secs: u32,
    /// Run admission on every Nth completed frame
    pub admission_every_n_frames: u32,

    // --- Periodic cycle ---
    /// Cycle tick (milliseconds)
    pub cycle_tick_ms: u32,
    /// Heating-intent intake interval (seconds)
    pub intake_interval_secs: u32,
    /// Database/hardware reconciliation interval (seconds)
    pub reconcile_interval_secs: u32,

    // --- Supervision ---
    /// Send systemd READY/WATCHDOG notifications
    pub watchdog_enabled: bool,

    // --- Storage ---
    /// Radiator table (JSON)
    pub radiator_store_path: String,
    /// Heating intents published by the schedule (JSON)
    pub intents_path: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Teleinfo (historic mode)
            serial_port: DEFAULT_SERIAL_PORT.into(),
            serial_baud: 1200,
            serial_parity: SerialParity::None,
            serial_data_bits: 7,
            serial_stop_bits: 1,
            serial_timeout_ms: 1000,

            // Expander
            i2c_bus: DEFAULT_I2C_BUS,
            mcp23017_address: MCP23017_DEFAULT_ADDRESS,
            unplugged: false,

            // Budget
            safety_margin_w: DEFAULT_SAFETY_MARGIN_W,
            nominal_voltage: DEFAULT_NOMINAL_VOLTAGE,
            telemetry_freshness_secs: 5,
            admission_every_n_frames: 2,

            // Cycle
            cycle_tick_ms: 1000,       // 1 Hz
            intake_interval_secs: 60,  // 1/min
            reconcile_interval_secs: 60,

            watchdog_enabled: true,

            radiator_store_path: "/var/lib/heatctl/radiators.json".into(),
            intents_path: "/var/lib/heatctl/intents.json".into(),
        }
    }
}

impl ControllerConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial_port.is_empty() {
            return Err(ConfigError::ValidationFailed("serial_port is empty"));
        }
        if !(300..=115_200).contains(&self.serial_baud) {
            return Err(ConfigError::ValidationFailed("serial_baud out of range"));
        }
        if !(5..=8).contains(&self.serial_data_bits) {
            return Err(ConfigError::ValidationFailed("serial_data_bits must be 5-8"));
        }
        if !(1..=2).contains(&self.serial_stop_bits) {
            return Err(ConfigError::ValidationFailed("serial_stop_bits must be 1 or 2"));
        }
        if self.serial_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("serial_timeout_ms must be > 0"));
        }
        if !(0x20..=0x27).contains(&self.mcp23017_address) {
            return Err(ConfigError::ValidationFailed(
                "mcp23017_address must be 0x20-0x27",
            ));
        }
        if !(100..=400).contains(&self.nominal_voltage) {
            return Err(ConfigError::ValidationFailed("nominal_voltage out of range"));
        }
        if self.telemetry_freshness_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "telemetry_freshness_secs must be > 0",
            ));
        }
        if self.admission_every_n_frames == 0 {
            return Err(ConfigError::ValidationFailed(
                "admission_every_n_frames must be > 0",
            ));
        }
        if self.cycle_tick_ms == 0 {
            return Err(ConfigError::ValidationFailed("cycle_tick_ms must be > 0"));
        }
        let tick_secs = self.cycle_tick_ms.div_ceil(1000);
        if self.intake_interval_secs < tick_secs || self.reconcile_interval_secs < tick_secs {
            return Err(ConfigError::ValidationFailed(
                "job intervals must be at least one cycle tick",
            ));
        }
        if self.radiator_store_path.is_empty() {
            return Err(ConfigError::ValidationFailed("radiator_store_path is empty"));
        }
        Ok(())
    }
}
