//! Hardware drivers: the MCP23017 pin driver and the systemd watchdog.

pub mod mcp23017;
pub mod watchdog;
