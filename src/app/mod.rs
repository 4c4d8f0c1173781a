//! Application core: orchestration over ports.
//!
//! This module ties the domain rules (budget, shedding, admission,
//! reconciliation) to the outside world.  All interaction with files,
//! the meter line and supervisors happens through **port traits**
//! defined in [`ports`], keeping this layer testable without hardware.

pub mod events;
pub mod listener;
pub mod ports;
pub mod service;
pub mod sync;
