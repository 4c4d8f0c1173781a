//! The one place that knows the pilot-wire wiring is inverted.
//!
//! ```text
//!   RequestedState        pin level        ActualState
//!   ON          ──▶  LOW   ──▶  ON
//!   OFF         ──▶  HIGH  ──▶  OFF   (frost protection)
//!   LOAD_SHED   ──▶  HIGH  ──▶  OFF
//!                    ???   ──▶  UNDEFINED
//! ```
//!
//! Nothing else in the crate may translate between radiator states and
//! pin levels.

use crate::drivers::mcp23017::{PinLevel, PinState};
use crate::radiator::{ActualState, RequestedState};

/// Pin level that realises `requested`.
pub const fn pin_level_for(requested: RequestedState) -> PinLevel {
    match requested {
        RequestedState::On => PinLevel::Low,
        RequestedState::Off | RequestedState::LoadShed => PinLevel::High,
    }
}

/// Radiator state implied by an observed pin.
pub const fn state_for(observed: PinState) -> ActualState {
    match observed {
        PinState::Low => ActualState::On,
        PinState::High => ActualState::Off,
        PinState::Undefined => ActualState::Undefined,
    }
}
