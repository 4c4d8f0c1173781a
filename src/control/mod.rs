//! Power arbitration: who must turn off, who may turn on.
//!
//! Both directions are pure functions over plain records; the
//! [`Controller`](crate::app::service::Controller) applies their results
//! to the store.

pub mod admission;
pub mod shedding;
