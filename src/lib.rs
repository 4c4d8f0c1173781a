//! heatctl library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  Raspberry Pi specific code is guarded by the `rpi`
//! feature within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod mapper;
pub mod pins;
pub mod power;
pub mod radiator;
pub mod scheduler;
pub mod shared;
pub mod teleinfo;
