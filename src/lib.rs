//! Supply bus switching for multi-ESS island sites.
//!
//! Each cycle the [`control::BusSwitchController`] ranks up to four energy
//! storage systems by state of charge, connects the two fullest to the two
//! supply buses through the contactor outputs, and raises the bus
//! indication and load-enable outputs once the buses are energized.

pub mod balancing;
pub mod config;
pub mod control;
pub mod error;
pub mod ess;
pub mod io;
pub mod points;
/// Site simulator, cycle records and run summary.
pub mod sim;
pub mod topology;

#[cfg(test)]
mod test_utils;

pub use error::{ControllerError, ControllerResult};
