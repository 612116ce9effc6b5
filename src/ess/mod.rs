//! Per-cycle view of the energy-storage units.

/// Battery-state classification derived from limits and SoC.
pub mod battery;
pub mod types;

pub use battery::BatteryState;
pub use types::{EssId, EssUnit, GridMode};
