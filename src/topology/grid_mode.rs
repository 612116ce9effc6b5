use crate::ess::{EssUnit, GridMode};

/// Combines the per-unit grid modes into one system grid mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridModeAggregator;

impl GridModeAggregator {
    /// `OnGrid` only if every configured unit reports `OnGrid`. Otherwise
    /// `OffGrid` if any unit is islanded, else `Undefined`.
    pub fn aggregate(&self, units: &[EssUnit]) -> GridMode {
        if units.is_empty() {
            return GridMode::Undefined;
        }
        if units.iter().all(|u| u.grid_mode == GridMode::OnGrid) {
            GridMode::OnGrid
        } else if units.iter().any(|u| u.grid_mode == GridMode::OffGrid) {
            GridMode::OffGrid
        } else {
            GridMode::Undefined
        }
    }
}
