use std::fmt;

use super::EssUnit;

/// Default SoC (percent) at or below which a unit counts as `Low`.
pub const DEFAULT_LOW_SOC_THRESHOLD: u8 = 5;

/// Coarse battery condition of one ESS, derived fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Empty,
    Low,
    Normal,
    Full,
    Undefined,
}

impl BatteryState {
    /// Classifies a snapshot.
    ///
    /// A zero allowed charge power means the battery is full, a zero allowed
    /// discharge power means it is empty; otherwise the SoC is compared
    /// against `low_soc_threshold`.
    pub fn classify(unit: &EssUnit, low_soc_threshold: u8) -> Self {
        if unit.allowed_charge == Some(0) {
            BatteryState::Full
        } else if unit.allowed_discharge == Some(0) {
            BatteryState::Empty
        } else {
            match unit.soc {
                Some(soc) if soc <= low_soc_threshold => BatteryState::Low,
                Some(_) => BatteryState::Normal,
                None => BatteryState::Undefined,
            }
        }
    }

    /// Whether the unit can still carry a bus.
    pub fn can_supply(self) -> bool {
        !matches!(self, BatteryState::Empty | BatteryState::Low)
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryState::Empty => write!(f, "EMPTY"),
            BatteryState::Low => write!(f, "LOW"),
            BatteryState::Normal => write!(f, "NORMAL"),
            BatteryState::Full => write!(f, "FULL"),
            BatteryState::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ess::{EssId, GridMode};

    fn unit(soc: Option<u8>, charge: Option<i64>, discharge: Option<i64>) -> EssUnit {
        EssUnit {
            id: EssId::from("ess1"),
            soc,
            allowed_charge: charge,
            allowed_discharge: discharge,
            grid_mode: GridMode::OffGrid,
        }
    }

    #[test]
    fn zero_charge_power_is_full() {
        let u = unit(Some(3), Some(0), Some(0));
        assert_eq!(BatteryState::classify(&u, 5), BatteryState::Full);
    }

    #[test]
    fn zero_discharge_power_is_empty() {
        let u = unit(Some(50), Some(4000), Some(0));
        assert_eq!(BatteryState::classify(&u, 5), BatteryState::Empty);
    }

    #[test]
    fn soc_threshold_is_inclusive() {
        let u = unit(Some(5), Some(4000), Some(4000));
        assert_eq!(BatteryState::classify(&u, 5), BatteryState::Low);
        let u = unit(Some(6), Some(4000), Some(4000));
        assert_eq!(BatteryState::classify(&u, 5), BatteryState::Normal);
    }

    #[test]
    fn unknown_soc_is_undefined() {
        let u = unit(None, None, None);
        assert_eq!(BatteryState::classify(&u, 5), BatteryState::Undefined);
    }

    #[test]
    fn only_empty_and_low_cannot_supply() {
        assert!(!BatteryState::Empty.can_supply());
        assert!(!BatteryState::Low.can_supply());
        assert!(BatteryState::Normal.can_supply());
        assert!(BatteryState::Full.can_supply());
        assert!(BatteryState::Undefined.can_supply());
    }
}
