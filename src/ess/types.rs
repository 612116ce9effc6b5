//! ESS identifiers, grid mode, and the per-cycle snapshot of one unit.

use std::fmt;

use tracing::warn;

use crate::points::{PointAddress, PointRegistry};

/// Channel holding the state of charge in percent.
pub const SOC_CHANNEL: &str = "Soc";
/// Channel holding the grid mode reported by the inverter.
pub const GRID_MODE_CHANNEL: &str = "GridMode";
/// Channel holding the currently allowed charge power (W).
pub const ALLOWED_CHARGE_CHANNEL: &str = "AllowedChargePower";
/// Channel holding the currently allowed discharge power (W).
pub const ALLOWED_DISCHARGE_CHANNEL: &str = "AllowedDischargePower";

/// Stable key of an ESS unit, e.g. `ess1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EssId(String);

impl EssId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of one of this unit's channels.
    pub(crate) fn channel(&self, channel: &str) -> Option<PointAddress> {
        PointAddress::new(&self.0, channel).ok()
    }
}

impl From<&str> for EssId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EssId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for EssId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a unit (or the whole system) is synchronized to the utility grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    OnGrid,
    OffGrid,
    Undefined,
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridMode::OnGrid => write!(f, "ON_GRID"),
            GridMode::OffGrid => write!(f, "OFF_GRID"),
            GridMode::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

/// Read-only snapshot of one ESS, taken fresh every cycle.
///
/// Each field degrades on its own: an unreadable SoC is `None`, an unreadable
/// grid mode is `Undefined`, and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct EssUnit {
    pub id: EssId,
    /// State of charge in percent (0..=100).
    pub soc: Option<u8>,
    /// Allowed charge power (W).
    pub allowed_charge: Option<i64>,
    /// Allowed discharge power (W).
    pub allowed_discharge: Option<i64>,
    pub grid_mode: GridMode,
}

impl EssUnit {
    /// Creates a snapshot with every value unknown.
    pub fn unknown(id: EssId) -> Self {
        Self {
            id,
            soc: None,
            allowed_charge: None,
            allowed_discharge: None,
            grid_mode: GridMode::Undefined,
        }
    }

    /// Reads the snapshot of `id` from the registry.
    pub fn read<R: PointRegistry + ?Sized>(registry: &R, id: &EssId) -> Self {
        let soc = read_optional_int(registry, id, SOC_CHANNEL).and_then(|raw| {
            match u8::try_from(raw) {
                Ok(soc) if soc <= 100 => Some(soc),
                _ => {
                    warn!(ess = %id, soc = raw, "ignoring out-of-range SoC");
                    None
                }
            }
        });
        let grid_mode = match id.channel(GRID_MODE_CHANNEL) {
            Some(address) => registry.read_grid_mode(&address).unwrap_or_else(|err| {
                warn!(ess = %id, "unable to read grid mode: {err}");
                GridMode::Undefined
            }),
            None => GridMode::Undefined,
        };

        Self {
            id: id.clone(),
            soc,
            allowed_charge: read_optional_int(registry, id, ALLOWED_CHARGE_CHANNEL),
            allowed_discharge: read_optional_int(registry, id, ALLOWED_DISCHARGE_CHANNEL),
            grid_mode,
        }
    }
}

fn read_optional_int<R: PointRegistry + ?Sized>(
    registry: &R,
    id: &EssId,
    channel: &str,
) -> Option<i64> {
    let address = id.channel(channel)?;
    match registry.read_int(&address) {
        Ok(value) => value,
        Err(err) => {
            warn!(ess = %id, channel, "unable to read value: {err}");
            None
        }
    }
}
