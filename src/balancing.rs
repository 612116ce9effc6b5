//! Active-power balancing of one ESS against the grid meter.
//!
//! The ESS is driven towards zero grid exchange with a deviation feedback
//! term that grows in 100 W steps while the meter keeps importing and the
//! two power readings move together. The unit never charges: there is no
//! AC generator to charge from.

use tracing::{error, info, warn};

use crate::error::{ControllerError, ControllerResult};
use crate::ess::EssId;
use crate::ess::types::{ALLOWED_DISCHARGE_CHANNEL, SOC_CHANNEL};
use crate::points::{PointAddress, PointRegistry};
use crate::control::Controller;

pub const ACTIVE_POWER_CHANNEL: &str = "ActivePower";
pub const SET_ACTIVE_POWER_CHANNEL: &str = "SetActivePower";
pub const DEFAULT_MIN_SOC: u8 = 10;

/// Setpoint granularity of the inverter in watts.
const STEP_W: i64 = 100;
/// Largest disagreement between meter and ESS power changes that still
/// counts as "moving together".
const TRACKING_TOLERANCE_W: i64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancingSettings {
    pub id: String,
    pub ess: EssId,
    /// Grid meter component; its `ActivePower` is positive on import.
    pub meter: String,
    pub min_soc: u8,
}

/// Values read at the start of a balancing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancingInput {
    pub soc: i64,
    pub ess_power: i64,
    pub meter_power: i64,
    pub allowed_discharge: i64,
}

#[derive(Debug, Clone)]
pub struct BalancingController {
    id: String,
    ess: EssId,
    min_soc: u8,
    soc: PointAddress,
    ess_power: PointAddress,
    allowed_discharge: PointAddress,
    set_active_power: PointAddress,
    meter_power: PointAddress,
    last_ess_power: i64,
    last_meter_power: i64,
    last_deviation_delta: i64,
}

impl BalancingController {
    /// # Errors
    ///
    /// `Configuration` if the ESS or meter component is unknown to the
    /// registry or does not form valid point addresses.
    pub fn new<R: PointRegistry + ?Sized>(
        settings: BalancingSettings,
        registry: &R,
    ) -> ControllerResult<Self> {
        for component in [settings.ess.as_str(), settings.meter.as_str()] {
            if !registry.has_component(component) {
                return Err(ControllerError::configuration(format!(
                    "component \"{component}\" not found"
                )));
            }
        }
        let point = |component: &str, channel: &str| {
            PointAddress::new(component, channel).map_err(|err| {
                ControllerError::configuration(format!("balancing point: {err}"))
            })
        };
        let ess = settings.ess.as_str();
        Ok(Self {
            soc: point(ess, SOC_CHANNEL)?,
            ess_power: point(ess, ACTIVE_POWER_CHANNEL)?,
            allowed_discharge: point(ess, ALLOWED_DISCHARGE_CHANNEL)?,
            set_active_power: point(ess, SET_ACTIVE_POWER_CHANNEL)?,
            meter_power: point(&settings.meter, ACTIVE_POWER_CHANNEL)?,
            id: settings.id,
            ess: settings.ess,
            min_soc: settings.min_soc,
            last_ess_power: 0,
            last_meter_power: 0,
            last_deviation_delta: 0,
        })
    }

    pub fn ess(&self) -> &EssId {
        &self.ess
    }

    /// Computes the next setpoint and updates the feedback memory.
    pub fn next_setpoint(&mut self, input: BalancingInput) -> i64 {
        let setpoint = if input.soc < i64::from(self.min_soc) {
            0
        } else {
            let meter_change = self.last_meter_power - input.meter_power;
            let ess_change = self.last_ess_power - input.ess_power;
            let delta = if input.meter_power < 0 {
                self.last_deviation_delta - STEP_W
            } else if input.meter_power < STEP_W {
                self.last_deviation_delta
            } else if (meter_change - ess_change).abs() <= TRACKING_TOLERANCE_W {
                self.last_deviation_delta + STEP_W
            } else {
                0
            };
            self.last_deviation_delta = delta;

            let raw = (input.ess_power + input.meter_power + delta) / STEP_W * STEP_W;
            if raw > 0 {
                raw.min(input.allowed_discharge)
            } else {
                0
            }
        };
        self.last_ess_power = input.ess_power;
        self.last_meter_power = input.meter_power;
        setpoint
    }

    /// Reads the inputs, computes and writes a setpoint.
    ///
    /// Returns `None` when an input was unreadable; the cycle is skipped
    /// without a write. A failed setpoint write is logged.
    pub fn run_cycle<R: PointRegistry + ?Sized>(
        &mut self,
        registry: &mut R,
    ) -> ControllerResult<Option<i64>> {
        let Some(input) = self.read_input(registry) else {
            return Ok(None);
        };
        let setpoint = self.next_setpoint(input);
        match registry.write_int(&self.set_active_power, setpoint) {
            Ok(()) => info!(
                ess = %self.ess,
                soc = input.soc,
                ess_power = input.ess_power,
                meter_power = input.meter_power,
                setpoint,
                "balancing setpoint"
            ),
            Err(err) => error!("unable to set output [{}]: {err}", self.set_active_power),
        }
        Ok(Some(setpoint))
    }

    fn read_input<R: PointRegistry + ?Sized>(&self, registry: &R) -> Option<BalancingInput> {
        let read = |address: &PointAddress| match registry.read_int(address) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                warn!("[{address}] has no value, skipping balancing cycle");
                None
            }
            Err(err) => {
                warn!("{err}, skipping balancing cycle");
                None
            }
        };
        Some(BalancingInput {
            soc: read(&self.soc)?,
            ess_power: read(&self.ess_power)?,
            meter_power: read(&self.meter_power)?,
            allowed_discharge: read(&self.allowed_discharge)?,
        })
    }
}

impl Controller for BalancingController {
    type Outcome = Option<i64>;

    fn id(&self) -> &str {
        &self.id
    }

    fn run<R: PointRegistry + ?Sized>(&mut self, registry: &mut R) -> ControllerResult<Option<i64>> {
        self.run_cycle(registry)
    }
}
