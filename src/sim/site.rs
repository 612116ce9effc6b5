//! A simulated site: ESS units, contactors, PLC and grid meter behind an
//! in-memory point registry.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::balancing::{ACTIVE_POWER_CHANNEL, SET_ACTIVE_POWER_CHANNEL};
use crate::config::{SimulationConfig, SiteConfig};
use crate::control::BusSwitchSettings;
use crate::ess::types::{
    ALLOWED_CHARGE_CHANNEL, ALLOWED_DISCHARGE_CHANNEL, GRID_MODE_CHANNEL, SOC_CHANNEL,
};
use crate::ess::{EssId, GridMode};
use crate::points::{InMemoryRegistry, PointAddress};
use crate::topology::TopologyCatalog;

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedUnit {
    pub id: EssId,
    /// State of charge (percent).
    pub soc: f64,
    /// Grid mode reported while no outage is simulated.
    pub grid_mode: GridMode,
}

/// Field model driven once per cycle by [`SimulatedSite::advance`].
///
/// Contactor feedback is the last commanded value. Connected units share the
/// site load (or follow the balancing setpoint) and drain; idle units
/// recover slowly.
#[derive(Debug)]
pub struct SimulatedSite {
    registry: InMemoryRegistry,
    catalog: TopologyCatalog,
    units: Vec<SimulatedUnit>,
    meter: Option<PointAddress>,
    balancing_ess: Option<EssId>,
    params: SimulationConfig,
    rng: StdRng,
}

impl SimulatedSite {
    /// Builds the site for a validated configuration.
    pub fn new(cfg: &SiteConfig, settings: &BusSwitchSettings) -> Self {
        let params = cfg.simulation.clone();
        let units = settings
            .catalog
            .ess_ids()
            .iter()
            .map(|id| SimulatedUnit {
                id: id.clone(),
                soc: params.initial_soc_of(id.as_str()),
                grid_mode: params.grid_mode_of(id.as_str()),
            })
            .collect();

        let mut registry = InMemoryRegistry::new();
        for contactor in settings.catalog.contactors() {
            registry.set_bool(&contactor.address, Some(false));
        }
        for address in [&settings.bus1_indication, &settings.bus2_indication]
            .into_iter()
            .chain(&settings.loads)
        {
            registry.set_int(address, Some(0));
        }

        let meter = cfg
            .balancing
            .as_ref()
            .and_then(|b| PointAddress::new(&b.meter, ACTIVE_POWER_CHANNEL).ok());
        let balancing_ess = cfg.balancing.as_ref().map(|b| EssId::from(b.ess.as_str()));

        let mut site = Self {
            registry,
            catalog: settings.catalog.clone(),
            units,
            meter,
            balancing_ess,
            rng: StdRng::seed_from_u64(params.seed),
            params,
        };
        let idle = vec![0; site.units.len()];
        site.publish(None, &idle);
        site
    }

    pub fn registry(&self) -> &InMemoryRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut InMemoryRegistry {
        &mut self.registry
    }

    pub fn units(&self) -> &[SimulatedUnit] {
        &self.units
    }

    pub fn socs(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.soc).collect()
    }

    /// Moves the field forward to the start of `cycle`.
    pub fn advance(&mut self, cycle: usize) {
        let connected: Vec<bool> = self
            .units
            .iter()
            .map(|u| {
                self.catalog
                    .contactors()
                    .iter()
                    .any(|c| c.ess == u.id && self.registry.bool_value(&c.address) == Some(true))
            })
            .collect();
        let connected_count = connected.iter().filter(|c| **c).count() as i64;
        let share = if connected_count > 0 {
            self.params.site_load_w / connected_count
        } else {
            0
        };
        let setpoint = self
            .balancing_ess
            .as_ref()
            .and_then(|id| id.channel(SET_ACTIVE_POWER_CHANNEL))
            .and_then(|address| self.registry.int_value(&address));

        let mut powers = Vec::with_capacity(self.units.len());
        for (unit, is_connected) in self.units.iter_mut().zip(&connected) {
            let power = match (*is_connected, setpoint) {
                (false, _) => 0,
                (true, Some(sp)) if self.balancing_ess.as_ref() == Some(&unit.id) => sp,
                (true, _) => share,
            };
            let trend = if *is_connected {
                -self.params.connected_soc_drain
            } else {
                self.params.idle_soc_recovery
            };
            let noise = gaussian_noise(&mut self.rng, self.params.soc_drift_std);
            unit.soc = (unit.soc + trend + noise).clamp(0.0, 100.0);
            powers.push(power);
        }

        let outage = self.params.outage_cycle.is_some_and(|c| cycle >= c);
        self.publish(outage.then_some(GridMode::OffGrid), &powers);
    }

    /// Writes the unit and meter values into the registry.
    fn publish(&mut self, grid_override: Option<GridMode>, powers: &[i64]) {
        let max_discharge = self.params.max_discharge_w;
        for (unit, power) in self.units.iter().zip(powers) {
            let soc = unit.soc.round() as i64;
            let allowed_discharge = if unit.soc < 1.0 { 0 } else { max_discharge };
            let allowed_charge = if unit.soc >= 99.5 { 0 } else { max_discharge };
            let values = [
                (SOC_CHANNEL, soc),
                (ALLOWED_CHARGE_CHANNEL, allowed_charge),
                (ALLOWED_DISCHARGE_CHANNEL, allowed_discharge),
                (ACTIVE_POWER_CHANNEL, *power),
            ];
            for (channel, value) in values {
                if let Some(address) = unit.id.channel(channel) {
                    self.registry.set_int(&address, Some(value));
                }
            }
            if let Some(address) = unit.id.channel(GRID_MODE_CHANNEL) {
                self.registry
                    .set_grid_mode(&address, grid_override.unwrap_or(unit.grid_mode));
            }
        }
        if let Some(meter) = &self.meter {
            let ess_total: i64 = powers.iter().sum();
            self.registry
                .set_int(meter, Some(self.params.site_load_w - ess_total));
        }
    }
}
