//! Simulation engine that drives the controllers against a simulated site.

use chrono::TimeDelta;
use tracing::{info, warn};

use crate::balancing::BalancingController;
use crate::config::SiteConfig;
use crate::control::{BusSwitchController, BusSwitchSettings, Controller, ManualClock, WallClock};
use crate::error::ControllerResult;
use crate::ess::EssUnit;
use crate::points::PointRegistry;
use crate::topology::GridModeAggregator;

use super::site::SimulatedSite;
use super::types::CycleRecord;

/// Runs one controller cycle and logs a failure under the controller id.
fn run_logged<C: Controller, R: PointRegistry + ?Sized>(
    controller: &mut C,
    registry: &mut R,
) -> ControllerResult<C::Outcome> {
    let result = controller.run(registry);
    if let Err(err) = &result {
        warn!(controller = controller.id(), "cycle failed: {err}");
    }
    result
}

/// Simulation engine owning the site, the clock and both controllers.
pub struct Engine {
    site: SimulatedSite,
    clock: ManualClock,
    period: TimeDelta,
    cycles: usize,
    bus_switch: BusSwitchController<ManualClock>,
    balancing: Option<BalancingController>,
}

impl Engine {
    /// Creates a new simulation engine from a site configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if the configuration is invalid.
    pub fn new(cfg: &SiteConfig) -> ControllerResult<Self> {
        let settings = BusSwitchSettings::try_from(cfg)?;
        let site = SimulatedSite::new(cfg, &settings);
        let clock = ManualClock::default();
        let bus_switch = BusSwitchController::new(settings, site.registry(), clock.clone())?;
        let balancing = cfg
            .balancing_settings()
            .map(|s| BalancingController::new(s, site.registry()))
            .transpose()?;

        info!(
            ess = bus_switch.catalog().ess_ids().len(),
            balancing = balancing.is_some(),
            cycles = cfg.simulation.cycles,
            "simulated site ready"
        );

        Ok(Self {
            site,
            clock,
            period: TimeDelta::seconds(cfg.simulation.cycle_period_secs),
            cycles: cfg.simulation.cycles,
            bus_switch,
            balancing,
        })
    }

    /// Executes one controller cycle and returns its record.
    ///
    /// The site is advanced first, then the bus switch controller and the
    /// balancing controller run. The clock moves by one cycle period
    /// afterwards.
    pub fn step(&mut self, cycle: usize) -> CycleRecord {
        self.site.advance(cycle);
        let time = self.clock.now();
        let registry = self.site.registry_mut();

        let record = match run_logged(&mut self.bus_switch, registry) {
            Ok(outcome) => CycleRecord::new(cycle, time, outcome.grid_mode).with_outcome(outcome),
            Err(err) => {
                let units: Vec<EssUnit> = self
                    .bus_switch
                    .catalog()
                    .ess_ids()
                    .iter()
                    .map(|id| EssUnit::read(&*registry, id))
                    .collect();
                let mut record =
                    CycleRecord::new(cycle, time, GridModeAggregator.aggregate(&units));
                record.error = Some(err.to_string());
                record
            }
        };

        let balancing_setpoint_w = match &mut self.balancing {
            Some(balancing) => run_logged(balancing, registry).ok().flatten(),
            None => None,
        };

        let catalog = self.bus_switch.catalog();
        let connected = catalog.observed_topology(&catalog.observe(&*registry));
        self.clock.advance(self.period);

        CycleRecord {
            connected,
            balancing_setpoint_w,
            soc: self.site.socs(),
            ..record
        }
    }

    /// Executes all configured cycles.
    pub fn run(&mut self) -> Vec<CycleRecord> {
        (0..self.cycles).map(|cycle| self.step(cycle)).collect()
    }

    pub fn site(&self) -> &SimulatedSite {
        &self.site
    }

    pub fn bus_switch(&self) -> &BusSwitchController<ManualClock> {
        &self.bus_switch
    }
}
