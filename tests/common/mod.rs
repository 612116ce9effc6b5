//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use supply_bus_switch::config::{BusMapping, SiteConfig};
use supply_bus_switch::control::{BusSwitchController, BusSwitchSettings, ManualClock};
use supply_bus_switch::ess::GridMode;
use supply_bus_switch::ess::types::{
    ALLOWED_CHARGE_CHANNEL, ALLOWED_DISCHARGE_CHANNEL, GRID_MODE_CHANNEL, SOC_CHANNEL,
};
use supply_bus_switch::points::{InMemoryRegistry, PointAddress, PointValue};

/// Loads enabled by the fixture controller, in write order.
pub const LOADS: &[&str] = &["PivotOn", "OfficeOn", "Clima1On"];

pub fn addr(s: &str) -> PointAddress {
    s.parse().expect("valid address")
}

/// Contactor of `ess{index}` (1-based) on bus 1 or bus 2.
pub fn contactor(index: usize, bus: usize) -> PointAddress {
    let output = if bus == 1 { index * 2 - 1 } else { index * 2 };
    addr(&format!("io0/DigitalOutput{output}"))
}

/// A site with `ess1..=essN` wired to both buses and three loads.
pub fn site_config(n: usize) -> SiteConfig {
    let mut cfg = SiteConfig::two_ess();
    cfg.bus1 = (1..=n)
        .map(|i| BusMapping::new(&format!("ess{i}"), &contactor(i, 1).to_string()))
        .collect();
    cfg.bus2 = (1..=n)
        .map(|i| BusMapping::new(&format!("ess{i}"), &contactor(i, 2).to_string()))
        .collect();
    cfg.controller.loads = LOADS.iter().map(|s| s.to_string()).collect();
    cfg.simulation.initial_soc.clear();
    cfg
}

/// Writes the SoC, power limits and grid mode of `ess{index}`.
pub fn set_ess(registry: &mut InMemoryRegistry, index: usize, soc: Option<i64>, mode: GridMode) {
    let id = format!("ess{index}");
    registry.set_int(&addr(&format!("{id}/{SOC_CHANNEL}")), soc);
    registry.set_int(&addr(&format!("{id}/{ALLOWED_CHARGE_CHANNEL}")), Some(5_000));
    registry.set_int(&addr(&format!("{id}/{ALLOWED_DISCHARGE_CHANNEL}")), Some(5_000));
    registry.set_grid_mode(&addr(&format!("{id}/{GRID_MODE_CHANNEL}")), mode);
}

pub struct Site {
    pub registry: InMemoryRegistry,
    pub clock: ManualClock,
    pub controller: BusSwitchController<ManualClock>,
}

impl Site {
    /// Runs two cycles: plan, then verify or switch.
    pub fn plan_and_act(&mut self) -> supply_bus_switch::control::CycleOutcome {
        self.controller.run_cycle(&mut self.registry).expect("plan");
        self.controller.run_cycle(&mut self.registry).expect("act")
    }
}

/// One ESS per `(soc, mode)` pair; all contactors open.
pub fn site(units: &[(Option<i64>, GridMode)]) -> Site {
    site_from(&site_config(units.len()), units)
}

pub fn site_from(cfg: &SiteConfig, units: &[(Option<i64>, GridMode)]) -> Site {
    let settings = BusSwitchSettings::try_from(cfg).expect("valid config");
    let mut registry = InMemoryRegistry::new();
    for c in settings.catalog.contactors() {
        registry.set_bool(&c.address, Some(false));
    }
    registry.add_component("io1");
    registry.add_component("plc0");
    for (i, (soc, mode)) in units.iter().enumerate() {
        set_ess(&mut registry, i + 1, *soc, *mode);
    }
    let clock = ManualClock::default();
    let controller =
        BusSwitchController::new(settings, &registry, clock.clone()).expect("known components");
    Site {
        registry,
        clock,
        controller,
    }
}

/// Contactor writes as `(channel, closed)` in issue order.
pub fn contactor_writes(registry: &InMemoryRegistry) -> Vec<(String, bool)> {
    registry
        .writes()
        .iter()
        .filter(|w| w.address.component() == "io0")
        .filter_map(|w| match w.value {
            PointValue::Bool(v) => Some((w.address.channel().to_string(), v)),
            PointValue::Int(_) => None,
        })
        .collect()
}

pub fn on_grid(socs: &[i64]) -> Vec<(Option<i64>, GridMode)> {
    socs.iter().map(|s| (Some(*s), GridMode::OnGrid)).collect()
}
