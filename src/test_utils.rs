//! Fixtures shared by the unit tests.

use crate::ess::types::{
    ALLOWED_CHARGE_CHANNEL, ALLOWED_DISCHARGE_CHANNEL, GRID_MODE_CHANNEL, SOC_CHANNEL,
};
use crate::ess::{EssId, GridMode};
use crate::points::{ContactorPort, InMemoryRegistry, PointAddress};
use crate::topology::{Bus, TopologyCatalog};

pub(crate) fn addr(s: &str) -> PointAddress {
    s.parse().expect("valid address")
}

/// Contactor address of `ess{i}` on `bus`: Bus1 on odd outputs, Bus2 on even.
pub(crate) fn contactor_address(index: usize, bus: Bus) -> PointAddress {
    let output = index * 2 + if bus == Bus::Bus1 { 1 } else { 2 };
    addr(&format!("io0/DigitalOutput{output}"))
}

/// A catalog of `ess1..=essN`, each wired to both buses.
pub(crate) fn catalog(n: usize) -> TopologyCatalog {
    let ids: Vec<EssId> = (1..=n).map(|i| EssId::from(format!("ess{i}"))).collect();
    let contactors = ids
        .iter()
        .enumerate()
        .flat_map(|(i, id)| {
            Bus::ALL
                .into_iter()
                .map(move |bus| ContactorPort::new(id.clone(), bus, contactor_address(i, bus)))
        })
        .collect();
    TopologyCatalog::new(ids, contactors).expect("valid catalog")
}

/// Writes the four ESS points of one unit.
pub(crate) fn set_ess(
    registry: &mut InMemoryRegistry,
    id: &str,
    soc: Option<i64>,
    grid_mode: GridMode,
) {
    registry.set_int(&addr(&format!("{id}/{SOC_CHANNEL}")), soc);
    registry.set_int(&addr(&format!("{id}/{ALLOWED_CHARGE_CHANNEL}")), Some(10_000));
    registry.set_int(&addr(&format!("{id}/{ALLOWED_DISCHARGE_CHANNEL}")), Some(10_000));
    registry.set_grid_mode(&addr(&format!("{id}/{GRID_MODE_CHANNEL}")), grid_mode);
}

/// Registry holding all contactors of `catalog` open.
pub(crate) fn registry_for(catalog: &TopologyCatalog) -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    for contactor in catalog.contactors() {
        registry.set_bool(&contactor.address, Some(false));
    }
    registry
}
