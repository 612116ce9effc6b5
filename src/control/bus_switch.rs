//! The per-cycle supply bus switch state machine.
//!
//! Each invocation either decides a topology (state `Undefined`) or verifies
//! and enacts the decided one (state `Assigned`), then forgets the decision so
//! the next cycle ranks the units again:
//!
//! ```text
//! Undefined --plan--> Assigned(t) --verify/switch, indicate, loads--> Undefined
//! ```
//!
//! With all units on-grid a mismatching field is always switched. Off-grid
//! (or with an undefined grid mode) the switch only happens when neither
//! unit of `t` is `Empty` or `Low`; otherwise the bus indication is lowered
//! and the loads are shed.

use chrono::TimeDelta;
use tracing::{debug, info, warn};

use crate::error::{ControllerError, ControllerResult};
use crate::ess::{BatteryState, EssUnit, GridMode};
use crate::points::{Operation, PointAddress, PointRegistry};
use crate::topology::{
    Assignment, GridModeAggregator, SocRanker, Topology, TopologyCatalog, TopologyPlanner,
};

use super::clock::WallClock;
use super::indication::BusIndicationDebouncer;
use super::loads::{LoadCoordinator, LoadReport};
use super::sequencer::{SwitchReport, SwitchSequencer};
use super::Controller;

/// Validated settings of a [`BusSwitchController`].
#[derive(Debug, Clone)]
pub struct BusSwitchSettings {
    pub id: String,
    pub catalog: TopologyCatalog,
    pub bus1_indication: PointAddress,
    pub bus2_indication: PointAddress,
    /// Load-enable points, written in this order.
    pub loads: Vec<PointAddress>,
    /// SoC (percent) at or below which a unit counts as `Low`.
    pub low_soc_threshold: u8,
    pub indication_hold_off: TimeDelta,
    /// Refuse to rank when any SoC is unreadable.
    pub require_all_soc: bool,
}

/// What a cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleAction {
    /// A topology was decided; it is verified and switched next cycle.
    Planned,
    /// The field already matched the decided topology.
    Confirmed,
    /// Contactors were commanded towards the decided topology.
    Reconnected,
    /// The field did not match but an assigned unit was `Empty` or `Low`.
    Held,
}

impl std::fmt::Display for CycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleAction::Planned => write!(f, "planned"),
            CycleAction::Confirmed => write!(f, "confirmed"),
            CycleAction::Reconnected => write!(f, "reconnected"),
            CycleAction::Held => write!(f, "held"),
        }
    }
}

/// Summary of one successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub grid_mode: GridMode,
    pub action: CycleAction,
    /// The topology decided (`Planned`) or acted upon (all other actions).
    pub target: Topology,
    /// Topology shown by the contactors before switching; `Undefined` on
    /// planning cycles, which do not read the contactors.
    pub observed: Topology,
    pub switching: SwitchReport,
    pub indication_applied: bool,
    pub loads: LoadReport,
}

impl CycleOutcome {
    fn planned(grid_mode: GridMode, target: Topology) -> Self {
        Self {
            grid_mode,
            action: CycleAction::Planned,
            target,
            observed: Topology::Undefined,
            switching: SwitchReport::default(),
            indication_applied: false,
            loads: LoadReport::default(),
        }
    }
}

/// Routes the ESS units onto the two supply buses.
///
/// Not reentrant: the scheduler must not run two cycles at once.
#[derive(Debug)]
pub struct BusSwitchController<K: WallClock> {
    id: String,
    catalog: TopologyCatalog,
    planner: TopologyPlanner,
    aggregator: GridModeAggregator,
    sequencer: SwitchSequencer,
    indication: BusIndicationDebouncer,
    loads: LoadCoordinator,
    low_soc_threshold: u8,
    current_topology: Topology,
    clock: K,
}

impl<K: WallClock> BusSwitchController<K> {
    /// Creates the controller and resolves every referenced component once.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if an ESS, the indication outputs or a
    /// load output belong to a component the registry does not know.
    pub fn new<R: PointRegistry + ?Sized>(
        settings: BusSwitchSettings,
        registry: &R,
        clock: K,
    ) -> ControllerResult<Self> {
        for id in settings.catalog.ess_ids() {
            if !registry.has_component(id.as_str()) {
                return Err(ControllerError::configuration(format!(
                    "ESS component \"{id}\" not found"
                )));
            }
        }
        let outputs = [&settings.bus1_indication, &settings.bus2_indication]
            .into_iter()
            .chain(settings.loads.iter());
        for address in outputs {
            if !registry.has_component(address.component()) {
                return Err(ControllerError::configuration(format!(
                    "component \"{}\" of output [{address}] not found",
                    address.component()
                )));
            }
        }

        Ok(Self {
            id: settings.id,
            catalog: settings.catalog,
            planner: TopologyPlanner::new(SocRanker::new(settings.require_all_soc)),
            aggregator: GridModeAggregator,
            sequencer: SwitchSequencer,
            indication: BusIndicationDebouncer::new(
                settings.bus1_indication,
                settings.bus2_indication,
                settings.indication_hold_off,
            ),
            loads: LoadCoordinator::new(settings.loads),
            low_soc_threshold: settings.low_soc_threshold,
            current_topology: Topology::Undefined,
            clock,
        })
    }

    pub fn catalog(&self) -> &TopologyCatalog {
        &self.catalog
    }

    /// The decision carried into the next cycle.
    pub fn current_topology(&self) -> &Topology {
        &self.current_topology
    }

    /// When the indication outputs were last switched.
    pub fn last_indication_switch(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.indication.last_switch()
    }

    /// Runs one decide-or-verify step.
    ///
    /// # Errors
    ///
    /// * `InsufficientData` / `MissingValue` when a topology cannot be
    ///   ranked. Nothing is written and the state stays `Undefined`.
    /// * `IllegalTopology` on an internal invariant violation.
    ///
    /// Failed point writes are logged and reported in the outcome, never
    /// returned as errors.
    pub fn run_cycle<R: PointRegistry + ?Sized>(
        &mut self,
        registry: &mut R,
    ) -> ControllerResult<CycleOutcome> {
        let units: Vec<EssUnit> = self
            .catalog
            .ess_ids()
            .iter()
            .map(|id| EssUnit::read(registry, id))
            .collect();
        let grid_mode = self.aggregator.aggregate(&units);

        let Topology::Assigned(assignment) = self.current_topology.clone() else {
            let planned = self.planner.plan(&self.catalog, &units)?;
            self.current_topology = planned.clone();
            return Ok(CycleOutcome::planned(grid_mode, planned));
        };

        let target = Topology::Assigned(assignment.clone());
        let observed = self.catalog.observe(registry);
        let observed_topology = self.catalog.observed_topology(&observed);

        let action = if self.catalog.is_satisfied(&target, &observed) {
            CycleAction::Confirmed
        } else if grid_mode == GridMode::OnGrid || self.can_supply(&assignment, &units) {
            CycleAction::Reconnected
        } else {
            CycleAction::Held
        };

        let switching = match action {
            CycleAction::Reconnected => {
                info!(%grid_mode, %target, observed = %observed_topology, "reconnecting supply buses");
                self.sequencer
                    .apply(registry, &self.catalog, &target, &observed)?
            }
            _ => SwitchReport::default(),
        };

        let now = self.clock.now();
        let (indication_applied, loads) = if action == CycleAction::Held {
            warn!(
                %grid_mode,
                %target,
                "assigned ESS cannot carry the buses, lowering indication and shedding loads"
            );
            (
                self.indication.maybe_signal(registry, Operation::Open, now),
                self.loads.set_loads(registry, false),
            )
        } else {
            debug!(%grid_mode, %target, %action, "supply buses energized");
            (
                self.indication.maybe_signal(registry, Operation::Close, now),
                self.loads.set_loads(registry, true),
            )
        };

        self.current_topology = Topology::Undefined;
        Ok(CycleOutcome {
            grid_mode,
            action,
            target,
            observed: observed_topology,
            switching,
            indication_applied,
            loads,
        })
    }

    /// Neither unit of the assignment is `Empty` or `Low`.
    fn can_supply(&self, assignment: &Assignment, units: &[EssUnit]) -> bool {
        assignment.pairs().into_iter().all(|(ess, _)| {
            let state = units
                .iter()
                .find(|u| &u.id == ess)
                .map_or(BatteryState::Undefined, |u| {
                    BatteryState::classify(u, self.low_soc_threshold)
                });
            if !state.can_supply() {
                info!(%ess, %state, "battery state blocks reconnection");
            }
            state.can_supply()
        })
    }
}

impl<K: WallClock> Controller for BusSwitchController<K> {
    type Outcome = CycleOutcome;

    fn id(&self) -> &str {
        &self.id
    }

    fn run<R: PointRegistry + ?Sized>(&mut self, registry: &mut R) -> ControllerResult<CycleOutcome> {
        self.run_cycle(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::clock::ManualClock;
    use crate::ess::EssId;
    use crate::ess::types::{ALLOWED_DISCHARGE_CHANNEL, SOC_CHANNEL};
    use crate::points::{InMemoryRegistry, PointValue};
    use crate::test_utils::{addr, catalog, registry_for, set_ess};
    use crate::topology::Bus;

    fn settings(n: usize) -> BusSwitchSettings {
        BusSwitchSettings {
            id: "ctrlSupplyBusSwitch0".to_string(),
            catalog: catalog(n),
            bus1_indication: addr("io1/SupplyBus1On"),
            bus2_indication: addr("io1/SupplyBus2On"),
            loads: vec![addr("plc0/PivotOn"), addr("plc0/OfficeOn")],
            low_soc_threshold: 5,
            indication_hold_off: TimeDelta::seconds(10),
            require_all_soc: false,
        }
    }

    fn site(socs: &[i64], mode: GridMode) -> InMemoryRegistry {
        let mut registry = registry_for(&catalog(socs.len()));
        for (i, soc) in socs.iter().enumerate() {
            set_ess(&mut registry, &format!("ess{}", i + 1), Some(*soc), mode);
        }
        registry.add_component("io1");
        registry.add_component("plc0");
        registry
    }

    fn controller(
        n: usize,
        registry: &InMemoryRegistry,
    ) -> (BusSwitchController<ManualClock>, ManualClock) {
        let clock = ManualClock::default();
        let controller =
            BusSwitchController::new(settings(n), registry, clock.clone()).expect("valid settings");
        (controller, clock)
    }

    fn contactor_writes(registry: &InMemoryRegistry) -> Vec<(String, PointValue)> {
        registry
            .writes()
            .iter()
            .filter(|w| w.address.component() == "io0")
            .map(|w| (w.address.channel().to_string(), w.value))
            .collect()
    }

    #[test]
    fn unknown_ess_component_is_a_configuration_error() {
        let mut registry = site(&[50, 40], GridMode::OnGrid);
        let mut s = settings(3);
        s.loads.clear();
        registry.add_component("io1");
        let result = BusSwitchController::new(s, &registry, ManualClock::default());
        assert!(matches!(result, Err(ControllerError::Configuration { .. })));
    }

    #[test]
    fn unknown_load_component_is_a_configuration_error() {
        let registry = site(&[50, 40], GridMode::OnGrid);
        let mut s = settings(2);
        s.loads.push(addr("plc9/PivotOn"));
        let result = BusSwitchController::new(s, &registry, ManualClock::default());
        assert!(matches!(result, Err(ControllerError::Configuration { .. })));
    }

    #[test]
    fn first_cycle_only_plans() {
        let mut registry = site(&[80, 60, 40], GridMode::OnGrid);
        let (mut controller, _) = controller(3, &registry);
        let outcome = controller.run_cycle(&mut registry).expect("cycle");
        assert_eq!(outcome.action, CycleAction::Planned);
        assert_eq!(
            controller.current_topology(),
            &Topology::assigned("ess1", "ess2").expect("legal")
        );
        assert!(registry.writes().is_empty());
    }

    #[test]
    fn second_cycle_switches_and_resets() {
        let mut registry = site(&[80, 60, 40], GridMode::OnGrid);
        let (mut controller, _) = controller(3, &registry);
        controller.run_cycle(&mut registry).expect("plan");
        let outcome = controller.run_cycle(&mut registry).expect("switch");

        assert_eq!(outcome.action, CycleAction::Reconnected);
        assert_eq!(outcome.switching.issued.len(), 2);
        assert_eq!(
            contactor_writes(&registry),
            vec![
                ("DigitalOutput1".to_string(), PointValue::Bool(true)),
                ("DigitalOutput4".to_string(), PointValue::Bool(true)),
            ]
        );
        assert!(outcome.indication_applied);
        assert_eq!(outcome.loads.written, 2);
        assert!(controller.current_topology().is_undefined());
    }

    #[test]
    fn insufficient_data_leaves_state_and_outputs_alone() {
        let mut registry = site(&[80, 60, 40], GridMode::OnGrid);
        registry.set_int(&addr(&format!("ess1/{SOC_CHANNEL}")), None);
        registry.set_unreachable(&addr(&format!("ess2/{SOC_CHANNEL}")), true);
        let (mut controller, _) = controller(3, &registry);

        let result = controller.run_cycle(&mut registry);
        assert_eq!(
            result,
            Err(ControllerError::InsufficientData {
                readable: 1,
                required: 2
            })
        );
        assert!(controller.current_topology().is_undefined());
        assert!(registry.writes().is_empty());
    }

    #[test]
    fn off_grid_reconnects_when_batteries_can_supply() {
        let mut registry = site(&[70, 50], GridMode::OffGrid);
        let (mut controller, _) = controller(2, &registry);
        controller.run_cycle(&mut registry).expect("plan");
        let outcome = controller.run_cycle(&mut registry).expect("switch");
        assert_eq!(outcome.grid_mode, GridMode::OffGrid);
        assert_eq!(outcome.action, CycleAction::Reconnected);
        assert_eq!(outcome.switching.issued.len(), 2);
    }

    // The guard reads "neither Empty nor Low"; an always-true guard would
    // reconnect here.
    #[test]
    fn off_grid_guard_blocks_low_battery() {
        let mut registry = site(&[70, 4], GridMode::OffGrid);
        let (mut controller, _) = controller(2, &registry);
        controller.run_cycle(&mut registry).expect("plan");
        let outcome = controller.run_cycle(&mut registry).expect("verify");

        assert_eq!(outcome.action, CycleAction::Held);
        assert!(outcome.switching.is_empty());
        assert!(contactor_writes(&registry).is_empty());
        assert_eq!(registry.int_value(&addr("io1/SupplyBus1On")), Some(0));
        assert!(controller.current_topology().is_undefined());
    }

    #[test]
    fn off_grid_guard_blocks_empty_battery() {
        let mut registry = site(&[70, 60], GridMode::OffGrid);
        registry.set_int(&addr(&format!("ess1/{ALLOWED_DISCHARGE_CHANNEL}")), Some(0));
        let (mut controller, _) = controller(2, &registry);
        controller.run_cycle(&mut registry).expect("plan");
        let outcome = controller.run_cycle(&mut registry).expect("verify");
        assert_eq!(outcome.action, CycleAction::Held);
    }

    #[test]
    fn on_grid_ignores_battery_state() {
        let mut registry = site(&[70, 4], GridMode::OnGrid);
        let (mut controller, _) = controller(2, &registry);
        controller.run_cycle(&mut registry).expect("plan");
        let outcome = controller.run_cycle(&mut registry).expect("switch");
        assert_eq!(outcome.action, CycleAction::Reconnected);
    }

    #[test]
    fn matching_field_is_confirmed_without_contactor_writes() {
        let mut registry = site(&[30, 90], GridMode::OffGrid);
        let c = catalog(2);
        for (ess, bus) in [("ess2", Bus::Bus1), ("ess1", Bus::Bus2)] {
            let port = c.contactor(&EssId::from(ess), bus).expect("configured");
            registry.set_bool(&port.address, Some(true));
        }
        let (mut controller, _) = controller(2, &registry);
        controller.run_cycle(&mut registry).expect("plan");
        let outcome = controller.run_cycle(&mut registry).expect("verify");

        assert_eq!(outcome.action, CycleAction::Confirmed);
        assert_eq!(outcome.observed, outcome.target);
        assert!(contactor_writes(&registry).is_empty());
        assert_eq!(registry.int_value(&addr("plc0/PivotOn")), Some(1));
    }

    #[test]
    fn indication_is_debounced_across_cycles() {
        let mut registry = site(&[80, 60], GridMode::OnGrid);
        let (mut controller, clock) = controller(2, &registry);

        controller.run_cycle(&mut registry).expect("plan");
        let first = controller.run_cycle(&mut registry).expect("switch");
        assert!(first.indication_applied);

        clock.advance(TimeDelta::seconds(2));
        controller.run_cycle(&mut registry).expect("plan");
        let second = controller.run_cycle(&mut registry).expect("confirm");
        assert_eq!(second.action, CycleAction::Confirmed);
        assert!(!second.indication_applied);

        clock.advance(TimeDelta::seconds(10));
        controller.run_cycle(&mut registry).expect("plan");
        let third = controller.run_cycle(&mut registry).expect("confirm");
        assert!(third.indication_applied);
    }
}
