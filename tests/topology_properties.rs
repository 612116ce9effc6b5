mod common;

use proptest::prelude::*;
use supply_bus_switch::control::{BusSwitchSettings, SwitchSequencer};
use supply_bus_switch::ess::{EssId, EssUnit, GridMode};
use supply_bus_switch::points::InMemoryRegistry;
use supply_bus_switch::topology::{Bus, SocRanker, Topology, TopologyCatalog, TopologyPlanner};

fn catalog(n: usize) -> TopologyCatalog {
    BusSwitchSettings::try_from(&common::site_config(n))
        .expect("valid config")
        .catalog
}

fn units(socs: &[u8]) -> Vec<EssUnit> {
    socs.iter()
        .enumerate()
        .map(|(i, soc)| EssUnit {
            soc: Some(*soc),
            allowed_charge: Some(5_000),
            allowed_discharge: Some(5_000),
            grid_mode: GridMode::OnGrid,
            ..EssUnit::unknown(EssId::from(format!("ess{}", i + 1)))
        })
        .collect()
}

fn shuffled_ids() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (2usize..=4).prop_flat_map(|n| {
        Just((1..=n).collect::<Vec<_>>())
            .prop_shuffle()
            .prop_map(move |order| (n, order))
    })
}

proptest! {
    #[test]
    fn assign_never_puts_one_ess_on_both_buses((n, order) in shuffled_ids()) {
        let ranked: Vec<EssId> = order.iter().map(|i| EssId::from(format!("ess{i}"))).collect();
        let topology = catalog(n).assign(&ranked).expect("distinct ranked ids");
        let assignment = topology.assignment().expect("assigned");
        prop_assert_ne!(assignment.ess_on(Bus::Bus1), assignment.ess_on(Bus::Bus2));
        prop_assert_eq!(assignment.ess_on(Bus::Bus1), &ranked[0]);
        prop_assert_eq!(assignment.ess_on(Bus::Bus2), &ranked[1]);
    }

    #[test]
    fn planning_is_deterministic_and_picks_the_fullest(
        socs in prop::collection::vec(0u8..=100, 2..=4)
    ) {
        let catalog = catalog(socs.len());
        let planner = TopologyPlanner::new(SocRanker::default());
        let snapshot = units(&socs);
        let first = planner.plan(&catalog, &snapshot).expect("enough data");
        let second = planner.plan(&catalog, &snapshot).expect("enough data");
        prop_assert_eq!(&first, &second);

        let assignment = first.assignment().expect("assigned");
        let soc_of = |id: &EssId| {
            snapshot.iter().find(|u| &u.id == id).and_then(|u| u.soc).unwrap_or_default()
        };
        let bus1 = soc_of(assignment.ess_on(Bus::Bus1));
        let bus2 = soc_of(assignment.ess_on(Bus::Bus2));
        prop_assert!(bus1 >= bus2);
        for unit in &snapshot {
            if !assignment.connects(&unit.id, Bus::Bus1) && !assignment.connects(&unit.id, Bus::Bus2) {
                prop_assert!(unit.soc.unwrap_or_default() <= bus2);
            }
        }
    }

    #[test]
    fn sequencer_apply_is_idempotent((n, order) in shuffled_ids(), closed in prop::collection::vec(any::<bool>(), 8)) {
        let catalog = catalog(n);
        let mut registry = InMemoryRegistry::new();
        for (c, is_closed) in catalog.contactors().iter().zip(&closed) {
            registry.set_bool(&c.address, Some(*is_closed));
        }
        let ranked: Vec<EssId> = order.iter().map(|i| EssId::from(format!("ess{i}"))).collect();
        let desired = catalog.assign(&ranked).expect("distinct ranked ids");

        let observed = catalog.observe(&registry);
        SwitchSequencer.apply(&mut registry, &catalog, &desired, &observed).expect("legal plan");
        let observed = catalog.observe(&registry);
        prop_assert!(catalog.is_satisfied(&desired, &observed));
        prop_assert_eq!(catalog.observed_topology(&observed), desired.clone());

        let report = SwitchSequencer
            .apply(&mut registry, &catalog, &desired, &observed)
            .expect("legal plan");
        prop_assert!(report.is_empty());
    }
}

#[test]
fn ties_follow_configuration_order() {
    let catalog = catalog(4);
    let planner = TopologyPlanner::new(SocRanker::default());
    let topology = planner
        .plan(&catalog, &units(&[50, 70, 70, 50]))
        .expect("enough data");
    assert_eq!(topology, Topology::assigned("ess2", "ess3").expect("legal"));
}
