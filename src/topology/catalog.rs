//! The legal ESS/bus pairings of an installation and the checks against
//! observed contactor states.

use std::collections::HashMap;

use crate::error::{ControllerError, ControllerResult};
use crate::ess::EssId;
use crate::points::{ContactorPort, ContactorState, PointRegistry};

use super::{Assignment, Bus, Topology};

/// Observed state of every configured contactor for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    states: HashMap<(EssId, Bus), ContactorState>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the state of one contactor.
    pub fn with(mut self, ess: impl Into<EssId>, bus: Bus, state: ContactorState) -> Self {
        self.states.insert((ess.into(), bus), state);
        self
    }

    /// State of `(ess, bus)`; contactors never observed are `Unknown`.
    pub fn state(&self, ess: &EssId, bus: Bus) -> ContactorState {
        self.states
            .get(&(ess.clone(), bus))
            .copied()
            .unwrap_or(ContactorState::Unknown)
    }
}

/// Static description of the installation: the ESS eligible for the bus
/// pair, in configuration order, and the contactor joining each ESS to each
/// bus.
#[derive(Debug, Clone)]
pub struct TopologyCatalog {
    ess_ids: Vec<EssId>,
    contactors: Vec<ContactorPort>,
}

impl TopologyCatalog {
    /// Builds the catalog.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error unless there are 2–4 distinct ESS ids
    /// and exactly one contactor per `(ess, bus)` combination.
    pub fn new(ess_ids: Vec<EssId>, contactors: Vec<ContactorPort>) -> ControllerResult<Self> {
        if !(2..=4).contains(&ess_ids.len()) {
            return Err(ControllerError::configuration(format!(
                "expected 2 to 4 ESS, got {}",
                ess_ids.len()
            )));
        }
        for (i, id) in ess_ids.iter().enumerate() {
            if ess_ids[..i].contains(id) {
                return Err(ControllerError::configuration(format!(
                    "ESS {id} configured more than once"
                )));
            }
        }
        for contactor in &contactors {
            if !ess_ids.contains(&contactor.ess) {
                return Err(ControllerError::configuration(format!(
                    "contactor [{}] references unknown ESS {}",
                    contactor.address, contactor.ess
                )));
            }
        }
        for id in &ess_ids {
            for bus in Bus::ALL {
                let count = contactors
                    .iter()
                    .filter(|c| &c.ess == id && c.bus == bus)
                    .count();
                if count != 1 {
                    return Err(ControllerError::configuration(format!(
                        "ESS {id} needs exactly one contactor to {bus}, found {count}"
                    )));
                }
            }
        }
        Ok(Self {
            ess_ids,
            contactors,
        })
    }

    pub fn ess_ids(&self) -> &[EssId] {
        &self.ess_ids
    }

    pub fn contactors(&self) -> &[ContactorPort] {
        &self.contactors
    }

    pub fn contactor(&self, ess: &EssId, bus: Bus) -> Option<&ContactorPort> {
        self.contactors
            .iter()
            .find(|c| &c.ess == ess && c.bus == bus)
    }

    /// Maps a SoC ranking onto the buses: highest SoC to Bus1, second to Bus2.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` for fewer than two ids and
    /// `IllegalTopology` if a ranked id is not in the catalog or repeated.
    pub fn assign(&self, ranked: &[EssId]) -> ControllerResult<Topology> {
        let [first, second, ..] = ranked else {
            return Err(ControllerError::InsufficientData {
                readable: ranked.len(),
                required: 2,
            });
        };
        for id in [first, second] {
            if !self.ess_ids.contains(id) {
                return Err(ControllerError::illegal_topology(format!(
                    "ranked ESS {id} is not part of the bus configuration"
                )));
            }
        }
        Assignment::new(first.clone(), second.clone()).map(Topology::Assigned)
    }

    /// Reads every configured contactor.
    pub fn observe<R: PointRegistry + ?Sized>(&self, registry: &R) -> Observation {
        self.contactors
            .iter()
            .fold(Observation::new(), |observation, c| {
                observation.with(c.ess.clone(), c.bus, c.observe(registry))
            })
    }

    /// Whether the field realizes `topology`: both target contactors read
    /// `Closed` and every other configured contactor reads `Open`.
    pub fn is_satisfied(&self, topology: &Topology, observed: &Observation) -> bool {
        let Some(assignment) = topology.assignment() else {
            return false;
        };
        self.contactors.iter().all(|c| {
            let expected = if assignment.connects(&c.ess, c.bus) {
                ContactorState::Closed
            } else {
                ContactorState::Open
            };
            observed.state(&c.ess, c.bus) == expected
        })
    }

    /// Derives the topology the field currently shows.
    ///
    /// Returns `Undefined` unless exactly one contactor is closed on each bus
    /// and the two belong to different ESS.
    pub fn observed_topology(&self, observed: &Observation) -> Topology {
        let closed_on = |bus: Bus| -> Vec<&EssId> {
            self.contactors
                .iter()
                .filter(|c| c.bus == bus && observed.state(&c.ess, bus) == ContactorState::Closed)
                .map(|c| &c.ess)
                .collect()
        };
        match (closed_on(Bus::Bus1).as_slice(), closed_on(Bus::Bus2).as_slice()) {
            ([bus1], [bus2]) => Assignment::new((*bus1).clone(), (*bus2).clone())
                .map(Topology::Assigned)
                .unwrap_or_default(),
            _ => Topology::Undefined,
        }
    }
}
