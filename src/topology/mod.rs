//! Bus topologies and the pure functions that choose one each cycle.

pub mod catalog;
pub mod grid_mode;
pub mod planner;
pub mod ranker;

use std::fmt;

use crate::error::{ControllerError, ControllerResult};
use crate::ess::EssId;

pub use catalog::{Observation, TopologyCatalog};
pub use grid_mode::GridModeAggregator;
pub use planner::TopologyPlanner;
pub use ranker::SocRanker;

/// One of the two supply buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bus {
    Bus1,
    Bus2,
}

impl Bus {
    pub const ALL: [Bus; 2] = [Bus::Bus1, Bus::Bus2];
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bus::Bus1 => write!(f, "BUS1"),
            Bus::Bus2 => write!(f, "BUS2"),
        }
    }
}

/// A legal pairing: one ESS on each bus, never the same ESS twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assignment {
    bus1: EssId,
    bus2: EssId,
}

impl Assignment {
    /// # Errors
    ///
    /// Returns `IllegalTopology` if both buses would be fed by the same ESS.
    pub fn new(bus1: EssId, bus2: EssId) -> ControllerResult<Self> {
        if bus1 == bus2 {
            return Err(ControllerError::illegal_topology(format!(
                "{bus1} cannot feed both buses"
            )));
        }
        Ok(Self { bus1, bus2 })
    }

    pub fn ess_on(&self, bus: Bus) -> &EssId {
        match bus {
            Bus::Bus1 => &self.bus1,
            Bus::Bus2 => &self.bus2,
        }
    }

    /// Whether the contactor `(ess, bus)` is part of this assignment.
    pub fn connects(&self, ess: &EssId, bus: Bus) -> bool {
        self.ess_on(bus) == ess
    }

    /// The two `(ess, bus)` pairs, Bus1 first.
    pub fn pairs(&self) -> [(&EssId, Bus); 2] {
        [(&self.bus1, Bus::Bus1), (&self.bus2, Bus::Bus2)]
    }
}

/// Desired or observed mapping of ESS units onto the buses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    /// Nothing decided yet, or the field does not show a clean pairing.
    #[default]
    Undefined,
    Assigned(Assignment),
}

impl Topology {
    /// Shorthand for `Topology::Assigned(Assignment::new(..)?)`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTopology` if `bus1 == bus2`.
    pub fn assigned(bus1: impl Into<EssId>, bus2: impl Into<EssId>) -> ControllerResult<Self> {
        Assignment::new(bus1.into(), bus2.into()).map(Topology::Assigned)
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Topology::Undefined => None,
            Topology::Assigned(assignment) => Some(assignment),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Topology::Undefined)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Undefined => write!(f, "UNDEFINED"),
            Topology::Assigned(a) => write!(f, "{}->BUS1 {}->BUS2", a.bus1, a.bus2),
        }
    }
}
