use tracing::info;

use crate::error::ControllerResult;
use crate::ess::EssUnit;

use super::{SocRanker, Topology, TopologyCatalog};

/// Chooses the desired topology for the current cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyPlanner {
    ranker: SocRanker,
}

impl TopologyPlanner {
    pub fn new(ranker: SocRanker) -> Self {
        Self { ranker }
    }

    /// Ranks `units` by SoC and maps the two best onto the buses.
    ///
    /// Deterministic: identical readings always give the same topology.
    ///
    /// # Errors
    ///
    /// Propagates ranking errors (`InsufficientData`, `MissingValue`).
    pub fn plan(&self, catalog: &TopologyCatalog, units: &[EssUnit]) -> ControllerResult<Topology> {
        let ranked = self.ranker.rank(units)?;
        let topology = catalog.assign(&ranked)?;
        info!(%topology, "planned topology from SoC ranking");
        Ok(topology)
    }
}
