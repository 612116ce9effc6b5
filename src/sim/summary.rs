//! Post-hoc summary of a simulation run.

use std::fmt;

use crate::control::CycleAction;
use crate::topology::Topology;

use super::types::CycleRecord;

/// Aggregate figures derived from a complete run.
///
/// Computed from the `Vec<CycleRecord>` so the printed summary always agrees
/// with the exported telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles: usize,
    /// Cycles in which the bus switch controller returned an error.
    pub failed_cycles: usize,
    /// Cycles in which the off-grid guard refused to switch.
    pub held_cycles: usize,
    /// Contactor commands written successfully.
    pub contactor_operations: usize,
    /// Contactor commands whose write failed.
    pub failed_writes: usize,
    /// Cycles in which the bus indication was written.
    pub indication_writes: usize,
    /// Number of times the connected topology changed.
    pub topology_changes: usize,
    pub final_topology: Topology,
}

impl RunSummary {
    pub fn from_records(records: &[CycleRecord]) -> Self {
        let mut summary = Self {
            cycles: records.len(),
            failed_cycles: 0,
            held_cycles: 0,
            contactor_operations: 0,
            failed_writes: 0,
            indication_writes: 0,
            topology_changes: 0,
            final_topology: Topology::Undefined,
        };

        let mut previous = &Topology::Undefined;
        for r in records {
            if r.failed() {
                summary.failed_cycles += 1;
            }
            if r.action == Some(CycleAction::Held) {
                summary.held_cycles += 1;
            }
            summary.contactor_operations += r.commands_issued;
            summary.failed_writes += r.commands_failed;
            if r.indication_applied {
                summary.indication_writes += 1;
            }
            if &r.connected != previous {
                summary.topology_changes += 1;
            }
            previous = &r.connected;
        }
        summary.final_topology = previous.clone();
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Cycles:                {}", self.cycles)?;
        writeln!(f, "Failed cycles:         {}", self.failed_cycles)?;
        writeln!(f, "Held (guard) cycles:   {}", self.held_cycles)?;
        writeln!(
            f,
            "Contactor operations:  {} ({} failed)",
            self.contactor_operations, self.failed_writes
        )?;
        writeln!(f, "Indication writes:     {}", self.indication_writes)?;
        writeln!(f, "Topology changes:      {}", self.topology_changes)?;
        write!(f, "Final topology:        {}", self.final_topology)
    }
}
