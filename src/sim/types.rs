//! Per-cycle simulator records.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::control::{CycleAction, CycleOutcome};
use crate::ess::GridMode;
use crate::topology::Topology;

/// Complete record of one simulated controller cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    /// Cycle index.
    pub cycle: usize,
    /// Controller clock at the start of the cycle.
    pub time: DateTime<Utc>,
    pub grid_mode: GridMode,
    /// `None` when the bus switch cycle failed.
    pub action: Option<CycleAction>,
    /// Topology decided or acted upon; `Undefined` after a failed cycle.
    pub target: Topology,
    /// Topology shown by the contactors after the cycle.
    pub connected: Topology,
    pub commands_issued: usize,
    pub commands_failed: usize,
    pub indication_applied: bool,
    pub loads_written: usize,
    /// Setpoint written by the balancing controller (W).
    pub balancing_setpoint_w: Option<i64>,
    /// SoC per ESS in configuration order (percent).
    pub soc: Vec<f64>,
    /// Error returned by a failed bus switch cycle.
    pub error: Option<String>,
}

impl CycleRecord {
    /// A record with nothing acted upon; filled from the cycle outcome by
    /// [`CycleRecord::with_outcome`].
    pub fn new(cycle: usize, time: DateTime<Utc>, grid_mode: GridMode) -> Self {
        Self {
            cycle,
            time,
            grid_mode,
            action: None,
            target: Topology::Undefined,
            connected: Topology::Undefined,
            commands_issued: 0,
            commands_failed: 0,
            indication_applied: false,
            loads_written: 0,
            balancing_setpoint_w: None,
            soc: Vec::new(),
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: CycleOutcome) -> Self {
        self.grid_mode = outcome.grid_mode;
        self.action = Some(outcome.action);
        self.target = outcome.target;
        self.commands_issued = outcome.switching.issued.len();
        self.commands_failed = outcome.switching.failed.len();
        self.indication_applied = outcome.indication_applied;
        self.loads_written = outcome.loads.written;
        self
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for CycleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = self
            .action
            .map_or_else(|| "failed".to_string(), |a| a.to_string());
        let soc: Vec<String> = self.soc.iter().map(|s| format!("{s:.1}")).collect();
        write!(
            f,
            "c={:>3} {} | {:<9} {:<11} | target={}  connected={} | cmds={} (failed {}) ind={} loads={} | SoC=[{}]",
            self.cycle,
            self.time.format("%H:%M:%S"),
            self.grid_mode.to_string(),
            action,
            self.target,
            self.connected,
            self.commands_issued,
            self.commands_failed,
            self.indication_applied,
            self.loads_written,
            soc.join(" "),
        )?;
        if let Some(setpoint) = self.balancing_setpoint_w {
            write!(f, " set={setpoint} W")?;
        }
        if let Some(err) = &self.error {
            write!(f, " error: {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_display_mentions_error() {
        let mut r = CycleRecord::new(3, DateTime::<Utc>::UNIX_EPOCH, GridMode::OnGrid);
        r.error = Some("insufficient data".to_string());
        r.soc = vec![4.0, 80.5];
        let s = r.to_string();
        assert!(s.contains("failed"));
        assert!(s.contains("insufficient data"));
        assert!(s.contains("80.5"));
        assert!(r.failed());
    }
}
