//! Enabling and disabling the downstream loads behind the PLC.

use tracing::{error, info};

use crate::points::{PointAddress, PointRegistry};

/// Result of one [`LoadCoordinator::set_loads`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub written: usize,
    /// Points that already held the requested value.
    pub unchanged: usize,
    pub failed: usize,
}

/// Writes a fixed, ordered list of PLC load-enable points.
#[derive(Debug, Clone)]
pub struct LoadCoordinator {
    loads: Vec<PointAddress>,
}

impl LoadCoordinator {
    pub fn new(loads: Vec<PointAddress>) -> Self {
        Self { loads }
    }

    /// Sets every load point to 1 (`enabled`) or 0.
    ///
    /// Points already at the value are left alone. A failing point is logged
    /// and the batch continues.
    pub fn set_loads<R: PointRegistry + ?Sized>(&self, registry: &mut R, enabled: bool) -> LoadReport {
        let value = i64::from(enabled);
        let mut report = LoadReport::default();
        for address in &self.loads {
            if let Ok(Some(current)) = registry.read_int(address) {
                if current == value {
                    report.unchanged += 1;
                    continue;
                }
            }
            match registry.write_int(address, value) {
                Ok(()) => {
                    info!("set output [{address}] value [{value}]");
                    report.written += 1;
                }
                Err(err) => {
                    error!("unable to set output [{address}]: {err}");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
