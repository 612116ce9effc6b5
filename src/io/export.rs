//! CSV export for simulated cycle records.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::CycleRecord;

/// Column header for CSV telemetry export.
const HEADER: &str = "cycle,time,grid_mode,action,target,connected,commands_issued,\
                       commands_failed,indication_applied,loads_written,\
                       balancing_setpoint_w,soc,error";

/// Exports cycle records to a CSV file at the given path.
///
/// Writes a header row followed by one data row per cycle. Produces
/// deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[CycleRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes cycle records as CSV to any writer.
///
/// SoC values are joined with `;` in configuration order. Optional columns
/// are left empty.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[CycleRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        let soc: Vec<String> = r.soc.iter().map(|s| format!("{s:.2}")).collect();
        wtr.write_record(&[
            r.cycle.to_string(),
            r.time.to_rfc3339(),
            r.grid_mode.to_string(),
            r.action.map(|a| a.to_string()).unwrap_or_default(),
            r.target.to_string(),
            r.connected.to_string(),
            r.commands_issued.to_string(),
            r.commands_failed.to_string(),
            r.indication_applied.to_string(),
            r.loads_written.to_string(),
            r.balancing_setpoint_w
                .map(|w| w.to_string())
                .unwrap_or_default(),
            soc.join(";"),
            r.error.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
