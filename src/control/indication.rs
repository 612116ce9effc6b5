//! Rate limiting of the "supply bus on" indication outputs.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info};

use crate::points::{Operation, PointAddress, PointRegistry};

/// Seconds the relays need between two indication switches.
pub const DEFAULT_INDICATION_HOLD_OFF_SECS: i64 = 10;

/// Writes the bus-energized indication for both buses, at most once per
/// hold-off window.
#[derive(Debug, Clone)]
pub struct BusIndicationDebouncer {
    bus1: PointAddress,
    bus2: PointAddress,
    hold_off: TimeDelta,
    last_switch: Option<DateTime<Utc>>,
}

impl BusIndicationDebouncer {
    pub fn new(bus1: PointAddress, bus2: PointAddress, hold_off: TimeDelta) -> Self {
        Self {
            bus1,
            bus2,
            hold_off,
            last_switch: None,
        }
    }

    /// Time of the last applied switch, if any.
    pub fn last_switch(&self) -> Option<DateTime<Utc>> {
        self.last_switch
    }

    /// Writes `operation` to both indication points unless the previous
    /// switch is less than the hold-off ago. Returns whether it was applied.
    ///
    /// Write failures are logged; the switch still counts as applied.
    pub fn maybe_signal<R: PointRegistry + ?Sized>(
        &mut self,
        registry: &mut R,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(last) = self.last_switch {
            // a window ending past the representable range never ends
            let holding = last
                .checked_add_signed(self.hold_off)
                .is_none_or(|until| now < until);
            if holding {
                debug!(%operation, "indication switched {}s ago, waiting", (now - last).num_seconds());
                return false;
            }
        }
        self.last_switch = Some(now);

        let value = operation.as_int();
        for address in [&self.bus1, &self.bus2] {
            match registry.write_int(address, value) {
                Ok(()) => info!("set supply bus indication [{address}] {operation}"),
                Err(err) => error!("unable to set supply bus indication [{address}]: {err}"),
            }
        }
        true
    }
}
