use std::fmt;

use tracing::{info, warn};

use crate::error::ControllerResult;
use crate::ess::EssId;
use crate::topology::Bus;

use super::{PointAddress, PointRegistry};

/// Observed state of a contactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactorState {
    Closed,
    Open,
    /// The point is unset or could not be read.
    Unknown,
}

impl fmt::Display for ContactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactorState::Closed => write!(f, "CLOSED"),
            ContactorState::Open => write!(f, "OPEN"),
            ContactorState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Command for a contactor or a two-state indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Close,
    Open,
}

impl Operation {
    /// Integer representation used by indication and PLC outputs.
    pub fn as_int(self) -> i64 {
        match self {
            Operation::Close => 1,
            Operation::Open => 0,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Close => write!(f, "CLOSE"),
            Operation::Open => write!(f, "OPEN"),
        }
    }
}

/// A physical breaker connecting one ESS to one bus, backed by a boolean point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactorPort {
    pub ess: EssId,
    pub bus: Bus,
    pub address: PointAddress,
}

impl ContactorPort {
    pub fn new(ess: EssId, bus: Bus, address: PointAddress) -> Self {
        Self { ess, bus, address }
    }

    /// Reads the contactor feedback. Never fails: unreadable points are `Unknown`.
    pub fn observe<R: PointRegistry + ?Sized>(&self, registry: &R) -> ContactorState {
        match registry.read_bool(&self.address) {
            Ok(Some(true)) => ContactorState::Closed,
            Ok(Some(false)) => ContactorState::Open,
            Ok(None) => ContactorState::Unknown,
            Err(err) => {
                warn!(ess = %self.ess, bus = %self.bus, "unable to read contactor: {err}");
                ContactorState::Unknown
            }
        }
    }

    /// Writes the command to the contactor point.
    ///
    /// # Errors
    ///
    /// Returns `UnreachablePoint` if the registry rejects the write.
    pub fn command<R: PointRegistry + ?Sized>(
        &self,
        registry: &mut R,
        operation: Operation,
    ) -> ControllerResult<()> {
        registry.write_bool(&self.address, operation == Operation::Close)?;
        info!(
            ess = %self.ess,
            bus = %self.bus,
            "set output [{}] {operation}",
            self.address
        );
        Ok(())
    }
}
