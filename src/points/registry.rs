use crate::error::ControllerResult;
use crate::ess::GridMode;

use super::PointAddress;

/// The telemetry/command bus shared with the rest of the running system.
///
/// Reads return the latest known value (`None` when the point exists but
/// holds no value yet). Writes are queued towards the field; an address that
/// cannot be resolved fails with [`ControllerError::UnreachablePoint`].
///
/// [`ControllerError::UnreachablePoint`]: crate::error::ControllerError::UnreachablePoint
pub trait PointRegistry {
    /// Returns whether a component with the given id is known to the registry.
    fn has_component(&self, id: &str) -> bool;

    fn read_bool(&self, address: &PointAddress) -> ControllerResult<Option<bool>>;

    fn write_bool(&mut self, address: &PointAddress, value: bool) -> ControllerResult<()>;

    fn read_int(&self, address: &PointAddress) -> ControllerResult<Option<i64>>;

    fn read_grid_mode(&self, address: &PointAddress) -> ControllerResult<GridMode>;

    /// Writes an integer output. Digital outputs of the PLC are modelled as
    /// integer 0/1 points.
    fn write_int(&mut self, address: &PointAddress, value: i64) -> ControllerResult<()>;
}
