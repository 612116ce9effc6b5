//! Per-cycle controllers and the pieces they drive.

pub mod bus_switch;
pub mod clock;
pub mod indication;
pub mod loads;
pub mod sequencer;

pub use bus_switch::{BusSwitchController, BusSwitchSettings, CycleAction, CycleOutcome};
pub use clock::{ManualClock, SystemClock, WallClock};
pub use indication::{BusIndicationDebouncer, DEFAULT_INDICATION_HOLD_OFF_SECS};
pub use loads::{LoadCoordinator, LoadReport};
pub use sequencer::{SwitchCommand, SwitchReport, SwitchSequencer};

use crate::error::ControllerResult;
use crate::points::PointRegistry;

/// A controller invoked once per scheduler cycle.
///
/// Implementations hold their own decision state and are not reentrant.
pub trait Controller {
    /// What a successful cycle reports back to the scheduler.
    type Outcome;

    fn id(&self) -> &str;

    /// Runs one cycle against `registry`.
    fn run<R: PointRegistry + ?Sized>(&mut self, registry: &mut R)
    -> ControllerResult<Self::Outcome>;
}
