//! Wall-clock sources injected into the controllers.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current wall-clock time.
pub trait WallClock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so the simulator can advance time while
/// the controller holds its own handle.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use supply_bus_switch::control::clock::{ManualClock, WallClock};
///
/// let clock = ManualClock::new(Utc::now());
/// let handle = clock.clone();
/// let start = handle.now();
///
/// clock.advance(TimeDelta::seconds(5));
/// assert_eq!(handle.now() - start, TimeDelta::seconds(5));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Moves every handle of this clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        self.now.set(self.now.get() + delta);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
