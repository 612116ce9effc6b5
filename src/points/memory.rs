use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{ControllerError, ControllerResult};
use crate::ess::GridMode;

use super::{PointAddress, PointRegistry};

/// A value written to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointValue {
    Bool(bool),
    Int(i64),
}

/// One successful write, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointWrite {
    pub address: PointAddress,
    pub value: PointValue,
}

/// Registry that keeps every point in memory.
///
/// Used by the site simulator and by tests. Writes apply immediately and are
/// appended to a write log. Individual addresses can be marked unreachable
/// to emulate a field-bus fault, or read-only to emulate a stuck output.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    components: BTreeSet<String>,
    bools: HashMap<PointAddress, Option<bool>>,
    ints: HashMap<PointAddress, Option<i64>>,
    grid_modes: HashMap<PointAddress, GridMode>,
    unreachable: HashSet<PointAddress>,
    read_only: HashSet<PointAddress>,
    writes: Vec<PointWrite>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component without any points.
    pub fn add_component(&mut self, id: &str) {
        self.components.insert(id.to_string());
    }

    /// Sets (or clears) a boolean point without logging a write.
    pub fn set_bool(&mut self, address: &PointAddress, value: Option<bool>) {
        self.components.insert(address.component().to_string());
        self.bools.insert(address.clone(), value);
    }

    /// Sets (or clears) an integer point without logging a write.
    pub fn set_int(&mut self, address: &PointAddress, value: Option<i64>) {
        self.components.insert(address.component().to_string());
        self.ints.insert(address.clone(), value);
    }

    pub fn set_grid_mode(&mut self, address: &PointAddress, mode: GridMode) {
        self.components.insert(address.component().to_string());
        self.grid_modes.insert(address.clone(), mode);
    }

    /// Marks an address as unreachable (or reachable again).
    pub fn set_unreachable(&mut self, address: &PointAddress, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(address.clone());
        } else {
            self.unreachable.remove(address);
        }
    }

    /// Makes writes to an address fail while reads keep working.
    pub fn set_read_only(&mut self, address: &PointAddress, read_only: bool) {
        if read_only {
            self.read_only.insert(address.clone());
        } else {
            self.read_only.remove(address);
        }
    }

    pub fn bool_value(&self, address: &PointAddress) -> Option<bool> {
        self.bools.get(address).copied().flatten()
    }

    pub fn int_value(&self, address: &PointAddress) -> Option<i64> {
        self.ints.get(address).copied().flatten()
    }

    /// All writes issued since construction or the last [`clear_writes`](Self::clear_writes).
    pub fn writes(&self) -> &[PointWrite] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    fn check_reachable(&self, address: &PointAddress) -> ControllerResult<()> {
        if self.unreachable.contains(address) {
            return Err(ControllerError::unreachable(address, "point is unreachable"));
        }
        if !self.components.contains(address.component()) {
            return Err(ControllerError::unreachable(
                address,
                format!("unknown component \"{}\"", address.component()),
            ));
        }
        Ok(())
    }

    fn check_writable(&self, address: &PointAddress) -> ControllerResult<()> {
        self.check_reachable(address)?;
        if self.read_only.contains(address) {
            return Err(ControllerError::unreachable(address, "output rejects writes"));
        }
        Ok(())
    }
}

impl PointRegistry for InMemoryRegistry {
    fn has_component(&self, id: &str) -> bool {
        self.components.contains(id)
    }

    fn read_bool(&self, address: &PointAddress) -> ControllerResult<Option<bool>> {
        self.check_reachable(address)?;
        self.bools
            .get(address)
            .copied()
            .ok_or_else(|| ControllerError::unreachable(address, "no such boolean point"))
    }

    fn write_bool(&mut self, address: &PointAddress, value: bool) -> ControllerResult<()> {
        self.check_writable(address)?;
        self.bools.insert(address.clone(), Some(value));
        self.writes.push(PointWrite {
            address: address.clone(),
            value: PointValue::Bool(value),
        });
        Ok(())
    }

    fn read_int(&self, address: &PointAddress) -> ControllerResult<Option<i64>> {
        self.check_reachable(address)?;
        self.ints
            .get(address)
            .copied()
            .ok_or_else(|| ControllerError::unreachable(address, "no such integer point"))
    }

    fn read_grid_mode(&self, address: &PointAddress) -> ControllerResult<GridMode> {
        self.check_reachable(address)?;
        self.grid_modes
            .get(address)
            .copied()
            .ok_or_else(|| ControllerError::unreachable(address, "no such grid mode point"))
    }

    fn write_int(&mut self, address: &PointAddress, value: i64) -> ControllerResult<()> {
        self.check_writable(address)?;
        self.ints.insert(address.clone(), Some(value));
        self.writes.push(PointWrite {
            address: address.clone(),
            value: PointValue::Int(value),
        });
        Ok(())
    }
}
