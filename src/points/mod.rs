//! Access to the key-addressed point registry: addresses, the registry
//! trait, an in-memory registry, and contactor ports built on top of it.

mod address;
mod contactor;
mod memory;
mod registry;

pub use address::PointAddress;
pub use contactor::{ContactorPort, ContactorState, Operation};
pub use memory::{InMemoryRegistry, PointValue, PointWrite};
pub use registry::PointRegistry;
