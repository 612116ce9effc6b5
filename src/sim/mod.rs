//! Deterministic site simulator driving the controllers cycle by cycle.

pub mod engine;
pub mod site;
pub mod summary;
pub mod types;

pub use engine::Engine;
pub use site::SimulatedSite;
pub use summary::RunSummary;
pub use types::CycleRecord;
