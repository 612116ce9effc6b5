//! Error types shared by the controllers, the point registry and config loading.

use thiserror::Error;

use crate::ess::EssId;
use crate::points::PointAddress;

/// Result type for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors raised while reading points, planning topologies or starting up.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControllerError {
    /// A single point could not be read or written.
    #[error("unreachable point [{address}]: {reason}")]
    UnreachablePoint {
        address: PointAddress,
        reason: String,
    },

    /// Fewer ESS units than required reported a usable state of charge.
    #[error("insufficient data: {readable} of {required} required SoC values readable")]
    InsufficientData { readable: usize, required: usize },

    /// A value required in strict mode was not available.
    #[error("missing value for {ess}: {what}")]
    MissingValue { ess: EssId, what: &'static str },

    /// The bus/ESS mapping or a referenced component is invalid.
    #[error("configuration error: {what}")]
    Configuration { what: String },

    /// An assignment repeats an ESS or a bus. Indicates a logic defect.
    #[error("illegal topology: {what}")]
    IllegalTopology { what: String },
}

impl ControllerError {
    pub(crate) fn unreachable(address: &PointAddress, reason: impl Into<String>) -> Self {
        Self::UnreachablePoint {
            address: address.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(what: impl Into<String>) -> Self {
        Self::Configuration { what: what.into() }
    }

    pub(crate) fn illegal_topology(what: impl Into<String>) -> Self {
        Self::IllegalTopology { what: what.into() }
    }
}
