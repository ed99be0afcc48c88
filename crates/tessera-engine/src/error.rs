use thiserror::Error;

use crate::backend::Capabilities;

/// Errors reported by proxy operations.
///
/// Allocation failures are always surfaced to the caller. Invalid-handle
/// conditions are mostly absorbed into no-ops by the proxy; they only appear
/// where an operation has to hand back a value (layers, readback).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The backend could not allocate a context, surface buffers or a layer.
    ///
    /// Recoverable: the caller may retry after releasing memory elsewhere.
    #[error("allocation failed: {what}")]
    AllocationFailure { what: String },

    /// The context is unset, disabled or destroyed, or the handle is unknown.
    #[error("invalid or destroyed rendering handle")]
    InvalidHandle,

    /// The active backend does not provide the capability.
    #[error("operation requires unsupported capability {0:?}")]
    UnsupportedOperation(Capabilities),
}

impl RenderError {
    pub(crate) fn allocation(what: impl Into<String>) -> Self {
        Self::AllocationFailure { what: what.into() }
    }

    /// Returns `true` when retrying the same call later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AllocationFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allocation_failures_are_recoverable() {
        assert!(RenderError::allocation("surface").is_recoverable());
        assert!(!RenderError::InvalidHandle.is_recoverable());
        assert!(!RenderError::UnsupportedOperation(Capabilities::LAYERS).is_recoverable());
    }

    #[test]
    fn messages_name_the_cause() {
        let e = RenderError::allocation("back buffer 800x600");
        assert_eq!(e.to_string(), "allocation failed: back buffer 800x600");

        let e = RenderError::UnsupportedOperation(Capabilities::LAYER_READBACK);
        assert!(e.to_string().contains("LAYER_READBACK"));
    }
}
