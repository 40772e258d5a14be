//! Error types for capability backends.

use thiserror::Error;

use crate::capability::CapabilityId;

/// Errors reported by capability backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The backend does not implement the operation.
    #[error("{capability} backend does not support '{operation}'")]
    Unsupported {
        /// The capability that was asked.
        capability: CapabilityId,
        /// The operation that is missing.
        operation: &'static str,
    },

    /// The arguments were rejected by the backend.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A commit or rollback arrived with no open transaction.
    #[error("No open storage transaction")]
    NoOpenTransaction,

    /// Any other backend failure.
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl CapabilityError {
    /// Shorthand for [`CapabilityError::Unsupported`].
    pub fn unsupported(capability: CapabilityId, operation: &'static str) -> Self {
        Self::Unsupported {
            capability,
            operation,
        }
    }

    /// Whether this error means the operation is not implemented at all.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Result type for capability operations.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
