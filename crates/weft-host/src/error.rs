//! Error types for the host function layer.

use thiserror::Error;
use weft_capability::CapabilityError;
use weft_core::ExecutionError;
use weft_memory::MemoryError;

/// Errors raised by host functions and by linking a guest against them.
#[derive(Debug, Error)]
pub enum HostError {
    /// Guest memory access or allocation failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// A capability backend refused or failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Commit or rollback with no open storage transaction.
    #[error("Storage transaction {operation} without an open transaction")]
    TransactionStackMisuse {
        /// `"commit"` or `"rollback"`.
        operation: &'static str,
    },

    /// Batch verification started twice or finished without being started.
    #[error("Batch verification {operation} out of order")]
    BatchVerifyMisuse {
        /// `"start"` or `"finish"`.
        operation: &'static str,
    },

    /// A host function ran before guest memory was attached.
    #[error("Guest memory is not attached")]
    MemoryNotAttached,

    /// The guest imports something the host does not provide.
    #[error("Unknown import: module='{module}', name='{name}'")]
    UnknownImport {
        /// The import module name.
        module: String,
        /// The import name.
        name: String,
    },

    /// The guest neither imports nor exports a memory.
    #[error("Guest neither imports 'env.memory' nor exports 'memory'")]
    MissingMemory,

    /// A host function name was registered twice.
    #[error("Host function already registered: {name}")]
    DuplicateImport {
        /// The function name.
        name: String,
    },

    /// Wasmtime rejected a registration.
    #[error("Failed to register host function '{name}': {reason}")]
    RegistrationFailed {
        /// The function name.
        name: String,
        /// The reason for failure.
        reason: String,
    },

    /// A SCALE-encoded argument could not be decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Creating or instantiating the guest failed.
    #[error("Instantiation failed: {0}")]
    Instantiation(#[from] ExecutionError),
}

impl From<parity_scale_codec::Error> for HostError {
    fn from(err: parity_scale_codec::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// A host function failure, as it travels through wasmtime to the embedder.
///
/// Names the import that trapped.
#[derive(Debug, Error)]
#[error("Host function '{import}' trapped: {source}")]
pub struct HostTrap {
    /// The import that failed.
    pub import: &'static str,
    /// What went wrong.
    pub source: HostError,
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
