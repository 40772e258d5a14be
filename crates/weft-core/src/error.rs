//! Error types for engine creation, module loading and guest execution.

use std::time::Duration;
use thiserror::Error;

/// Errors during engine creation and configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid engine configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors during module loading and validation.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The bytes are not a valid wasm module.
    #[error("Invalid WASM module: {0}")]
    Invalid(String),

    /// IO error reading the module.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors while instantiating or calling into a guest.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A wasm trap raised by the guest code itself.
    #[error("WASM trap: {0}")]
    Trap(#[from] TrapInfo),

    /// The epoch deadline passed.
    #[error("Execution timeout after {0:?}")]
    Timeout(Duration),

    /// The fuel allowance ran out.
    #[error("Out of fuel: consumed {consumed}, limit was {limit}")]
    OutOfFuel {
        /// Amount of fuel consumed.
        consumed: u64,
        /// The fuel limit that was set.
        limit: u64,
    },

    /// The export does not exist or is not a function of the requested type.
    #[error("Function not found: '{0}'")]
    FunctionNotFound(String),

    /// No module has been instantiated yet.
    #[error("Module not instantiated")]
    NotInstantiated,

    /// A module was already instantiated in this instance.
    #[error("Module already instantiated")]
    AlreadyInstantiated,

    /// Any other wasmtime error, including errors raised by host functions.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

impl ExecutionError {
    /// The host function error carried by this failure, if it is one of
    /// type `E`.
    pub fn host_error<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Wasmtime(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Information about a wasm trap.
#[derive(Debug, Clone)]
pub struct TrapInfo {
    /// The trap code name, if available.
    pub code: Option<String>,
    /// Human-readable trap message.
    pub message: String,
}

impl std::fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] {}", code, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for TrapInfo {}

impl From<wasmtime::Trap> for TrapInfo {
    fn from(trap: wasmtime::Trap) -> Self {
        Self {
            code: Some(format!("{trap:?}")),
            message: trap.to_string(),
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for module operations.
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// Result type alias for execution operations.
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
