//! Weft Host Function Table
//!
//! This crate connects a guest module to its node. It provides:
//!
//! - [`HostLinker`]: the `env` import table, one entry per host function
//! - [`ExecutionContext`]: per-instance state (memory, allocator, transaction
//!   stack, batch verification)
//! - [`HostContext`]: what a host function body works through while it runs
//! - [`imports`]: the exact import names guests link against
//!
//! # Calling Convention
//!
//! Host functions exchange only `i32` values and `i64` spans (offset in the
//! low 32 bits, length in the high 32 bits). Variable-size results are
//! written to a fresh region of guest memory reserved by the host-side
//! allocator; the guest releases it with `ext_allocator_free_version_1`.
//!
//! Any failure inside a host function traps the guest. The trap carries a
//! [`HostTrap`] naming the import, which embedders can recover with
//! [`ExecutionError::host_error`](weft_core::ExecutionError::host_error).
//!
//! # Example
//!
//! ```
//! use weft_capability::CapabilitySet;
//! use weft_core::{InstanceConfig, IntoShared, ModuleLoader, WeftEngine};
//! use weft_host::{ExecutionContext, HostConfig, HostLinker};
//!
//! let engine = WeftEngine::default_engine()?.into_shared();
//! let module = ModuleLoader::new(engine.clone()).load_wat(
//!     r#"(module
//!         (import "env" "ext_allocator_malloc_version_1" (func $malloc (param i32) (result i32)))
//!         (memory (export "memory") 1)
//!         (func (export "alloc") (result i32) (call $malloc (i32.const 16))))"#,
//! )?;
//!
//! let linker = HostLinker::standard(&engine)?;
//! let mut instance = linker.instantiate(
//!     engine,
//!     &module,
//!     ExecutionContext::new(CapabilitySet::in_memory()),
//!     &HostConfig::new(),
//!     InstanceConfig::default(),
//! )?;
//!
//! let ptr: i32 = instance.call("alloc", ())?;
//! assert!(ptr > 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod functions;
pub mod imports;
pub mod linker;
pub mod memory;

pub use config::HostConfig;
pub use context::{HostContext, host_call, host_call_infallible};
pub use error::{HostError, HostResult, HostTrap};
pub use execution::{BatchVerification, ExecutionContext, HostData};
pub use functions::LogLevel;
pub use linker::{HostLinker, ImportResolution};
pub use memory::GuestMemory;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::HostConfig;
    pub use crate::context::{HostContext, host_call, host_call_infallible};
    pub use crate::error::{HostError, HostResult, HostTrap};
    pub use crate::execution::{ExecutionContext, HostData};
    pub use crate::linker::HostLinker;
}
