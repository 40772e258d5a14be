//! Weft Core - engine, modules and guest instances
//!
//! This crate wraps wasmtime for the rest of the workspace:
//!
//! - [`WeftEngine`]: the shared engine, configured for deterministic execution
//! - [`ModuleLoader`]: compiles guest modules and records their imports and exports
//! - [`GuestInstance`]: one store plus one instantiated module, with fuel and
//!   epoch limits and per-call metrics
//! - [`EpochTicker`]: advances the engine epoch so timeouts fire
//!
//! Host functions and memory management live in `weft-host` and
//! `weft-memory`; this crate knows nothing about the guest ABI.
//!
//! # Quick Start
//!
//! ```
//! use weft_core::prelude::*;
//!
//! let engine = WeftEngine::default_engine().unwrap().into_shared();
//! let module = ModuleLoader::new(engine.clone())
//!     .load_wat(r#"(module (func (export "double") (param i32) (result i32)
//!         local.get 0 i32.const 2 i32.mul))"#)
//!     .unwrap();
//!
//! let mut instance = InstanceBuilder::new(engine).with_fuel_limit(1_000_000).build(()).unwrap();
//! instance.instantiate(&module).unwrap();
//! let doubled: i32 = instance.call("double", (21i32,)).unwrap();
//! assert_eq!(doubled, 42);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod instance;
pub mod module;
pub mod ticker;

pub use config::{EngineConfig, InstanceConfig, ResourceLimits};
pub use engine::{IntoShared, SharedEngine, WeftEngine};
pub use error::{
    EngineError, EngineResult, ExecutionError, ExecutionResult, ModuleError, ModuleResult,
    TrapInfo,
};
pub use instance::{GuestInstance, InstanceBuilder, InstanceData, InstanceId, InstanceMetrics};
pub use module::{
    ExportInfo, ExportKind, ImportInfo, ImportKind, MemoryInfo, ModuleLoader, ModuleMetadata,
    ValidatedModule,
};
pub use ticker::{EpochTicker, EPOCH_TICK};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{EngineConfig, InstanceConfig, ResourceLimits};
    pub use crate::engine::{IntoShared, SharedEngine, WeftEngine};
    pub use crate::error::{ExecutionError, ModuleError};
    pub use crate::instance::{GuestInstance, InstanceBuilder, InstanceId};
    pub use crate::module::{ModuleLoader, ValidatedModule};
}
