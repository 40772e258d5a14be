//! # Weft - Host Runtime for State-Transition Guests
//!
//! Weft runs a blockchain node's state-transition logic, compiled to
//! WebAssembly, against node resources the guest can only reach through a
//! fixed table of host functions.
//!
//! ## Features
//!
//! - **Fixed import table**: 55 `env` functions for storage, crypto, hashing,
//!   off-chain work and nested sandboxes, checked before any guest code runs
//! - **Host-managed heap**: the guest has no allocator; the host reserves
//!   regions of guest memory for every variable-size result
//! - **Pluggable backends**: storage, keystore and off-chain facilities are
//!   trait objects chosen when the runtime is built
//! - **Deterministic execution**: fuel metering, no SIMD or threads, and
//!   canonical NaNs
//!
//! ## Quick Start
//!
//! ```
//! use weft::prelude::*;
//!
//! let runtime = Weft::builder()
//!     .with_fuel_limit(10_000_000)
//!     .with_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let module = runtime.load_wat(
//!     r#"(module
//!         (memory (export "memory") 1)
//!         (func (export "echo") (param i32 i32) (result i64)
//!             (i64.or
//!                 (i64.extend_i32_u (local.get 0))
//!                 (i64.shl (i64.extend_i32_u (local.get 1)) (i64.const 32)))))"#,
//! )?;
//!
//! let mut instance = runtime.instantiate(&module)?;
//! assert_eq!(instance.call("echo", b"block")?, b"block");
//! # Ok::<(), weft::WeftError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Node / CLI                        │
//! ├─────────────────────────────────────────────────────────┤
//! │                      weft (facade)                      │
//! │                    ┌─────────────────┐                  │
//! │                    │  Weft Builder   │                  │
//! │                    └────────┬────────┘                  │
//! │                             │                           │
//! │  ┌────────────┬─────────────┴───┬──────────────────┐    │
//! │  │ weft-host  │ weft-capability │ weft-memory      │    │
//! │  │ (imports,  │ (backends)      │ (spans, heap     │    │
//! │  │  context)  │                 │  allocator)      │    │
//! │  └────────────┴─────────────────┴──────────────────┘    │
//! │                 weft-core (engine, instance)            │
//! ├─────────────────────────────────────────────────────────┤
//! │                       Wasmtime                          │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use weft_capability::{
    CapabilitySet, CapabilitySetBuilder, Crypto, Hashing, Misc, NestedSandbox, Offchain, Storage,
};
use weft_core::{
    EngineConfig, EpochTicker, ExecutionError, GuestInstance, InstanceConfig, InstanceMetrics,
    ModuleLoader, ResourceLimits, SharedEngine, ValidatedModule, WeftEngine,
};
use weft_host::{ExecutionContext, HostConfig, HostError, HostLinker, HostTrap, ImportResolution};
use weft_memory::{MemoryError, MemoryView, Span};

// Re-export from sub-crates
pub use weft_capability;
pub use weft_core;
pub use weft_host;
pub use weft_memory;

/// Main entry point for Weft.
pub struct Weft;

impl Weft {
    /// Create a new runtime builder.
    pub fn builder() -> WeftBuilder {
        WeftBuilder::new()
    }

    /// Create a runtime with default configuration and in-memory backends.
    pub fn with_defaults() -> Result<WeftRuntime, WeftError> {
        WeftBuilder::new().build()
    }
}

/// Builder for configuring the runtime.
pub struct WeftBuilder {
    engine_config: EngineConfig,
    resource_limits: ResourceLimits,
    host_config: HostConfig,
    capabilities: CapabilitySetBuilder,
}

impl WeftBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            engine_config: EngineConfig::deterministic(),
            resource_limits: ResourceLimits::default(),
            host_config: HostConfig::default(),
            capabilities: CapabilitySetBuilder::new(),
        }
    }

    // Engine configuration

    /// Replace the engine configuration.
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Enable or disable fuel metering.
    pub fn with_fuel_metering(mut self, enabled: bool) -> Self {
        self.engine_config.fuel_enabled = enabled;
        self
    }

    /// Enable or disable debug info.
    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.engine_config.debug_info = enabled;
        self
    }

    // Resource limits

    /// Set the maximum memory limit in bytes.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.resource_limits.max_memory_bytes = bytes;
        self
    }

    /// Set the fuel each instance starts with.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.resource_limits.initial_fuel = fuel;
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.resource_limits.timeout = timeout;
        self
    }

    /// Set custom resource limits.
    pub fn with_resource_limits(mut self, limits: ResourceLimits) -> Self {
        self.resource_limits = limits;
        self
    }

    // Guest memory

    /// Start the host-managed heap at `heap_base` instead of the guest's
    /// `__heap_base`.
    pub fn with_heap_base(mut self, heap_base: u32) -> Self {
        self.host_config = self.host_config.with_heap_base(heap_base);
        self
    }

    /// Replace the host configuration.
    pub fn with_host_config(mut self, config: HostConfig) -> Self {
        self.host_config = config;
        self
    }

    // Capabilities

    /// Use this storage backend.
    pub fn with_storage(mut self, storage: impl Storage + 'static) -> Self {
        self.capabilities = self.capabilities.with_storage(storage);
        self
    }

    /// Use a storage backend the caller keeps a handle to.
    pub fn with_shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.capabilities = self.capabilities.with_shared_storage(storage);
        self
    }

    /// Use this keystore and signature backend.
    pub fn with_crypto(mut self, crypto: impl Crypto + 'static) -> Self {
        self.capabilities = self.capabilities.with_crypto(crypto);
        self
    }

    /// Use this hashing backend.
    pub fn with_hashing(mut self, hashing: impl Hashing + 'static) -> Self {
        self.capabilities = self.capabilities.with_hashing(hashing);
        self
    }

    /// Use this off-chain backend.
    pub fn with_offchain(mut self, offchain: impl Offchain + 'static) -> Self {
        self.capabilities = self.capabilities.with_offchain(offchain);
        self
    }

    /// Use an off-chain backend the caller keeps a handle to.
    pub fn with_shared_offchain(mut self, offchain: Arc<dyn Offchain>) -> Self {
        self.capabilities = self.capabilities.with_shared_offchain(offchain);
        self
    }

    /// Use this nested sandbox backend.
    pub fn with_sandbox(mut self, sandbox: impl NestedSandbox + 'static) -> Self {
        self.capabilities = self.capabilities.with_sandbox(sandbox);
        self
    }

    /// Use this backend for miscellaneous queries.
    pub fn with_misc(mut self, misc: impl Misc + 'static) -> Self {
        self.capabilities = self.capabilities.with_misc(misc);
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Result<WeftRuntime, WeftError> {
        let engine = Arc::new(WeftEngine::new(self.engine_config)?);
        let linker = HostLinker::standard(&engine)?;
        let capabilities = self.capabilities.build();
        let ticker = if engine.epoch_enabled() {
            Some(EpochTicker::start(engine.clone())?)
        } else {
            None
        };

        // Host-created memories never exceed the per-instance memory limit.
        let limit_pages = self.resource_limits.max_memory_pages().min(u32::MAX as u64) as u32;
        let host_config = if self.host_config.max_memory_pages > limit_pages {
            self.host_config.with_max_memory_pages(limit_pages)
        } else {
            self.host_config
        };

        info!(
            host_functions = linker.registered_functions().len(),
            max_memory_pages = host_config.max_memory_pages,
            "Weft runtime ready"
        );

        Ok(WeftRuntime {
            engine,
            limits: self.resource_limits,
            host_config,
            capabilities,
            linker,
            _ticker: ticker,
        })
    }
}

impl Default for WeftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured runtime. Cheap to share between threads.
pub struct WeftRuntime {
    engine: SharedEngine,
    limits: ResourceLimits,
    host_config: HostConfig,
    capabilities: CapabilitySet,
    linker: HostLinker,
    _ticker: Option<EpochTicker>,
}

impl WeftRuntime {
    /// Get a reference to the engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Limits applied to every instance.
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Heap and memory settings applied to every instance.
    pub fn host_config(&self) -> &HostConfig {
        &self.host_config
    }

    /// The backends handed to every instance.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// The host function table.
    pub fn linker(&self) -> &HostLinker {
        &self.linker
    }

    /// Create a module loader.
    pub fn loader(&self) -> ModuleLoader {
        ModuleLoader::new(Arc::clone(&self.engine))
    }

    /// Load a module from bytes and check its imports.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<ValidatedModule, WeftError> {
        let module = self.loader().load_bytes(bytes)?;
        self.check_imports(&module)?;
        Ok(module)
    }

    /// Load a module from a file and check its imports.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ValidatedModule, WeftError> {
        let module = self.loader().load_file(path.as_ref())?;
        self.check_imports(&module)?;
        Ok(module)
    }

    /// Load a module from WAT text format and check its imports.
    pub fn load_wat(&self, wat: &str) -> Result<ValidatedModule, WeftError> {
        let module = self.loader().load_wat(wat)?;
        self.check_imports(&module)?;
        Ok(module)
    }

    /// Fail if `module` imports anything outside the host table or has no
    /// usable memory.
    pub fn check_imports(&self, module: &ValidatedModule) -> Result<(), WeftError> {
        self.linker.check_module(module)?;
        Ok(())
    }

    /// How each import of `module` would be satisfied.
    pub fn resolve_imports<'m>(
        &self,
        module: &'m ValidatedModule,
    ) -> Vec<(&'m weft_core::ImportInfo, ImportResolution)> {
        module
            .imports()
            .iter()
            .map(|import| (import, self.linker.resolve(import)))
            .collect()
    }

    /// Instantiate `module` with the runtime's backends.
    pub fn instantiate(&self, module: &ValidatedModule) -> Result<RuntimeInstance, WeftError> {
        self.instantiate_with(module, self.capabilities.clone())
    }

    /// Instantiate `module` with a different set of backends.
    pub fn instantiate_with(
        &self,
        module: &ValidatedModule,
        capabilities: CapabilitySet,
    ) -> Result<RuntimeInstance, WeftError> {
        let config = InstanceConfig::default().with_limits(self.limits.clone());
        let inner = self.linker.instantiate(
            Arc::clone(&self.engine),
            module,
            ExecutionContext::new(capabilities),
            &self.host_config,
            config,
        )?;
        Ok(RuntimeInstance { inner })
    }
}

impl std::fmt::Debug for WeftRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeftRuntime")
            .field("limits", &self.limits)
            .field("host_config", &self.host_config)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// An instantiated guest with memory attached.
pub struct RuntimeInstance {
    inner: GuestInstance<ExecutionContext>,
}

impl RuntimeInstance {
    /// Call an entry point.
    ///
    /// `input` is copied into a fresh heap region and the entry is called as
    /// `(ptr: i32, len: i32) -> i64`. The returned span is copied out. The
    /// guest owns the input region afterwards.
    ///
    /// Fails if the entry returns with a storage transaction or a batch
    /// verification still open.
    pub fn call(&mut self, entry: &str, input: &[u8]) -> Result<Vec<u8>, WeftError> {
        let len = u32::try_from(input.len()).map_err(|_| MemoryError::OutOfMemory {
            requested: input.len() as u64,
        })?;
        let ptr = self.place_input(input, len)?;
        debug!(entry, ptr, len, "Calling entry point");

        let returned: i64 = self.inner.call(entry, (ptr as i32, len as i32))?;

        let execution = self.inner.state();
        if execution.transaction_depth() > 0 {
            return Err(WeftError::OpenTransactions {
                depth: execution.transaction_depth(),
            });
        }
        if execution.batch().is_some() {
            return Err(WeftError::OpenBatchVerification);
        }

        let span = Span::from_wasm(returned);
        self.read_span(span)
    }

    fn place_input(&mut self, input: &[u8], len: u32) -> Result<u32, WeftError> {
        let allocator = self.inner.state().allocator()?;
        let memory = self.inner.state().memory()?;
        let mut view = weft_host::GuestMemory::new(memory, self.inner.store_mut());
        let ptr = allocator.lock().allocate(&mut view, len)?;
        view.write(ptr, input)?;
        Ok(ptr)
    }

    fn read_span(&mut self, span: Span) -> Result<Vec<u8>, WeftError> {
        let memory = self.inner.state().memory()?;
        let view = weft_host::GuestMemory::new(memory, self.inner.store_mut());
        Ok(view.read(span)?.to_vec())
    }

    /// Call any export with typed parameters and results.
    pub fn call_export<P, R>(&mut self, name: &str, params: P) -> Result<R, WeftError>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        Ok(self.inner.call(name, params)?)
    }

    /// Copy `len` bytes of guest memory starting at `offset`.
    pub fn read_memory(&mut self, offset: u32, len: u32) -> Result<Vec<u8>, WeftError> {
        self.read_span(Span::new(offset, len))
    }

    /// Write `bytes` into guest memory at `offset`.
    pub fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> Result<(), WeftError> {
        let memory = self.inner.state().memory()?;
        let mut view = weft_host::GuestMemory::new(memory, self.inner.store_mut());
        view.write(offset, bytes)?;
        Ok(())
    }

    /// The instance's host state.
    pub fn execution(&self) -> &ExecutionContext {
        self.inner.state()
    }

    /// Execution metrics.
    pub fn metrics(&self) -> &InstanceMetrics {
        self.inner.metrics()
    }

    /// Fuel left, if metering is on.
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.inner.remaining_fuel()
    }

    /// The underlying instance.
    pub fn inner(&self) -> &GuestInstance<ExecutionContext> {
        &self.inner
    }

    /// The underlying instance, mutably.
    pub fn inner_mut(&mut self) -> &mut GuestInstance<ExecutionContext> {
        &mut self.inner
    }
}

impl std::fmt::Debug for RuntimeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeInstance")
            .field("inner", &self.inner)
            .field("execution", self.execution())
            .finish()
    }
}

/// Errors from the Weft runtime.
#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    /// Engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] weft_core::EngineError),

    /// Module error.
    #[error("Module error: {0}")]
    Module(#[from] weft_core::ModuleError),

    /// Execution error, including host traps.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Import checking or instance setup failed.
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Guest memory access from the embedder failed.
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// The entry point returned inside a storage transaction.
    #[error("Entry point returned with {depth} storage transaction(s) open")]
    OpenTransactions {
        /// Number of unclosed transactions.
        depth: usize,
    },

    /// The entry point returned inside a batch verification.
    #[error("Entry point returned with a batch verification open")]
    OpenBatchVerification,
}

impl WeftError {
    /// The host function failure behind this error, if a host call trapped.
    pub fn host_trap(&self) -> Option<&HostTrap> {
        match self {
            Self::Execution(err) => err.host_error::<HostTrap>(),
            Self::Host(HostError::Instantiation(err)) => err.host_error::<HostTrap>(),
            _ => None,
        }
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{RuntimeInstance, Weft, WeftBuilder, WeftError, WeftRuntime};

    // Core types
    pub use weft_core::{EngineConfig, ModuleLoader, ResourceLimits, ValidatedModule, WeftEngine};

    // Capability types
    pub use weft_capability::builtin::{
        DefaultHashing, KnownRuntimeVersions, MemoryKeystore, MemoryOffchain, MemoryStorage,
        UnsupportedSandbox,
    };
    pub use weft_capability::{
        CapabilitySet, CapabilitySetBuilder, Crypto, Hashing, Misc, NestedSandbox, Offchain,
        Storage,
    };

    // Host types
    pub use weft_host::{ExecutionContext, HostConfig, HostError, HostTrap};

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::Duration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parity_scale_codec::Encode;
    use weft_capability::builtin::{MemoryStorage, blake2_256};
    use weft_host::imports::STORAGE_COMMIT_TRANSACTION;

    const GUEST: &str = r#"
        (module
            (import "env" "memory" (memory 2))
            (import "env" "ext_storage_set_version_1" (func $set (param i64 i64)))
            (import "env" "ext_storage_get_version_1" (func $get (param i64) (result i64)))
            (import "env" "ext_storage_start_transaction_version_1" (func $start))
            (import "env" "ext_storage_commit_transaction_version_1" (func $commit))
            (import "env" "ext_storage_rollback_transaction_version_1" (func $rollback))
            (import "env" "ext_hashing_blake2_256_version_1" (func $blake2 (param i64) (result i32)))
            (global (export "__heap_base") i32 (i32.const 1024))
            ;; storage key "key" lives at 16
            (data (i32.const 16) "key")

            (func $span (param $ptr i32) (param $len i32) (result i64)
                (i64.or
                    (i64.extend_i32_u (local.get $ptr))
                    (i64.shl (i64.extend_i32_u (local.get $len)) (i64.const 32))))

            (func (export "echo") (param i32 i32) (result i64)
                (call $span (local.get 0) (local.get 1)))
            (func (export "hash") (param i32 i32) (result i64)
                (call $span
                    (call $blake2 (call $span (local.get 0) (local.get 1)))
                    (i32.const 32)))
            (func (export "store") (param i32 i32) (result i64)
                (call $set (i64.const 0x0000000300000010) (call $span (local.get 0) (local.get 1)))
                (i64.const 0))
            (func (export "load") (param i32 i32) (result i64)
                (call $get (i64.const 0x0000000300000010)))
            (func (export "leave_open") (param i32 i32) (result i64)
                (call $start)
                (i64.const 0))
            (func (export "commit") (param i32 i32) (result i64)
                (call $commit)
                (i64.const 0))
            (func (export "rollback") (param i32 i32) (result i64)
                (call $rollback)
                (i64.const 0))
            (func (export "spin") (param i32 i32) (result i64)
                (loop $forever (br $forever))
                (i64.const 0))
            (func (export "answer") (result i32) (i32.const 42))
        )
    "#;

    #[test]
    fn test_weft_builder() {
        let runtime = Weft::builder()
            .with_memory_limit(32 * 1024 * 1024)
            .with_fuel_limit(100_000)
            .with_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(runtime.limits().max_memory_bytes, 32 * 1024 * 1024);
        assert_eq!(runtime.limits().initial_fuel, 100_000);
        // 32MB of 64KiB pages.
        assert_eq!(runtime.host_config().max_memory_pages, 512);
        assert_eq!(runtime.linker().registered_functions().len(), 55);
    }

    #[test]
    fn test_call_entry_points() {
        let runtime = Weft::with_defaults().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut instance = runtime.instantiate(&module).unwrap();

        assert_eq!(instance.call("echo", b"block").unwrap(), b"block");
        assert_eq!(instance.call("echo", b"").unwrap(), b"");
        assert_eq!(
            instance.call("hash", b"abc").unwrap(),
            blake2_256(b"abc").to_vec()
        );
        assert_eq!(instance.call_export::<(), i32>("answer", ()).unwrap(), 42);
        assert!(instance.metrics().host_calls >= 1);
    }

    #[test]
    fn test_load_bytes() {
        let runtime = Weft::with_defaults().unwrap();
        let wasm = wat::parse_str(GUEST).unwrap();
        let module = runtime.load_bytes(&wasm).unwrap();
        assert!(module.has_export("echo"));
    }

    #[test]
    fn test_heap_starts_at_exported_base() {
        let runtime = Weft::with_defaults().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut instance = runtime.instantiate(&module).unwrap();

        let allocator = instance.execution().allocator().unwrap();
        assert_eq!(allocator.lock().heap_base(), 1024);

        instance.write_memory(1024, b"raw").unwrap();
        assert_eq!(instance.read_memory(1024, 3).unwrap(), b"raw");
        assert!(matches!(
            instance.read_memory(2 * 65536 - 1, 2),
            Err(WeftError::Memory(MemoryError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_unknown_import_rejected_at_load() {
        let runtime = Weft::with_defaults().unwrap();
        let err = runtime
            .load_wat(
                r#"(module
                    (import "env" "ext_storage_exists_version_1" (func (param i64) (result i32)))
                    (memory (export "memory") 1))"#,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            WeftError::Host(HostError::UnknownImport { ref name, .. })
                if name == "ext_storage_exists_version_1"
        ));
    }

    #[test]
    fn test_host_trap_surfaces_import() {
        let runtime = Weft::with_defaults().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut instance = runtime.instantiate(&module).unwrap();

        let err = instance.call("commit", &[]).unwrap_err();
        let trap = err.host_trap().unwrap();
        assert_eq!(trap.import, STORAGE_COMMIT_TRANSACTION);
        assert!(matches!(
            trap.source,
            HostError::TransactionStackMisuse { .. }
        ));
    }

    #[test]
    fn test_open_transaction_reported() {
        let runtime = Weft::with_defaults().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut instance = runtime.instantiate(&module).unwrap();

        let err = instance.call("leave_open", &[]).unwrap_err();
        assert!(matches!(err, WeftError::OpenTransactions { depth: 1 }));
    }

    #[test]
    fn test_instance_transactions_are_isolated() {
        let storage = Arc::new(MemoryStorage::new());
        let runtime = Weft::builder()
            .with_shared_storage(storage.clone())
            .build()
            .unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut a = runtime.instantiate(&module).unwrap();
        let mut b = runtime.instantiate(&module).unwrap();

        // Entries that leave a transaction open are reported, but the
        // transaction itself stays open on that instance.
        assert!(a.call("leave_open", &[]).is_err());
        assert!(b.call("leave_open", &[]).is_err());
        assert!(a.call("store", b"a").is_err());
        assert!(b.call("store", b"b").is_err());

        a.call("rollback", &[]).unwrap();
        b.call("commit", &[]).unwrap();

        assert_eq!(storage.get(b"key").unwrap(), Some(b"b".to_vec()));
        assert_eq!(
            a.call("load", &[]).unwrap(),
            Some(b"b".to_vec()).encode()
        );
    }

    #[test]
    fn test_out_of_fuel() {
        let runtime = Weft::builder().with_fuel_limit(10_000).build().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut instance = runtime.instantiate(&module).unwrap();

        let err = instance.call("spin", &[]).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Execution(ExecutionError::OutOfFuel { limit: 10_000, .. })
        ));
    }

    #[test]
    fn test_timeout_interrupts_guest() {
        let runtime = Weft::builder()
            .with_fuel_metering(false)
            .with_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let module = runtime.load_wat(GUEST).unwrap();
        let mut instance = runtime.instantiate(&module).unwrap();

        let err = instance.call("spin", &[]).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Execution(ExecutionError::Timeout(_))
        ));
    }

    #[test]
    fn test_instances_share_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let runtime = Weft::builder()
            .with_shared_storage(storage.clone())
            .build()
            .unwrap();
        let module = runtime.load_wat(GUEST).unwrap();

        let mut writer = runtime.instantiate(&module).unwrap();
        writer.call("store", b"state").unwrap();

        let mut reader = runtime.instantiate(&module).unwrap();
        assert_eq!(
            reader.call("load", &[]).unwrap(),
            Some(b"state".to_vec()).encode()
        );
        assert_eq!(storage.get(b"key").unwrap(), Some(b"state".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_instances_on_blocking_workers() {
        let runtime = Arc::new(Weft::with_defaults().unwrap());
        let module = Arc::new(runtime.load_wat(GUEST).unwrap());

        let tasks: Vec<_> = (0..8u8)
            .map(|i| {
                let runtime = Arc::clone(&runtime);
                let module = Arc::clone(&module);
                tokio::task::spawn_blocking(move || {
                    let mut instance = runtime.instantiate(&module)?;
                    instance.call("hash", &[i; 16])
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let digest = task.await.unwrap().unwrap();
            assert_eq!(digest, blake2_256(&[i as u8; 16]).to_vec());
        }
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _runtime = Weft::builder().with_storage(MemoryStorage::new()).build().unwrap();
    }
}
