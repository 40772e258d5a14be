//! Wasmtime engine wrapper.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use wasmtime::{Config, Engine};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// The wasmtime engine every guest module is compiled with.
///
/// One engine is shared by all modules and instances of a runtime. It fixes
/// the wasm feature set and owns the epoch counter used for timeouts.
///
/// # Example
///
/// ```
/// use weft_core::{EngineConfig, WeftEngine};
///
/// let engine = WeftEngine::new(EngineConfig::deterministic()).unwrap();
/// assert!(engine.fuel_enabled());
/// ```
pub struct WeftEngine {
    inner: Engine,
    config: EngineConfig,
    epoch: RwLock<u64>,
}

impl WeftEngine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if wasmtime rejects the resulting configuration.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let mut wasmtime_config = Config::new();

        wasmtime_config.consume_fuel(config.fuel_enabled);
        wasmtime_config.epoch_interruption(config.epoch_enabled);
        wasmtime_config.max_wasm_stack(config.max_wasm_stack);
        wasmtime_config.debug_info(config.debug_info);
        wasmtime_config.cranelift_nan_canonicalization(config.nan_canonicalization);

        wasmtime_config.wasm_bulk_memory(true);
        wasmtime_config.wasm_multi_value(true);
        wasmtime_config.wasm_reference_types(true);
        wasmtime_config.wasm_threads(false);
        // Relaxed SIMD depends on SIMD and is nondeterministic either way.
        wasmtime_config.wasm_relaxed_simd(false);
        wasmtime_config.wasm_simd(config.simd);

        let inner = Engine::new(&wasmtime_config)?;

        info!(
            fuel = config.fuel_enabled,
            epochs = config.epoch_enabled,
            simd = config.simd,
            "Created weft engine"
        );

        Ok(Self {
            inner,
            config,
            epoch: RwLock::new(0),
        })
    }

    /// Create a new engine with default configuration.
    pub fn default_engine() -> EngineResult<Self> {
        Self::new(EngineConfig::default())
    }

    /// Get a reference to the underlying Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.inner
    }

    /// Get the configuration used to create this engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the epoch counter.
    ///
    /// Instances trap once the epoch passes their deadline. A no-op when
    /// epochs are disabled.
    pub fn increment_epoch(&self) {
        if self.config.epoch_enabled {
            let mut epoch = self.epoch.write();
            *epoch += 1;
            self.inner.increment_epoch();
            debug!(epoch = *epoch, "Incremented engine epoch");
        }
    }

    /// Get the current epoch value.
    pub fn current_epoch(&self) -> u64 {
        *self.epoch.read()
    }

    /// Check if fuel-based limiting is enabled.
    pub fn fuel_enabled(&self) -> bool {
        self.config.fuel_enabled
    }

    /// Check if epoch-based interruption is enabled.
    pub fn epoch_enabled(&self) -> bool {
        self.config.epoch_enabled
    }
}

impl std::fmt::Debug for WeftEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeftEngine")
            .field("config", &self.config)
            .field("epoch", &*self.epoch.read())
            .finish()
    }
}

/// A shared reference to an engine.
pub type SharedEngine = Arc<WeftEngine>;

/// Extension trait for creating shared engines.
pub trait IntoShared {
    /// Convert into a shared engine reference.
    fn into_shared(self) -> SharedEngine;
}

impl IntoShared for WeftEngine {
    fn into_shared(self) -> SharedEngine {
        Arc::new(self)
    }
}
