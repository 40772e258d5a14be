//! Configuration types for the weft engine and guest instances.

use std::time::Duration;

/// Configuration for the wasmtime engine behind [`WeftEngine`](crate::WeftEngine).
///
/// Guests run consensus-critical code, so the defaults keep execution
/// deterministic: no SIMD, no threads, canonical NaNs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Charge fuel for executed instructions and trap when it runs out.
    pub fuel_enabled: bool,

    /// Allow epoch deadlines to interrupt execution.
    pub epoch_enabled: bool,

    /// Maximum WASM stack size in bytes.
    ///
    /// Defaults to 1MB.
    pub max_wasm_stack: usize,

    /// Enable the SIMD proposal.
    pub simd: bool,

    /// Canonicalize NaN results of float operations.
    pub nan_canonicalization: bool,

    /// Emit debug information in compiled code.
    pub debug_info: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuel_enabled: true,
            epoch_enabled: true,
            max_wasm_stack: 1024 * 1024, // 1MB
            simd: false,
            nan_canonicalization: true,
            debug_info: false,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable fuel-based CPU limiting.
    pub fn with_fuel(mut self, enabled: bool) -> Self {
        self.fuel_enabled = enabled;
        self
    }

    /// Enable epoch-based interruption.
    pub fn with_epochs(mut self, enabled: bool) -> Self {
        self.epoch_enabled = enabled;
        self
    }

    /// Set the maximum WASM stack size.
    pub fn with_max_wasm_stack(mut self, bytes: usize) -> Self {
        self.max_wasm_stack = bytes;
        self
    }

    /// Enable or disable SIMD.
    pub fn with_simd(mut self, enabled: bool) -> Self {
        self.simd = enabled;
        self
    }

    /// Enable or disable NaN canonicalization.
    pub fn with_nan_canonicalization(mut self, enabled: bool) -> Self {
        self.nan_canonicalization = enabled;
        self
    }

    /// Enable debug information.
    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.debug_info = enabled;
        self
    }

    /// Settings for executing blocks: fuel metering on, nothing
    /// nondeterministic.
    pub fn deterministic() -> Self {
        Self::default()
    }

    /// Settings for off-chain and tooling use where metering is not needed.
    pub fn unmetered() -> Self {
        Self {
            fuel_enabled: false,
            epoch_enabled: false,
            ..Self::default()
        }
    }
}

/// Configuration for a single guest instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Resource limits for this instance.
    pub limits: ResourceLimits,

    /// Whether to collect timing and fuel metrics on each call.
    pub collect_metrics: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            collect_metrics: true,
        }
    }
}

impl InstanceConfig {
    /// Create a new instance configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable metrics collection.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.collect_metrics = enabled;
        self
    }
}

/// Resource limits for guest execution.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum linear memory in bytes.
    ///
    /// Defaults to 128MB (2048 pages).
    pub max_memory_bytes: usize,

    /// Maximum table elements.
    ///
    /// Defaults to 10,000.
    pub max_table_elements: u32,

    /// Fuel granted to each instance.
    ///
    /// Defaults to 10 billion units.
    pub initial_fuel: u64,

    /// Wall-clock limit, enforced through epoch deadlines.
    ///
    /// Defaults to 30 seconds.
    pub timeout: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 128 * 1024 * 1024, // 128MB
            max_table_elements: 10_000,
            initial_fuel: 10_000_000_000,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ResourceLimits {
    /// Create resource limits with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum memory limit.
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Set the initial fuel allocation.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.initial_fuel = fuel;
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of table elements.
    pub fn with_table_elements(mut self, elements: u32) -> Self {
        self.max_table_elements = elements;
        self
    }

    /// Maximum memory expressed in 64KB wasm pages.
    pub fn max_memory_pages(&self) -> u64 {
        self.max_memory_bytes as u64 / 65536
    }

    /// Small limits for tests.
    pub fn minimal() -> Self {
        Self {
            max_memory_bytes: 2 * 1024 * 1024, // 2MB
            max_table_elements: 1_000,
            initial_fuel: 100_000,
            timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults_are_deterministic() {
        let config = EngineConfig::default();
        assert!(config.fuel_enabled);
        assert!(!config.simd);
        assert!(config.nan_canonicalization);
        assert_eq!(config.max_wasm_stack, 1024 * 1024);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new()
            .with_fuel(false)
            .with_debug_info(true)
            .with_max_wasm_stack(2 * 1024 * 1024);

        assert!(!config.fuel_enabled);
        assert!(config.debug_info);
        assert_eq!(config.max_wasm_stack, 2 * 1024 * 1024);
    }

    #[test]
    fn test_unmetered_disables_interruption() {
        let config = EngineConfig::unmetered();
        assert!(!config.fuel_enabled);
        assert!(!config.epoch_enabled);
    }

    #[test]
    fn test_max_memory_pages() {
        assert_eq!(ResourceLimits::default().max_memory_pages(), 2048);
        assert_eq!(ResourceLimits::minimal().max_memory_pages(), 32);
        assert_eq!(ResourceLimits::new().with_max_memory(100_000).max_memory_pages(), 1);
    }
}
