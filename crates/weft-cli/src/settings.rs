//! Settings file for the CLI.
//!
//! ```toml
//! [runtime]
//! memory_limit = 67108864
//! fuel_limit = 1000000000
//! timeout_secs = 30
//! heap_base = 1048576
//!
//! [storage]
//! # hex key = hex value, loaded before the guest runs
//! "3a636f6465" = "0061736d01000000"
//!
//! [offchain]
//! validator = true
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;
use weft::WeftBuilder;
use weft_capability::builtin::{MemoryOffchain, MemoryStorage};


/// Everything the settings file can configure.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Engine and instance limits.
    pub runtime: RuntimeSettings,
    /// Initial storage contents, hex encoded.
    pub storage: BTreeMap<String, String>,
    /// Off-chain backend options.
    pub offchain: OffchainSettings,
}

/// Limits and heap placement.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    /// Maximum guest memory in bytes.
    pub memory_limit: usize,
    /// Fuel each instance starts with.
    pub fuel_limit: u64,
    /// Execution timeout in seconds.
    pub timeout_secs: u64,
    /// Fixed heap start, overriding the guest's `__heap_base`.
    pub heap_base: Option<u32>,
    /// Turn fuel metering off.
    pub unmetered: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            memory_limit: 64 * 1024 * 1024,
            fuel_limit: 1_000_000_000,
            timeout_secs: 30,
            heap_base: None,
            unmetered: false,
        }
    }
}

/// Off-chain backend options.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OffchainSettings {
    /// Report the node as a validator.
    pub validator: bool,
}

impl Settings {
    /// Read `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = Self::parse(&text)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Decode the initial storage entries.
    pub fn storage_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.storage
            .iter()
            .map(|(key, value)| {
                let key = parse_hex(key).with_context(|| format!("storage key '{key}'"))?;
                let value = parse_hex(value)
                    .with_context(|| format!("storage value for '{}'", hex::encode(&key)))?;
                Ok((key, value))
            })
            .collect()
    }

    /// A runtime builder configured from these settings.
    pub fn builder(&self) -> Result<WeftBuilder> {
        let runtime = &self.runtime;
        let mut builder = weft::Weft::builder()
            .with_memory_limit(runtime.memory_limit)
            .with_fuel_limit(runtime.fuel_limit)
            .with_timeout(Duration::from_secs(runtime.timeout_secs))
            .with_fuel_metering(!runtime.unmetered)
            .with_storage(MemoryStorage::with_entries(self.storage_entries()?))
            .with_offchain(MemoryOffchain::new().with_validator(self.offchain.validator));

        if let Some(heap_base) = runtime.heap_base {
            builder = builder.with_heap_base(heap_base);
        }
        Ok(builder)
    }
}

/// Decode hex text, with or without a `0x` prefix.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    Ok(hex::decode(text.strip_prefix("0x").unwrap_or(text))?)
}
