//! Runtime version lookup keyed by code hash.

use dashmap::DashMap;

use crate::backend::Misc;
use crate::builtin::hashing::blake2_256;
use crate::capability::Capability;
use crate::error::CapabilityResult;

/// A [`Misc`] backend that answers version queries for registered code.
///
/// Versions are looked up by the BLAKE2-256 hash of the code blob; unknown
/// code yields `None`.
#[derive(Debug, Default)]
pub struct KnownRuntimeVersions {
    versions: DashMap<[u8; 32], Vec<u8>>,
}

impl KnownRuntimeVersions {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the encoded version for `code`.
    pub fn register(&self, code: &[u8], encoded_version: Vec<u8>) {
        self.versions.insert(blake2_256(code), encoded_version);
    }
}

impl Capability for KnownRuntimeVersions {
    fn name(&self) -> &str {
        "known-runtime-versions"
    }
}

impl Misc for KnownRuntimeVersions {
    fn runtime_version(&self, code: &[u8]) -> CapabilityResult<Option<Vec<u8>>> {
        Ok(self
            .versions
            .get(&blake2_256(code))
            .map(|v| v.value().clone()))
    }
}
