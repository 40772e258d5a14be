//! The bundle of backends handed to an execution context.

use std::sync::Arc;

use tracing::info;

use crate::backend::{Crypto, Hashing, Misc, NestedSandbox, Offchain, Storage};
use crate::builtin::{
    DefaultHashing, KnownRuntimeVersions, MemoryKeystore, MemoryOffchain, MemoryStorage,
    UnsupportedSandbox,
};
use crate::capability::{CapabilityId, standard_ids};

/// One backend per capability family.
///
/// Cloning is cheap and shares the backends, so one set can serve any number
/// of guest instances.
///
/// # Example
///
/// ```
/// use weft_capability::{CapabilitySetBuilder, builtin::MemoryStorage};
///
/// let capabilities = CapabilitySetBuilder::new()
///     .with_storage(MemoryStorage::new())
///     .build();
///
/// capabilities.storage().set(b"k", b"v").unwrap();
/// ```
#[derive(Clone)]
pub struct CapabilitySet {
    storage: Arc<dyn Storage>,
    crypto: Arc<dyn Crypto>,
    hashing: Arc<dyn Hashing>,
    offchain: Arc<dyn Offchain>,
    sandbox: Arc<dyn NestedSandbox>,
    misc: Arc<dyn Misc>,
}

impl CapabilitySet {
    /// A set made entirely of the in-memory reference backends.
    pub fn in_memory() -> Self {
        CapabilitySetBuilder::new().build()
    }

    /// State storage.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Keys and signatures.
    pub fn crypto(&self) -> &Arc<dyn Crypto> {
        &self.crypto
    }

    /// Hash functions.
    pub fn hashing(&self) -> &Arc<dyn Hashing> {
        &self.hashing
    }

    /// Off-chain facilities.
    pub fn offchain(&self) -> &Arc<dyn Offchain> {
        &self.offchain
    }

    /// Nested sandboxing.
    pub fn sandbox(&self) -> &Arc<dyn NestedSandbox> {
        &self.sandbox
    }

    /// Miscellaneous queries.
    pub fn misc(&self) -> &Arc<dyn Misc> {
        &self.misc
    }

    /// The set one guest instance should use.
    ///
    /// Shares every backend with `self`, except that storage is a fresh
    /// [`session`](Storage::session) so the instance's transactions stay its
    /// own.
    pub fn for_instance(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage).session(),
            ..self.clone()
        }
    }

    /// Each family with the name of the backend serving it.
    pub fn describe(&self) -> Vec<(CapabilityId, String)> {
        vec![
            (standard_ids::STORAGE, self.storage.name().to_string()),
            (standard_ids::CRYPTO, self.crypto.name().to_string()),
            (standard_ids::HASHING, self.hashing.name().to_string()),
            (standard_ids::OFFCHAIN, self.offchain.name().to_string()),
            (standard_ids::SANDBOX, self.sandbox.name().to_string()),
            (standard_ids::MISC, self.misc.name().to_string()),
        ]
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.describe()
                    .into_iter()
                    .map(|(id, name)| (id.to_string(), name)),
            )
            .finish()
    }
}

/// Builder for [`CapabilitySet`].
///
/// Families left unset get the in-memory reference backend.
#[derive(Default)]
pub struct CapabilitySetBuilder {
    storage: Option<Arc<dyn Storage>>,
    crypto: Option<Arc<dyn Crypto>>,
    hashing: Option<Arc<dyn Hashing>>,
    offchain: Option<Arc<dyn Offchain>>,
    sandbox: Option<Arc<dyn NestedSandbox>>,
    misc: Option<Arc<dyn Misc>>,
}

impl CapabilitySetBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `storage` for state storage.
    pub fn with_storage(self, storage: impl Storage + 'static) -> Self {
        self.with_shared_storage(Arc::new(storage))
    }

    /// Use an already shared storage backend.
    pub fn with_shared_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Use `crypto` for keys and signatures.
    pub fn with_crypto(self, crypto: impl Crypto + 'static) -> Self {
        self.with_shared_crypto(Arc::new(crypto))
    }

    /// Use an already shared crypto backend.
    pub fn with_shared_crypto(mut self, crypto: Arc<dyn Crypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Use `hashing` for hash functions.
    pub fn with_hashing(mut self, hashing: impl Hashing + 'static) -> Self {
        self.hashing = Some(Arc::new(hashing));
        self
    }

    /// Use `offchain` for off-chain facilities.
    pub fn with_offchain(self, offchain: impl Offchain + 'static) -> Self {
        self.with_shared_offchain(Arc::new(offchain))
    }

    /// Use an already shared off-chain backend.
    pub fn with_shared_offchain(mut self, offchain: Arc<dyn Offchain>) -> Self {
        self.offchain = Some(offchain);
        self
    }

    /// Use `sandbox` for nested sandboxing.
    pub fn with_sandbox(mut self, sandbox: impl NestedSandbox + 'static) -> Self {
        self.sandbox = Some(Arc::new(sandbox));
        self
    }

    /// Use `misc` for miscellaneous queries.
    pub fn with_misc(self, misc: impl Misc + 'static) -> Self {
        self.with_shared_misc(Arc::new(misc))
    }

    /// Use an already shared misc backend.
    pub fn with_shared_misc(mut self, misc: Arc<dyn Misc>) -> Self {
        self.misc = Some(misc);
        self
    }

    /// Build the set.
    pub fn build(self) -> CapabilitySet {
        let set = CapabilitySet {
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            crypto: self
                .crypto
                .unwrap_or_else(|| Arc::new(MemoryKeystore::new())),
            hashing: self.hashing.unwrap_or_else(|| Arc::new(DefaultHashing)),
            offchain: self
                .offchain
                .unwrap_or_else(|| Arc::new(MemoryOffchain::new())),
            sandbox: self.sandbox.unwrap_or_else(|| Arc::new(UnsupportedSandbox)),
            misc: self
                .misc
                .unwrap_or_else(|| Arc::new(KnownRuntimeVersions::new())),
        };

        info!(capabilities = ?set, "Capability set assembled");
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_every_family() {
        let set = CapabilitySetBuilder::new().build();
        let names: Vec<_> = set.describe().into_iter().map(|(_, name)| name).collect();

        assert_eq!(
            names,
            vec![
                "memory-storage",
                "memory-keystore",
                "default-hashing",
                "memory-offchain",
                "unsupported-sandbox",
                "known-runtime-versions",
            ]
        );
    }

    #[test]
    fn test_clones_share_backends() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let set = CapabilitySetBuilder::new()
            .with_shared_storage(Arc::clone(&storage))
            .build();
        let copy = set.clone();

        copy.storage().set(b"shared", b"yes").unwrap();
        assert_eq!(storage.get(b"shared").unwrap(), Some(b"yes".to_vec()));
        assert!(Arc::ptr_eq(set.storage(), copy.storage()));
    }

    #[test]
    fn test_instance_sets_isolate_transactions() {
        let set = CapabilitySet::in_memory();
        let first = set.for_instance();
        let second = set.for_instance();

        first.storage().start_transaction().unwrap();
        first.storage().set(b"k", b"v").unwrap();
        assert_eq!(second.storage().get(b"k").unwrap(), None);

        first.storage().commit_transaction().unwrap();
        assert_eq!(second.storage().get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(Arc::ptr_eq(set.crypto(), first.crypto()));
    }
}
