//! In-memory off-chain worker facilities.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::Offchain;
use crate::capability::Capability;
use crate::error::CapabilityResult;
use crate::types::{OpaqueNetworkState, StorageKind};

/// An [`Offchain`] backend that keeps everything in process memory.
///
/// Submitted transactions are queued and can be drained with
/// [`MemoryOffchain::take_submitted`].
#[derive(Debug)]
pub struct MemoryOffchain {
    validator: bool,
    accept_transactions: bool,
    network_state: Option<OpaqueNetworkState>,
    local: DashMap<(StorageKind, Vec<u8>), Vec<u8>>,
    index: DashMap<Vec<u8>, Vec<u8>>,
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl Default for MemoryOffchain {
    fn default() -> Self {
        Self {
            validator: false,
            accept_transactions: true,
            network_state: None,
            local: DashMap::new(),
            index: DashMap::new(),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryOffchain {
    /// Create a backend for a non-validator node with no network identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the node as a validator.
    pub fn with_validator(mut self, validator: bool) -> Self {
        self.validator = validator;
        self
    }

    /// Report this network identity.
    pub fn with_network_state(mut self, state: OpaqueNetworkState) -> Self {
        self.network_state = Some(state);
        self
    }

    /// Reject every submitted transaction.
    pub fn rejecting_transactions(mut self) -> Self {
        self.accept_transactions = false;
        self
    }

    /// Drain the transactions submitted so far.
    pub fn take_submitted(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.submitted.lock())
    }

    /// Value written to the off-chain index under `key`.
    pub fn indexed(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.index.get(key).map(|v| v.value().clone())
    }
}

impl Capability for MemoryOffchain {
    fn name(&self) -> &str {
        "memory-offchain"
    }
}

impl Offchain for MemoryOffchain {
    fn is_validator(&self) -> CapabilityResult<bool> {
        Ok(self.validator)
    }

    fn local_storage_get(&self, kind: StorageKind, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>> {
        Ok(self
            .local
            .get(&(kind, key.to_vec()))
            .map(|v| v.value().clone()))
    }

    fn local_storage_set(&self, kind: StorageKind, key: &[u8], value: &[u8]) -> CapabilityResult<()> {
        self.local.insert((kind, key.to_vec()), value.to_vec());
        Ok(())
    }

    fn local_storage_compare_and_set(
        &self,
        kind: StorageKind,
        key: &[u8],
        old: Option<&[u8]>,
        new: &[u8],
    ) -> CapabilityResult<bool> {
        // The entry guard holds the shard lock for the whole check-and-swap.
        let swapped = match self.local.entry((kind, key.to_vec())) {
            Entry::Occupied(mut entry) => {
                if old == Some(entry.get().as_slice()) {
                    entry.insert(new.to_vec());
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                if old.is_none() {
                    entry.insert(new.to_vec());
                    true
                } else {
                    false
                }
            }
        };
        debug!(?kind, swapped, "Off-chain compare-and-set");
        Ok(swapped)
    }

    fn network_state(&self) -> CapabilityResult<Option<OpaqueNetworkState>> {
        Ok(self.network_state.clone())
    }

    fn random_seed(&self) -> CapabilityResult<[u8; 32]> {
        Ok(rand::random())
    }

    fn submit_transaction(&self, extrinsic: &[u8]) -> CapabilityResult<bool> {
        if !self.accept_transactions {
            return Ok(false);
        }
        self.submitted.lock().push(extrinsic.to_vec());
        info!(len = extrinsic.len(), "Queued off-chain transaction");
        Ok(true)
    }

    fn index_set(&self, key: &[u8], value: &[u8]) -> CapabilityResult<()> {
        self.index.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
