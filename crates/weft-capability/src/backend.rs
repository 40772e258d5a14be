//! Backend traits behind each host function family.
//!
//! Host functions never implement storage, cryptography or hashing
//! themselves; they decode guest arguments and forward to one of these
//! traits. Implementations are shared between instances (`Arc`) and must
//! synchronise internally.
//!
//! Operations a backend does not provide return
//! [`CapabilityError::Unsupported`], which the host turns into a trap naming
//! the missing operation. Several methods default to that.

use std::sync::Arc;

use parity_scale_codec::{Compact, Decode, Encode};

use crate::capability::{Capability, standard_ids};
use crate::error::{CapabilityError, CapabilityResult};
use crate::types::{EcdsaVerifyError, KeyTypeId, OpaqueNetworkState, StorageKind};

/// Key/value state storage with nested transactions and child tries.
pub trait Storage: Capability {
    /// Value under `key`.
    fn get(&self, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>>;

    /// Set `key` to `value`.
    fn set(&self, key: &[u8], value: &[u8]) -> CapabilityResult<()>;

    /// Remove `key`.
    fn clear(&self, key: &[u8]) -> CapabilityResult<()>;

    /// Remove every key starting with `prefix`.
    fn clear_prefix(&self, prefix: &[u8]) -> CapabilityResult<()>;

    /// Smallest key strictly greater than `key`.
    fn next_key(&self, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>>;

    /// Root hash of the current state.
    fn root(&self) -> CapabilityResult<[u8; 32]>;

    /// Root of the changes since `parent_hash`, when change tracking is on.
    fn changes_root(&self, parent_hash: &[u8]) -> CapabilityResult<Option<[u8; 32]>> {
        let _ = parent_hash;
        Ok(None)
    }

    /// Append an encoded item to the SCALE-encoded vector stored at `key`.
    ///
    /// A missing value, or one that does not start with a compact length,
    /// is replaced by a one-element vector.
    fn append(&self, key: &[u8], item: &[u8]) -> CapabilityResult<()> {
        let current = self.get(key)?;
        self.set(key, &append_to_encoded_vec(current.as_deref(), item))
    }

    /// A handle for one guest instance.
    ///
    /// The session reads and writes the same committed state as `self` but
    /// keeps its own transaction stack. Transactions opened through one
    /// session are invisible to every other session until the outermost one
    /// commits, and cannot be closed from another session.
    fn session(self: Arc<Self>) -> Arc<dyn Storage>;

    /// Open a nested transaction.
    fn start_transaction(&self) -> CapabilityResult<()>;

    /// Keep the writes of the innermost transaction.
    fn commit_transaction(&self) -> CapabilityResult<()>;

    /// Discard the writes of the innermost transaction.
    fn rollback_transaction(&self) -> CapabilityResult<()>;

    /// Value under `key` in the child trie `child`.
    fn child_get(&self, child: &[u8], key: &[u8]) -> CapabilityResult<Option<Vec<u8>>>;

    /// Set `key` in the child trie `child`.
    fn child_set(&self, child: &[u8], key: &[u8], value: &[u8]) -> CapabilityResult<()>;

    /// Remove `key` from the child trie `child`.
    fn child_clear(&self, child: &[u8], key: &[u8]) -> CapabilityResult<()>;

    /// Root hash of the child trie `child`.
    fn child_root(&self, child: &[u8]) -> CapabilityResult<[u8; 32]>;

    /// Remove the child trie `child` entirely.
    fn child_kill(&self, child: &[u8]) -> CapabilityResult<()>;
}

/// Key management and signatures.
pub trait Crypto: Capability {
    /// Generate (or derive from `seed`) an ed25519 key and return its public half.
    fn ed25519_generate(&self, key_type: KeyTypeId, seed: Option<&[u8]>)
    -> CapabilityResult<[u8; 32]>;

    /// Check an ed25519 signature. A malformed public key is `false`, not an error.
    fn ed25519_verify(
        &self,
        signature: &[u8; 64],
        message: &[u8],
        public: &[u8; 32],
    ) -> CapabilityResult<bool>;

    /// Generate (or derive from `seed`) an sr25519 key and return its public half.
    fn sr25519_generate(
        &self,
        key_type: KeyTypeId,
        seed: Option<&[u8]>,
    ) -> CapabilityResult<[u8; 32]> {
        let _ = (key_type, seed);
        Err(CapabilityError::unsupported(standard_ids::CRYPTO, "sr25519_generate"))
    }

    /// Public sr25519 keys held for `key_type`.
    fn sr25519_public_keys(&self, key_type: KeyTypeId) -> CapabilityResult<Vec<[u8; 32]>> {
        let _ = key_type;
        Err(CapabilityError::unsupported(standard_ids::CRYPTO, "sr25519_public_keys"))
    }

    /// Sign with the sr25519 key `public`, if the keystore holds it.
    fn sr25519_sign(
        &self,
        key_type: KeyTypeId,
        public: &[u8; 32],
        message: &[u8],
    ) -> CapabilityResult<Option<[u8; 64]>> {
        let _ = (key_type, public, message);
        Err(CapabilityError::unsupported(standard_ids::CRYPTO, "sr25519_sign"))
    }

    /// Check an sr25519 signature.
    fn sr25519_verify(
        &self,
        signature: &[u8; 64],
        message: &[u8],
        public: &[u8; 32],
    ) -> CapabilityResult<bool> {
        let _ = (signature, message, public);
        Err(CapabilityError::unsupported(standard_ids::CRYPTO, "sr25519_verify"))
    }

    /// Recover the compressed secp256k1 public key that signed `message_hash`.
    fn secp256k1_ecdsa_recover_compressed(
        &self,
        signature: &[u8; 65],
        message_hash: &[u8; 32],
    ) -> CapabilityResult<Result<[u8; 33], EcdsaVerifyError>> {
        let _ = (signature, message_hash);
        Err(CapabilityError::unsupported(
            standard_ids::CRYPTO,
            "secp256k1_ecdsa_recover_compressed",
        ))
    }
}

/// Hash functions.
pub trait Hashing: Capability {
    /// 128-bit BLAKE2b.
    fn blake2_128(&self, data: &[u8]) -> CapabilityResult<[u8; 16]>;

    /// 256-bit BLAKE2b.
    fn blake2_256(&self, data: &[u8]) -> CapabilityResult<[u8; 32]>;

    /// Keccak-256 (pre-standard SHA-3 padding).
    fn keccak_256(&self, data: &[u8]) -> CapabilityResult<[u8; 32]>;

    /// SHA2-256.
    fn sha2_256(&self, data: &[u8]) -> CapabilityResult<[u8; 32]>;

    /// 64-bit xxHash.
    fn twox_64(&self, data: &[u8]) -> CapabilityResult<[u8; 8]>;

    /// Two 64-bit xxHashes with seeds 0 and 1.
    fn twox_128(&self, data: &[u8]) -> CapabilityResult<[u8; 16]>;

    /// BLAKE2-256 root of the trie keyed by each value's index.
    fn ordered_trie_root(&self, values: &[Vec<u8>]) -> CapabilityResult<[u8; 32]> {
        let _ = values;
        Err(CapabilityError::unsupported(standard_ids::HASHING, "ordered_trie_root"))
    }
}

/// Facilities available to off-chain workers.
pub trait Offchain: Capability {
    /// Whether the node runs as a validator.
    fn is_validator(&self) -> CapabilityResult<bool>;

    /// Read off-chain local storage.
    fn local_storage_get(&self, kind: StorageKind, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>>;

    /// Write off-chain local storage.
    fn local_storage_set(&self, kind: StorageKind, key: &[u8], value: &[u8]) -> CapabilityResult<()>;

    /// Set `key` to `new` only if it currently holds `old` (`None` = absent).
    ///
    /// Returns whether the swap happened. Must be atomic.
    fn local_storage_compare_and_set(
        &self,
        kind: StorageKind,
        key: &[u8],
        old: Option<&[u8]>,
        new: &[u8],
    ) -> CapabilityResult<bool>;

    /// Network identity, or `None` if it is not available.
    fn network_state(&self) -> CapabilityResult<Option<OpaqueNetworkState>>;

    /// 32 bytes of randomness.
    fn random_seed(&self) -> CapabilityResult<[u8; 32]>;

    /// Hand an encoded extrinsic to the transaction pool. Returns acceptance.
    fn submit_transaction(&self, extrinsic: &[u8]) -> CapabilityResult<bool>;

    /// Write to the off-chain index.
    fn index_set(&self, key: &[u8], value: &[u8]) -> CapabilityResult<()>;
}

/// Nested wasm sandboxes driven by the guest.
///
/// Every method defaults to unsupported.
pub trait NestedSandbox: Capability {
    /// Instantiate `code` with the imports described by `env_def`.
    fn instantiate(
        &self,
        dispatch_thunk: u32,
        code: &[u8],
        env_def: &[u8],
        state: u32,
    ) -> CapabilityResult<u32> {
        let _ = (dispatch_thunk, code, env_def, state);
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "instantiate"))
    }

    /// Call `function` on a sandbox instance; returns the encoded return value.
    fn invoke(
        &self,
        instance: u32,
        function: &str,
        args: &[u8],
        state: u32,
    ) -> CapabilityResult<Vec<u8>> {
        let _ = (instance, function, args, state);
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "invoke"))
    }

    /// Drop a sandbox instance.
    fn instance_teardown(&self, instance: u32) -> CapabilityResult<()> {
        let _ = instance;
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "instance_teardown"))
    }

    /// Create a sandbox memory.
    fn memory_new(&self, initial: u32, maximum: u32) -> CapabilityResult<u32> {
        let _ = (initial, maximum);
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "memory_new"))
    }

    /// Read `len` bytes of a sandbox memory.
    fn memory_get(&self, memory: u32, offset: u32, len: u32) -> CapabilityResult<Vec<u8>> {
        let _ = (memory, offset, len);
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "memory_get"))
    }

    /// Write into a sandbox memory.
    fn memory_set(&self, memory: u32, offset: u32, data: &[u8]) -> CapabilityResult<()> {
        let _ = (memory, offset, data);
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "memory_set"))
    }

    /// Drop a sandbox memory.
    fn memory_teardown(&self, memory: u32) -> CapabilityResult<()> {
        let _ = memory;
        Err(CapabilityError::unsupported(standard_ids::SANDBOX, "memory_teardown"))
    }
}

/// Miscellaneous queries.
pub trait Misc: Capability {
    /// Encoded version of the runtime in `code`, if it can be determined.
    fn runtime_version(&self, code: &[u8]) -> CapabilityResult<Option<Vec<u8>>>;
}

/// Append `item` to a SCALE-encoded vector, bumping its compact length.
pub fn append_to_encoded_vec(current: Option<&[u8]>, item: &[u8]) -> Vec<u8> {
    if let Some(bytes) = current {
        let mut rest = bytes;
        if let Ok(Compact(len)) = Compact::<u32>::decode(&mut rest) {
            if let Some(next) = len.checked_add(1) {
                let mut out = Compact(next).encode();
                out.extend_from_slice(rest);
                out.extend_from_slice(item);
                return out;
            }
        }
    }

    let mut out = Compact(1u32).encode();
    out.extend_from_slice(item);
    out
}
