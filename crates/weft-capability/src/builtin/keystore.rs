//! In-memory ed25519 keystore.

use std::collections::HashMap;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use tracing::debug;

use crate::backend::Crypto;
use crate::builtin::hashing::blake2_256;
use crate::capability::Capability;
use crate::error::CapabilityResult;
use crate::types::KeyTypeId;

/// A [`Crypto`] backend holding ed25519 keys in memory.
///
/// Seeded generation derives the secret key as the BLAKE2-256 hash of the
/// seed, so the same seed always yields the same key. sr25519 and secp256k1
/// are not provided and report unsupported.
#[derive(Debug, Default)]
pub struct MemoryKeystore {
    keys: RwLock<HashMap<KeyTypeId, Vec<SigningKey>>>,
}

impl MemoryKeystore {
    /// Create an empty keystore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Public ed25519 keys held for `key_type`, in generation order.
    pub fn ed25519_public_keys(&self, key_type: KeyTypeId) -> Vec<[u8; 32]> {
        self.keys
            .read()
            .get(&key_type)
            .map(|keys| keys.iter().map(|k| k.verifying_key().to_bytes()).collect())
            .unwrap_or_default()
    }

    /// Sign `message` with the held key whose public half is `public`.
    pub fn ed25519_sign(
        &self,
        key_type: KeyTypeId,
        public: &[u8; 32],
        message: &[u8],
    ) -> Option<[u8; 64]> {
        let keys = self.keys.read();
        keys.get(&key_type)?
            .iter()
            .find(|k| k.verifying_key().as_bytes() == public)
            .map(|k| k.sign(message).to_bytes())
    }
}

impl Capability for MemoryKeystore {
    fn name(&self) -> &str {
        "memory-keystore"
    }
}

impl Crypto for MemoryKeystore {
    fn ed25519_generate(
        &self,
        key_type: KeyTypeId,
        seed: Option<&[u8]>,
    ) -> CapabilityResult<[u8; 32]> {
        let key = match seed {
            Some(seed) => SigningKey::from_bytes(&blake2_256(seed)),
            None => SigningKey::generate(&mut OsRng),
        };
        let public = key.verifying_key().to_bytes();

        let mut keys = self.keys.write();
        let held = keys.entry(key_type).or_default();
        if !held.iter().any(|k| k.verifying_key().to_bytes() == public) {
            held.push(key);
        }

        debug!(%key_type, seeded = seed.is_some(), "Generated ed25519 key");
        Ok(public)
    }

    fn ed25519_verify(
        &self,
        signature: &[u8; 64],
        message: &[u8],
        public: &[u8; 32],
    ) -> CapabilityResult<bool> {
        let Ok(public) = VerifyingKey::from_bytes(public) else {
            return Ok(false);
        };
        let signature = Signature::from_bytes(signature);
        Ok(public.verify(message, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_TYPE: KeyTypeId = KeyTypeId(*b"test");

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = MemoryKeystore::new();
        let b = MemoryKeystore::new();

        let pk_a = a.ed25519_generate(KEY_TYPE, Some(b"//Alice")).unwrap();
        let pk_b = b.ed25519_generate(KEY_TYPE, Some(b"//Alice")).unwrap();
        let pk_c = b.ed25519_generate(KEY_TYPE, Some(b"//Bob")).unwrap();

        assert_eq!(pk_a, pk_b);
        assert_ne!(pk_a, pk_c);
        assert_eq!(b.ed25519_public_keys(KEY_TYPE).len(), 2);
    }

    #[test]
    fn test_sign_and_verify() {
        let keystore = MemoryKeystore::new();
        let public = keystore.ed25519_generate(KEY_TYPE, None).unwrap();

        let signature = keystore.ed25519_sign(KEY_TYPE, &public, b"payload").unwrap();
        assert!(keystore.ed25519_verify(&signature, b"payload", &public).unwrap());
        assert!(!keystore.ed25519_verify(&signature, b"tampered", &public).unwrap());
    }

    #[test]
    fn test_unknown_key_cannot_sign() {
        let keystore = MemoryKeystore::new();
        assert!(keystore.ed25519_sign(KEY_TYPE, &[7; 32], b"x").is_none());
    }

    #[test]
    fn test_sr25519_is_unsupported() {
        let keystore = MemoryKeystore::new();
        assert!(keystore.sr25519_public_keys(KEY_TYPE).unwrap_err().is_unsupported());
        assert!(
            keystore
                .secp256k1_ecdsa_recover_compressed(&[0; 65], &[0; 32])
                .unwrap_err()
                .is_unsupported()
        );
    }
}
