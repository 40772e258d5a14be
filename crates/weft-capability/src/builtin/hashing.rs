//! Default hash function backend.

use std::hash::Hasher;

use blake2::digest::consts::{U16, U32};
use blake2::{Blake2b, Digest};
use sha2::Sha256;
use tiny_keccak::{Hasher as _, Keccak};
use twox_hash::XxHash64;

use crate::backend::Hashing;
use crate::capability::Capability;
use crate::error::CapabilityResult;

/// 256-bit BLAKE2b of `data`.
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b::<U32>::digest(data));
    out
}

/// 128-bit BLAKE2b of `data`.
pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Blake2b::<U16>::digest(data));
    out
}

fn twox(data: &[u8], seed: u64) -> [u8; 8] {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(data);
    hasher.finish().to_le_bytes()
}

/// Hashing backend built on the RustCrypto and xxHash crates.
///
/// The trie root is left to a real trie backend and reports unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHashing;

impl Capability for DefaultHashing {
    fn name(&self) -> &str {
        "default-hashing"
    }
}

impl Hashing for DefaultHashing {
    fn blake2_128(&self, data: &[u8]) -> CapabilityResult<[u8; 16]> {
        Ok(blake2_128(data))
    }

    fn blake2_256(&self, data: &[u8]) -> CapabilityResult<[u8; 32]> {
        Ok(blake2_256(data))
    }

    fn keccak_256(&self, data: &[u8]) -> CapabilityResult<[u8; 32]> {
        let mut keccak = Keccak::v256();
        keccak.update(data);
        let mut out = [0u8; 32];
        keccak.finalize(&mut out);
        Ok(out)
    }

    fn sha2_256(&self, data: &[u8]) -> CapabilityResult<[u8; 32]> {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(data));
        Ok(out)
    }

    fn twox_64(&self, data: &[u8]) -> CapabilityResult<[u8; 8]> {
        Ok(twox(data, 0))
    }

    fn twox_128(&self, data: &[u8]) -> CapabilityResult<[u8; 16]> {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&twox(data, 0));
        out[8..].copy_from_slice(&twox(data, 1));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_known_digests() {
        let hashing = DefaultHashing;

        assert_eq!(
            hex(&hashing.blake2_256(b"").unwrap()),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
        assert_eq!(
            hex(&hashing.sha2_256(b"abc").unwrap()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex(&hashing.keccak_256(b"").unwrap()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(hex(&hashing.twox_64(b"").unwrap()), "99e9d85137db46ef");
    }

    #[test]
    fn test_twox_128_concatenates_seeds() {
        let hashing = DefaultHashing;
        let wide = hashing.twox_128(b"System").unwrap();
        assert_eq!(&wide[..8], &hashing.twox_64(b"System").unwrap());
        assert_ne!(&wide[..8], &wide[8..]);
    }

    #[test]
    fn test_blake2_128_is_not_truncated_256() {
        let hashing = DefaultHashing;
        let short = hashing.blake2_128(b"weft").unwrap();
        let long = hashing.blake2_256(b"weft").unwrap();
        assert_ne!(&short[..], &long[..16]);
    }

    #[test]
    fn test_trie_root_unsupported() {
        let err = DefaultHashing.ordered_trie_root(&[b"a".to_vec()]).unwrap_err();
        assert!(err.is_unsupported());
    }
}
