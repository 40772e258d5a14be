//! Value types shared between the host functions and the backends.

use std::fmt;

use parity_scale_codec::{Decode, Encode};

use crate::error::CapabilityError;

/// Four-byte tag naming the purpose of a key (`b"babe"`, `b"gran"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Encode, Decode)]
pub struct KeyTypeId(pub [u8; 4]);

impl fmt::Display for KeyTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(tag) => f.write_str(tag),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl From<[u8; 4]> for KeyTypeId {
    fn from(tag: [u8; 4]) -> Self {
        Self(tag)
    }
}

/// Namespace of off-chain local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Survives restarts and is shared by all workers.
    Persistent = 1,
    /// Local to the node and may be lost on fork.
    Local = 2,
}

impl TryFrom<u32> for StorageKind {
    type Error = CapabilityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Persistent),
            2 => Ok(Self::Local),
            other => Err(CapabilityError::InvalidInput(format!(
                "unknown off-chain storage kind {other}"
            ))),
        }
    }
}

/// Why an ECDSA public key could not be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum EcdsaVerifyError {
    /// Bad r or s component.
    BadRS,
    /// Bad recovery id.
    BadV,
    /// Signature does not recover to a key.
    BadSignature,
}

/// Node network identity as reported to off-chain workers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct OpaqueNetworkState {
    /// Encoded peer id.
    pub peer_id: Vec<u8>,
    /// Encoded multiaddresses the node is reachable on.
    pub external_addresses: Vec<Vec<u8>>,
}
