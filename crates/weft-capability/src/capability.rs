//! Capability identity.
//!
//! Each capability family (storage, crypto, ...) has a well-known
//! [`CapabilityId`] used in errors and diagnostics, and every backend
//! implements [`Capability`] so it can describe itself.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identifier of a capability family.
///
/// # Example
///
/// ```
/// use weft_capability::{CapabilityId, standard_ids};
///
/// assert_eq!(standard_ids::STORAGE, CapabilityId::new("storage"));
/// assert_ne!(standard_ids::STORAGE, standard_ids::CRYPTO);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapabilityId(Cow<'static, str>);

impl CapabilityId {
    /// Create a new capability ID.
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for CapabilityId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for CapabilityId {}

impl Hash for CapabilityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for CapabilityId {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

/// Common supertrait of every backend.
pub trait Capability: fmt::Debug + Send + Sync {
    /// Short human-readable name of the implementation.
    fn name(&self) -> &str;
}

/// IDs of the capability families a guest can reach.
pub mod standard_ids {
    use super::CapabilityId;
    use std::borrow::Cow;

    /// Key/value state storage, including child tries.
    pub const STORAGE: CapabilityId = CapabilityId(Cow::Borrowed("storage"));

    /// Key generation, signing and signature verification.
    pub const CRYPTO: CapabilityId = CapabilityId(Cow::Borrowed("crypto"));

    /// Hash functions and trie roots.
    pub const HASHING: CapabilityId = CapabilityId(Cow::Borrowed("hashing"));

    /// Off-chain worker facilities.
    pub const OFFCHAIN: CapabilityId = CapabilityId(Cow::Borrowed("offchain"));

    /// Nested wasm sandboxing.
    pub const SANDBOX: CapabilityId = CapabilityId(Cow::Borrowed("sandbox"));

    /// Everything else (runtime version queries).
    pub const MISC: CapabilityId = CapabilityId(Cow::Borrowed("misc"));

    /// All families, in dispatch-table order.
    pub const ALL: [CapabilityId; 6] = [STORAGE, CRYPTO, HASHING, OFFCHAIN, SANDBOX, MISC];
}
