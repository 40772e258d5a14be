//! Weft Capability Backends
//!
//! A guest reaches node resources only through the host functions it
//! imports, and those host functions reach the node only through the traits
//! in [`backend`]:
//!
//! - [`Storage`]: key/value state, nested transactions, child tries
//! - [`Crypto`]: key generation, signing, signature verification
//! - [`Hashing`]: BLAKE2, Keccak, SHA2, xxHash, trie roots
//! - [`Offchain`]: off-chain worker storage, randomness, transaction submission
//! - [`NestedSandbox`]: guest-driven nested wasm instances
//! - [`Misc`]: runtime version queries
//!
//! A [`CapabilitySet`] bundles one backend per family. The [`builtin`]
//! module has in-memory reference implementations for all of them; real
//! nodes plug in their own.
//!
//! Backends that cannot perform an operation report
//! [`CapabilityError::Unsupported`] rather than returning a made-up value.
//!
//! # Usage
//!
//! ```
//! use weft_capability::builtin::{MemoryOffchain, MemoryStorage};
//! use weft_capability::CapabilitySetBuilder;
//!
//! let capabilities = CapabilitySetBuilder::new()
//!     .with_storage(MemoryStorage::new())
//!     .with_offchain(MemoryOffchain::new().with_validator(true))
//!     .build();
//!
//! assert!(capabilities.offchain().is_validator().unwrap());
//! ```

pub mod backend;
pub mod builtin;
pub mod capability;
pub mod error;
pub mod set;
pub mod types;

pub use backend::{Crypto, Hashing, Misc, NestedSandbox, Offchain, Storage};
pub use capability::{Capability, CapabilityId, standard_ids};
pub use error::{CapabilityError, CapabilityResult};
pub use set::{CapabilitySet, CapabilitySetBuilder};
pub use types::{EcdsaVerifyError, KeyTypeId, OpaqueNetworkState, StorageKind};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backend::{Crypto, Hashing, Misc, NestedSandbox, Offchain, Storage};
    pub use crate::capability::{Capability, CapabilityId};
    pub use crate::error::{CapabilityError, CapabilityResult};
    pub use crate::set::{CapabilitySet, CapabilitySetBuilder};
}
