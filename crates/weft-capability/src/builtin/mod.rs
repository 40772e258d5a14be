//! Reference backends.
//!
//! - [`MemoryStorage`]: state storage with per-session transaction overlays
//! - [`DefaultHashing`]: BLAKE2, SHA2, Keccak and xxHash
//! - [`MemoryKeystore`]: ed25519 keys and signatures
//! - [`MemoryOffchain`]: off-chain storage, index and transaction queue
//! - [`UnsupportedSandbox`]: refuses nested sandboxing
//! - [`KnownRuntimeVersions`]: runtime versions by code hash

mod hashing;
mod keystore;
mod offchain;
mod sandbox;
mod storage;
mod version;

pub use hashing::{DefaultHashing, blake2_128, blake2_256};
pub use keystore::MemoryKeystore;
pub use offchain::MemoryOffchain;
pub use sandbox::UnsupportedSandbox;
pub use storage::MemoryStorage;
pub use version::KnownRuntimeVersions;
