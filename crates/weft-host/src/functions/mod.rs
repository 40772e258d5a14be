//! Host function bodies, one module per capability family.
//!
//! Each module exposes a `register` function adding its imports to a
//! [`HostLinker`]; [`register_all`] adds them all in table order.

mod allocator;
mod crypto;
mod hashing;
mod misc;
mod offchain;
mod sandbox;
mod storage;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::HostResult;
use crate::linker::HostLinker;

pub use misc::LogLevel;
pub use sandbox::{ERR_EXECUTION, ERR_MODULE, ERR_OK, ERR_OUT_OF_BOUNDS};

/// Register every standard host function.
pub fn register_all(linker: &mut HostLinker) -> HostResult<()> {
    misc::register(linker)?;
    allocator::register(linker)?;
    hashing::register(linker)?;
    crypto::register(linker)?;
    storage::register(linker)?;
    offchain::register(linker)?;
    sandbox::register(linker)?;
    Ok(())
}
