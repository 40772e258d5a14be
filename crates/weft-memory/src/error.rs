//! Error types for guest memory access and allocation.

use thiserror::Error;

/// Errors raised while touching or managing guest linear memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// An access reached past the current end of memory.
    #[error("Memory access out of bounds: offset={offset}, len={len}, memory_size={memory_size}")]
    OutOfBounds {
        /// Start of the access.
        offset: u64,
        /// Length of the access.
        len: u64,
        /// Memory size at the time of the access.
        memory_size: u64,
    },

    /// No free region fits and memory cannot grow far enough.
    #[error("Out of memory: cannot allocate {requested} bytes")]
    OutOfMemory {
        /// Size that was requested by the caller.
        requested: u64,
    },

    /// The offset does not start a live allocation.
    #[error("Invalid pointer: {offset:#x} is not the start of an allocation")]
    InvalidPointer {
        /// The offending offset.
        offset: u32,
    },

    /// The backing memory refused to grow.
    #[error("Failed to grow memory by {pages} pages: {reason}")]
    GrowFailed {
        /// Pages requested.
        pages: u64,
        /// Why the memory refused.
        reason: String,
    },
}

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
