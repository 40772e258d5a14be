//! Weft Guest Memory
//!
//! Everything the host needs to exchange buffers with a guest that can only
//! name memory by offset:
//!
//! - [`Span`]: an `(offset, len)` pair packed into one 64-bit word
//! - [`MemoryView`]: bounds-checked reads and writes over a [`LinearMemory`]
//! - [`HeapAllocator`]: a first-fit allocator that manages regions inside
//!   the guest's memory on the guest's behalf
//!
//! The types here do not depend on a wasm engine. `weft-host` adapts a
//! wasmtime memory to [`LinearMemory`]; [`VecMemory`] covers everything else.
//!
//! # Example
//!
//! ```
//! use weft_memory::{HeapAllocator, MemoryView, Span, VecMemory};
//!
//! let mut memory = VecMemory::new(1, 16);
//! let mut heap = HeapAllocator::new(1024);
//!
//! let offset = heap.allocate(&mut memory, 5).unwrap();
//! memory.write(offset, b"hello").unwrap();
//!
//! let span = Span::new(offset, 5);
//! assert_eq!(memory.read(Span::decode(span.encode())).unwrap(), b"hello");
//! heap.deallocate(offset).unwrap();
//! ```

pub mod allocator;
pub mod error;
pub mod linear;
pub mod span;
pub mod view;

pub use allocator::{ALIGNMENT, AllocatorStats, HeapAllocator, UsedRegion};
pub use error::{MemoryError, MemoryResult};
pub use linear::{LinearMemory, MAX_PAGES, PAGE_SIZE, VecMemory};
pub use span::Span;
pub use view::MemoryView;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::allocator::HeapAllocator;
    pub use crate::error::{MemoryError, MemoryResult};
    pub use crate::linear::{LinearMemory, VecMemory};
    pub use crate::span::Span;
    pub use crate::view::MemoryView;
}
