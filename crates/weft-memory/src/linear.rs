//! The linear memory abstraction the view and allocator operate on.

use crate::error::{MemoryError, MemoryResult};

/// Size of one wasm page in bytes.
pub const PAGE_SIZE: u64 = 64 * 1024;

/// Largest addressable wasm32 memory, in pages.
pub const MAX_PAGES: u64 = 65_536;

/// A contiguous, growable byte buffer owned by one guest instance.
///
/// Memory only ever grows, in whole pages, and never shrinks.
pub trait LinearMemory {
    /// Current contents.
    fn data(&self) -> &[u8];

    /// Current contents, mutably.
    fn data_mut(&mut self) -> &mut [u8];

    /// Grow by `additional_pages`, returning the previous size in pages.
    fn grow(&mut self, additional_pages: u64) -> MemoryResult<u64>;

    /// Current size in bytes.
    fn size(&self) -> u64 {
        self.data().len() as u64
    }

    /// Current size in pages.
    fn pages(&self) -> u64 {
        self.size() / PAGE_SIZE
    }
}

/// A heap-backed [`LinearMemory`].
///
/// Used when the memory does not live inside a wasm engine, and in tests.
#[derive(Debug, Clone)]
pub struct VecMemory {
    bytes: Vec<u8>,
    max_pages: u64,
}

impl VecMemory {
    /// Create a zeroed memory of `initial_pages`, growable up to `max_pages`.
    pub fn new(initial_pages: u64, max_pages: u64) -> Self {
        let max_pages = max_pages.min(MAX_PAGES);
        let initial_pages = initial_pages.min(max_pages);
        Self {
            bytes: vec![0; (initial_pages * PAGE_SIZE) as usize],
            max_pages,
        }
    }

    /// Maximum number of pages this memory may reach.
    pub fn max_pages(&self) -> u64 {
        self.max_pages
    }
}

impl LinearMemory for VecMemory {
    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn grow(&mut self, additional_pages: u64) -> MemoryResult<u64> {
        let previous = self.pages();
        let target = previous
            .checked_add(additional_pages)
            .filter(|pages| *pages <= self.max_pages)
            .ok_or_else(|| MemoryError::GrowFailed {
                pages: additional_pages,
                reason: format!("maximum is {} pages", self.max_pages),
            })?;
        self.bytes.resize((target * PAGE_SIZE) as usize, 0);
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_memory_grows_in_pages() {
        let mut memory = VecMemory::new(1, 3);
        assert_eq!(memory.size(), PAGE_SIZE);

        assert_eq!(memory.grow(2).unwrap(), 1);
        assert_eq!(memory.pages(), 3);
        assert!(memory.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_vec_memory_respects_maximum() {
        let mut memory = VecMemory::new(1, 2);
        assert!(matches!(memory.grow(2), Err(MemoryError::GrowFailed { pages: 2, .. })));
        assert_eq!(memory.pages(), 1);
    }
}
