//! Host-side settings for a guest instance.

use weft_memory::MAX_PAGES;

/// Settings that shape how the host prepares a guest's memory.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Start of the heap. When unset the guest's `__heap_base` export is
    /// used, and failing that the memory size at instantiation.
    pub heap_base: Option<u32>,

    /// Cap on the maximum of a memory the host creates for a guest that
    /// imports `env.memory`.
    ///
    /// Defaults to 2048 pages (128MB).
    pub max_memory_pages: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            heap_base: None,
            max_memory_pages: 2048,
        }
    }
}

impl HostConfig {
    /// Create a host configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the heap to start at `heap_base`.
    pub fn with_heap_base(mut self, heap_base: u32) -> Self {
        self.heap_base = Some(heap_base);
        self
    }

    /// Set the page cap for host-created memory.
    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages.min(MAX_PAGES as u32);
        self
    }
}
