//! Host-side allocator for regions inside guest linear memory.
//!
//! The guest has no allocator of its own, so the host hands out regions of
//! the guest's memory above the heap base. Bookkeeping lives entirely on the
//! host: the guest only ever sees offsets.
//!
//! Placement is first-fit over free regions in address order. Oversized
//! regions are split and the remainder stays free. When nothing fits, memory
//! grows by whole pages and the new space joins the free tail of the heap.
//! Freed regions merge with free neighbours, so the table never holds two
//! adjacent free regions.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{MemoryError, MemoryResult};
use crate::linear::{LinearMemory, MAX_PAGES, PAGE_SIZE};

/// Granularity and alignment of every allocation.
pub const ALIGNMENT: u32 = 8;

const MAX_MEMORY_BYTES: u64 = MAX_PAGES * PAGE_SIZE;

/// A live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsedRegion {
    /// Start offset.
    pub offset: u32,
    /// Bytes reserved, after alignment.
    pub size: u32,
    /// Bytes the caller asked for.
    pub requested: u32,
}

/// Counters kept by the allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Successful deallocations.
    pub deallocations: u64,
    /// Reserved bytes currently in use.
    pub bytes_in_use: u64,
    /// High-water mark of `bytes_in_use`.
    pub peak_bytes_in_use: u64,
    /// Pages the allocator grew memory by.
    pub pages_grown: u64,
}

/// First-fit allocator over one guest memory.
#[derive(Debug, Clone)]
pub struct HeapAllocator {
    heap_base: u32,
    /// End of the address range the region table covers.
    heap_end: u64,
    /// Free regions, offset to size.
    free: BTreeMap<u32, u32>,
    used: BTreeMap<u32, UsedRegion>,
    stats: AllocatorStats,
}

impl HeapAllocator {
    /// Create an allocator whose heap starts at `heap_base`.
    ///
    /// The base is rounded up to [`ALIGNMENT`] and is never zero, so zero is
    /// never handed out and can stand for "no allocation".
    pub fn new(heap_base: u32) -> Self {
        let heap_base = align_up(heap_base.max(1) as u64).min(u32::MAX as u64 & !7) as u32;
        Self {
            heap_base,
            heap_end: heap_base as u64,
            free: BTreeMap::new(),
            used: BTreeMap::new(),
            stats: AllocatorStats::default(),
        }
    }

    /// First byte managed by this allocator.
    pub fn heap_base(&self) -> u32 {
        self.heap_base
    }

    /// Usage counters.
    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }

    /// Live allocations in address order.
    pub fn used_regions(&self) -> impl Iterator<Item = &UsedRegion> {
        self.used.values()
    }

    /// Free regions in address order, as `(offset, size)`.
    pub fn free_regions(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.free.iter().map(|(offset, size)| (*offset, *size))
    }

    /// The live allocation starting at `offset`, if any.
    pub fn allocation(&self, offset: u32) -> Option<&UsedRegion> {
        self.used.get(&offset)
    }

    /// Reserve `size` bytes and return the offset of the region.
    ///
    /// A zero-size request still reserves one granule, so the result never
    /// aliases another live allocation and can be deallocated.
    ///
    /// # Errors
    ///
    /// [`MemoryError::OutOfMemory`] when no free region fits and memory
    /// cannot grow far enough. The region table is unchanged in that case.
    pub fn allocate<M: LinearMemory + ?Sized>(
        &mut self,
        memory: &mut M,
        size: u32,
    ) -> MemoryResult<u32> {
        self.absorb_growth(memory.size());

        let needed = align_up(size.max(1) as u64);
        let out_of_memory = MemoryError::OutOfMemory {
            requested: size as u64,
        };

        let fit = self
            .free
            .iter()
            .find(|(_, free)| **free as u64 >= needed)
            .map(|(offset, free)| (*offset, *free));

        let (offset, free) = match fit {
            Some(region) => region,
            None => {
                self.grow_for(memory, needed)
                    .map_err(|_| out_of_memory.clone())?;
                self.tail_region().ok_or(out_of_memory)?
            }
        };

        Ok(self.take(offset, free, needed as u32, size))
    }

    /// Release the allocation starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidPointer`] unless `offset` starts a live
    /// allocation; this covers double frees.
    pub fn deallocate(&mut self, offset: u32) -> MemoryResult<()> {
        let region = self
            .used
            .remove(&offset)
            .ok_or(MemoryError::InvalidPointer { offset })?;

        self.stats.deallocations += 1;
        self.stats.bytes_in_use -= region.size as u64;
        self.release(region.offset, region.size);

        trace!(offset, size = region.size, "Freed guest region");
        Ok(())
    }

    /// Bring memory growth done outside the allocator into the free tail.
    fn absorb_growth(&mut self, memory_size: u64) {
        if memory_size <= self.heap_end {
            return;
        }
        let start = self.heap_end as u32;
        let len = (memory_size - self.heap_end) as u32;
        self.heap_end = memory_size;
        self.release(start, len);
    }

    /// Grow memory so the free tail holds at least `needed` bytes.
    fn grow_for<M: LinearMemory + ?Sized>(
        &mut self,
        memory: &mut M,
        needed: u64,
    ) -> MemoryResult<()> {
        let tail_start = self
            .tail_region()
            .map(|(offset, _)| offset as u64)
            .unwrap_or(self.heap_end);
        let required_end = tail_start + needed;
        if required_end > MAX_MEMORY_BYTES {
            return Err(MemoryError::OutOfMemory { requested: needed });
        }

        let current = memory.size();
        let pages = required_end.saturating_sub(current).div_ceil(PAGE_SIZE);
        memory.grow(pages)?;

        self.stats.pages_grown += pages;
        debug!(pages, new_size = memory.size(), "Grew guest memory for allocation");

        self.absorb_growth(memory.size());
        Ok(())
    }

    /// The free region that ends at the heap end, if there is one.
    fn tail_region(&self) -> Option<(u32, u32)> {
        self.free
            .iter()
            .next_back()
            .filter(|(offset, size)| **offset as u64 + **size as u64 == self.heap_end)
            .map(|(offset, size)| (*offset, *size))
    }

    fn take(&mut self, offset: u32, free: u32, size: u32, requested: u32) -> u32 {
        self.free.remove(&offset);
        if free > size {
            self.free.insert(offset + size, free - size);
        }

        self.used.insert(
            offset,
            UsedRegion {
                offset,
                size,
                requested,
            },
        );

        self.stats.allocations += 1;
        self.stats.bytes_in_use += size as u64;
        self.stats.peak_bytes_in_use = self.stats.peak_bytes_in_use.max(self.stats.bytes_in_use);

        trace!(offset, size, requested, "Allocated guest region");
        offset
    }

    /// Mark `[offset, offset + size)` free, merging with neighbours.
    fn release(&mut self, mut offset: u32, mut size: u32) {
        if let Some((prev_offset, prev_size)) = self
            .free
            .range(..offset)
            .next_back()
            .map(|(o, s)| (*o, *s))
        {
            if prev_offset as u64 + prev_size as u64 == offset as u64 {
                self.free.remove(&prev_offset);
                offset = prev_offset;
                size += prev_size;
            }
        }

        let next = offset as u64 + size as u64;
        if next <= u32::MAX as u64 {
            if let Some(next_size) = self.free.remove(&(next as u32)) {
                size += next_size;
            }
        }

        self.free.insert(offset, size);
    }
}

fn align_up(value: u64) -> u64 {
    let mask = ALIGNMENT as u64 - 1;
    (value + mask) & !mask
}
