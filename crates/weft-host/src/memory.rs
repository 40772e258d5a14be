//! Guest linear memory as seen through a wasmtime store.

use wasmtime::{AsContextMut, Memory, StoreContextMut};
use weft_memory::{LinearMemory, MemoryError, MemoryResult};

/// A wasmtime [`Memory`] paired with the store that owns it.
///
/// Lets the allocator and the memory view from `weft-memory` work on the
/// guest's real memory during a host call.
pub struct GuestMemory<'a, T: 'static> {
    memory: Memory,
    store: StoreContextMut<'a, T>,
}

impl<'a, T: 'static> GuestMemory<'a, T> {
    /// Borrow `memory` through `store`.
    pub fn new(memory: Memory, store: impl Into<StoreContextMut<'a, T>>) -> Self {
        Self {
            memory,
            store: store.into(),
        }
    }
}

impl<T: 'static> LinearMemory for GuestMemory<'_, T> {
    fn data(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }

    fn grow(&mut self, additional_pages: u64) -> MemoryResult<u64> {
        self.memory
            .grow(self.store.as_context_mut(), additional_pages)
            .map_err(|err| MemoryError::GrowFailed {
                pages: additional_pages,
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, MemoryType, Store};
    use weft_memory::{HeapAllocator, MemoryView, PAGE_SIZE, Span};

    #[test]
    fn test_view_over_wasmtime_memory() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let memory = Memory::new(&mut store, MemoryType::new(1, Some(2))).unwrap();

        let mut guest = GuestMemory::new(memory, &mut store);
        guest.write(16, b"weft").unwrap();
        assert_eq!(guest.read(Span::new(16, 4)).unwrap(), b"weft");
        assert!(guest.read(Span::new(PAGE_SIZE as u32 - 2, 4)).is_err());
    }

    #[test]
    fn test_allocator_grows_wasmtime_memory() {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let memory = Memory::new(&mut store, MemoryType::new(1, Some(3))).unwrap();
        let mut allocator = HeapAllocator::new(1024);

        let offset = {
            let mut guest = GuestMemory::new(memory, &mut store);
            allocator.allocate(&mut guest, PAGE_SIZE as u32).unwrap()
        };

        assert!(offset >= 1024);
        assert_eq!(memory.size(&store), 2);

        let mut guest = GuestMemory::new(memory, &mut store);
        let err = allocator.allocate(&mut guest, 4 * PAGE_SIZE as u32).unwrap_err();
        assert!(matches!(err, MemoryError::OutOfMemory { .. }));
        assert_eq!(memory.size(&store), 2);
    }
}
