//! The per-call view host functions work through.

use parity_scale_codec::{Decode, Encode};
use tracing::{trace, warn};
use wasmtime::{AsContextMut, Caller, Memory};
use weft_capability::CapabilitySet;
use weft_memory::{MemoryView, Span};

use crate::error::{HostResult, HostTrap};
use crate::execution::{ExecutionContext, HostData};
use crate::memory::GuestMemory;

/// Guest memory and host state for the duration of one host call.
///
/// Arguments are copied out of guest memory, results are written into fresh
/// allocator regions, and every access is bounds checked.
pub struct HostContext<'a> {
    caller: Caller<'a, HostData>,
    memory: Memory,
}

impl<'a> HostContext<'a> {
    /// Wrap `caller`. Fails if the instance has no memory attached yet.
    pub fn new(caller: Caller<'a, HostData>) -> HostResult<Self> {
        let memory = caller.data().state().memory()?;
        Ok(Self { caller, memory })
    }

    /// The execution context of the calling instance.
    pub fn execution(&self) -> &ExecutionContext {
        self.caller.data().state()
    }

    /// The execution context, mutably.
    pub fn execution_mut(&mut self) -> &mut ExecutionContext {
        self.caller.data_mut().state_mut()
    }

    /// The capability backends.
    ///
    /// Returned by value so backends can be called while guest memory is
    /// borrowed.
    pub fn capabilities(&self) -> CapabilitySet {
        self.execution().capabilities().clone()
    }

    fn view(&mut self) -> GuestMemory<'_, HostData> {
        GuestMemory::new(self.memory, self.caller.as_context_mut())
    }

    /// Copy the bytes a span argument points at.
    pub fn read(&mut self, span: i64) -> HostResult<Vec<u8>> {
        Ok(self.view().read(Span::from_wasm(span))?.to_vec())
    }

    /// Fail unless `span` lies entirely inside guest memory.
    pub fn check(&mut self, span: Span) -> HostResult<()> {
        self.view().read(span)?;
        Ok(())
    }

    /// Read a fixed-size argument passed by pointer.
    pub fn read_array<const N: usize>(&mut self, ptr: i32) -> HostResult<[u8; N]> {
        Ok(self.view().read_array::<N>(ptr as u32)?)
    }

    /// Read a span argument holding a SCALE-encoded value.
    pub fn decode<T: Decode>(&mut self, span: i64) -> HostResult<T> {
        let bytes = self.read(span)?;
        Ok(T::decode(&mut bytes.as_slice())?)
    }

    /// Write into guest memory.
    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> HostResult<()> {
        self.view().write(offset, bytes)?;
        Ok(())
    }

    /// Reserve `size` bytes of guest memory.
    pub fn allocate(&mut self, size: u32) -> HostResult<u32> {
        let allocator = self.execution().allocator()?;
        let mut allocator = allocator.lock();
        Ok(allocator.allocate(&mut self.view(), size)?)
    }

    /// Release a region previously returned by [`allocate`](Self::allocate).
    pub fn deallocate(&mut self, offset: u32) -> HostResult<()> {
        let allocator = self.execution().allocator()?;
        allocator.lock().deallocate(offset)?;
        Ok(())
    }

    /// Place `bytes` in a fresh region and return its span.
    pub fn return_bytes(&mut self, bytes: &[u8]) -> HostResult<i64> {
        let offset = self.allocate(bytes.len() as u32)?;
        self.write(offset, bytes)?;
        Ok(Span::new(offset, bytes.len() as u32).to_wasm())
    }

    /// SCALE-encode `value` and return it as a span.
    pub fn return_encoded<T: Encode>(&mut self, value: &T) -> HostResult<i64> {
        self.return_bytes(&value.encode())
    }

    /// Place a fixed-size result in a fresh region and return its pointer.
    pub fn return_fixed(&mut self, bytes: &[u8]) -> HostResult<i32> {
        let offset = self.allocate(bytes.len() as u32)?;
        self.write(offset, bytes)?;
        Ok(offset as i32)
    }
}

/// Run a host function body.
///
/// Counts the call, builds the [`HostContext`], and turns a failure into a
/// [`HostTrap`] naming `import`.
pub fn host_call<R>(
    mut caller: Caller<'_, HostData>,
    import: &'static str,
    body: impl FnOnce(&mut HostContext<'_>) -> HostResult<R>,
) -> wasmtime::Result<R> {
    trace!(import, "Host call");
    caller.data_mut().metrics.host_calls += 1;

    HostContext::new(caller)
        .and_then(|mut ctx| body(&mut ctx))
        .map_err(|source| {
            warn!(import, error = %source, "Host function trapped");
            wasmtime::Error::new(HostTrap { import, source })
        })
}

/// Run a host function body that never traps.
///
/// The body gets `None` when there is no [`HostContext`] to give it, which
/// happens when a start function calls in before memory is attached.
pub fn host_call_infallible(
    mut caller: Caller<'_, HostData>,
    import: &'static str,
    body: impl FnOnce(Option<&mut HostContext<'_>>),
) -> wasmtime::Result<()> {
    trace!(import, "Host call");
    caller.data_mut().metrics.host_calls += 1;

    match HostContext::new(caller) {
        Ok(mut ctx) => body(Some(&mut ctx)),
        Err(err) => {
            trace!(import, error = %err, "No guest memory yet");
            body(None)
        }
    }
    Ok(())
}
