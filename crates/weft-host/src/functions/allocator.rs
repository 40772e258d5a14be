//! Guest-facing allocator.

use tracing::warn;
use wasmtime::Caller;
use weft_memory::MemoryError;

use crate::context::host_call;
use crate::error::{HostError, HostResult};
use crate::execution::HostData;
use crate::imports::{ALLOCATOR_FREE, ALLOCATOR_MALLOC};
use crate::linker::HostLinker;

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(
        ALLOCATOR_MALLOC,
        |caller: Caller<'_, HostData>, size: i32| {
            host_call(caller, ALLOCATOR_MALLOC, |ctx| {
                match ctx.allocate(size as u32) {
                    Ok(offset) => Ok(offset as i32),
                    // The null pointer is the only failure signal malloc has.
                    Err(HostError::Memory(MemoryError::OutOfMemory { requested })) => {
                        warn!(requested, "Guest allocation failed");
                        Ok(0)
                    }
                    Err(err) => Err(err),
                }
            })
        },
    )?;

    linker.func_wrap(
        ALLOCATOR_FREE,
        |caller: Caller<'_, HostData>, ptr: i32| {
            host_call(caller, ALLOCATOR_FREE, |ctx| ctx.deallocate(ptr as u32))
        },
    )?;

    Ok(())
}
