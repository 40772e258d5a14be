//! Nested sandbox functions.
//!
//! Backend failures become status codes the guest can branch on. A backend
//! that does not support sandboxing at all makes the call trap.

use tracing::debug;
use wasmtime::Caller;
use weft_capability::CapabilityResult;
use weft_memory::Span;

use crate::context::host_call;
use crate::error::{HostError, HostResult};
use crate::execution::HostData;
use crate::imports::{
    SANDBOX_INSTANCE_TEARDOWN, SANDBOX_INSTANTIATE, SANDBOX_INVOKE, SANDBOX_MEMORY_GET,
    SANDBOX_MEMORY_NEW, SANDBOX_MEMORY_SET, SANDBOX_MEMORY_TEARDOWN,
};
use crate::linker::HostLinker;

/// Success.
pub const ERR_OK: u32 = 0;
/// The sandboxed code failed while running.
pub const ERR_EXECUTION: u32 = u32::MAX;
/// A buffer was outside the memory it refers to.
pub const ERR_OUT_OF_BOUNDS: u32 = u32::MAX - 1;
/// The module could not be instantiated.
pub const ERR_MODULE: u32 = u32::MAX - 2;

/// Split a backend result into a value or a status code.
///
/// `Unsupported` is not a status: it comes back as a host error.
fn status<T>(result: CapabilityResult<T>, failure: u32) -> HostResult<Result<T, u32>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err) if err.is_unsupported() => Err(err.into()),
        Err(err) => {
            debug!(error = %err, code = failure as i32, "Sandbox backend failed");
            Ok(Err(failure))
        }
    }
}

/// Memory errors on guest buffers become [`ERR_OUT_OF_BOUNDS`].
fn bounds(result: HostResult<()>) -> HostResult<u32> {
    match result {
        Ok(()) => Ok(ERR_OK),
        Err(HostError::Memory(err)) => {
            debug!(error = %err, "Sandbox buffer out of bounds");
            Ok(ERR_OUT_OF_BOUNDS)
        }
        Err(err) => Err(err),
    }
}

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(
        SANDBOX_INSTANTIATE,
        |caller: Caller<'_, HostData>, dispatch_thunk: i32, code: i64, env: i64, state: i32| {
            host_call(caller, SANDBOX_INSTANTIATE, |ctx| {
                let code = ctx.read(code)?;
                let env = ctx.read(env)?;
                let instance = ctx.capabilities().sandbox().instantiate(
                    dispatch_thunk as u32,
                    &code,
                    &env,
                    state as u32,
                );
                Ok(match status(instance, ERR_MODULE)? {
                    Ok(index) => index as i32,
                    Err(code) => code as i32,
                })
            })
        },
    )?;

    linker.func_wrap(
        SANDBOX_INVOKE,
        |caller: Caller<'_, HostData>,
         instance: i32,
         function: i64,
         args: i64,
         return_ptr: i32,
         return_len: i32,
         state: i32| {
            host_call(caller, SANDBOX_INVOKE, |ctx| {
                let Ok(function) = String::from_utf8(ctx.read(function)?) else {
                    return Ok(ERR_EXECUTION as i32);
                };
                let args = ctx.read(args)?;
                let returned = ctx.capabilities().sandbox().invoke(
                    instance as u32,
                    &function,
                    &args,
                    state as u32,
                );
                let returned = match status(returned, ERR_EXECUTION)? {
                    Ok(returned) => returned,
                    Err(code) => return Ok(code as i32),
                };
                if returned.len() > return_len as u32 as usize {
                    return Ok(ERR_OUT_OF_BOUNDS as i32);
                }
                Ok(bounds(ctx.write(return_ptr as u32, &returned))? as i32)
            })
        },
    )?;

    linker.func_wrap(
        SANDBOX_INSTANCE_TEARDOWN,
        |caller: Caller<'_, HostData>, instance: i32| {
            host_call(caller, SANDBOX_INSTANCE_TEARDOWN, |ctx| {
                ctx.capabilities().sandbox().instance_teardown(instance as u32)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(
        SANDBOX_MEMORY_NEW,
        |caller: Caller<'_, HostData>, initial: i32, maximum: i32| {
            host_call(caller, SANDBOX_MEMORY_NEW, |ctx| {
                let memory = ctx
                    .capabilities()
                    .sandbox()
                    .memory_new(initial as u32, maximum as u32);
                Ok(match status(memory, ERR_MODULE)? {
                    Ok(index) => index as i32,
                    Err(code) => code as i32,
                })
            })
        },
    )?;

    linker.func_wrap(
        SANDBOX_MEMORY_GET,
        |caller: Caller<'_, HostData>, memory: i32, offset: i32, buf_ptr: i32, buf_len: i32| {
            host_call(caller, SANDBOX_MEMORY_GET, |ctx| {
                let data = ctx.capabilities().sandbox().memory_get(
                    memory as u32,
                    offset as u32,
                    buf_len as u32,
                );
                let data = match status(data, ERR_OUT_OF_BOUNDS)? {
                    Ok(data) => data,
                    Err(code) => return Ok(code as i32),
                };
                Ok(bounds(ctx.write(buf_ptr as u32, &data))? as i32)
            })
        },
    )?;

    linker.func_wrap(
        SANDBOX_MEMORY_SET,
        |caller: Caller<'_, HostData>, memory: i32, offset: i32, val_ptr: i32, val_len: i32| {
            host_call(caller, SANDBOX_MEMORY_SET, |ctx| {
                let value = Span::new(val_ptr as u32, val_len as u32);
                let data = match ctx.read(value.to_wasm()) {
                    Ok(data) => data,
                    Err(HostError::Memory(_)) => return Ok(ERR_OUT_OF_BOUNDS as i32),
                    Err(err) => return Err(err),
                };
                let written = ctx
                    .capabilities()
                    .sandbox()
                    .memory_set(memory as u32, offset as u32, &data);
                Ok(match status(written, ERR_OUT_OF_BOUNDS)? {
                    Ok(()) => ERR_OK as i32,
                    Err(code) => code as i32,
                })
            })
        },
    )?;

    linker.func_wrap(
        SANDBOX_MEMORY_TEARDOWN,
        |caller: Caller<'_, HostData>, memory: i32| {
            host_call(caller, SANDBOX_MEMORY_TEARDOWN, |ctx| {
                ctx.capabilities().sandbox().memory_teardown(memory as u32)?;
                Ok(())
            })
        },
    )?;

    Ok(())
}
