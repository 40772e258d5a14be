//! Hash functions and the ordered trie root.

use wasmtime::Caller;

use crate::context::host_call;
use crate::error::HostResult;
use crate::execution::HostData;
use crate::imports::{
    HASHING_BLAKE2_128, HASHING_BLAKE2_256, HASHING_KECCAK_256, HASHING_SHA2_256,
    HASHING_TWOX_64, HASHING_TWOX_128, TRIE_BLAKE2_256_ORDERED_ROOT,
};
use crate::linker::HostLinker;

/// Register a `span -> ptr` digest function backed by a `Hashing` method.
macro_rules! digest {
    ($linker:expr, $name:expr, $method:ident) => {
        $linker.func_wrap($name, |caller: Caller<'_, HostData>, data: i64| {
            host_call(caller, $name, |ctx| {
                let data = ctx.read(data)?;
                let digest = ctx.capabilities().hashing().$method(&data)?;
                ctx.return_fixed(&digest)
            })
        })?;
    };
}

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    digest!(linker, HASHING_BLAKE2_128, blake2_128);
    digest!(linker, HASHING_BLAKE2_256, blake2_256);
    digest!(linker, HASHING_KECCAK_256, keccak_256);
    digest!(linker, HASHING_SHA2_256, sha2_256);
    digest!(linker, HASHING_TWOX_64, twox_64);
    digest!(linker, HASHING_TWOX_128, twox_128);

    linker.func_wrap(
        TRIE_BLAKE2_256_ORDERED_ROOT,
        |caller: Caller<'_, HostData>, values: i64| {
            host_call(caller, TRIE_BLAKE2_256_ORDERED_ROOT, |ctx| {
                let values: Vec<Vec<u8>> = ctx.decode(values)?;
                let root = ctx.capabilities().hashing().ordered_trie_root(&values)?;
                ctx.return_fixed(&root)
            })
        },
    )?;

    Ok(())
}
