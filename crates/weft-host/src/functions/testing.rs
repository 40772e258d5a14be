//! Helpers for driving host functions from small WAT guests.

use weft_capability::CapabilitySet;
use weft_core::{
    ExecutionError, ExecutionResult, GuestInstance, InstanceConfig, IntoShared, ModuleLoader,
    WeftEngine,
};
use weft_memory::Span;

use crate::config::HostConfig;
use crate::error::HostTrap;
use crate::execution::ExecutionContext;
use crate::linker::HostLinker;

/// Heap start used by every test guest; data segments live below it.
pub(crate) const HEAP_BASE: u32 = 4096;

pub(crate) struct Harness {
    pub instance: GuestInstance<ExecutionContext>,
}

impl Harness {
    /// Instantiate `body` (imports, data and funcs) with a one-page exported
    /// memory and in-memory backends.
    pub fn new(body: &str) -> Self {
        Self::with_capabilities(body, CapabilitySet::in_memory())
    }

    pub fn with_capabilities(body: &str, capabilities: CapabilitySet) -> Self {
        let engine = WeftEngine::default_engine().unwrap().into_shared();
        let module = ModuleLoader::new(engine.clone())
            .load_wat(&format!(r#"(module {body} (memory (export "memory") 1))"#))
            .unwrap();
        let instance = HostLinker::standard(&engine)
            .unwrap()
            .instantiate(
                engine,
                &module,
                ExecutionContext::new(capabilities),
                &HostConfig::new().with_heap_base(HEAP_BASE),
                InstanceConfig::default(),
            )
            .unwrap();
        Self { instance }
    }

    pub fn call_void(&mut self, name: &str) -> ExecutionResult<()> {
        self.instance.call::<(), ()>(name, ())
    }

    pub fn call_i32(&mut self, name: &str) -> ExecutionResult<i32> {
        self.instance.call::<(), i32>(name, ())
    }

    /// Call an export returning a span and copy out what it points at.
    pub fn call_span(&mut self, name: &str) -> ExecutionResult<Vec<u8>> {
        let span = Span::from_wasm(self.instance.call::<(), i64>(name, ())?);
        Ok(self.read(span.offset, span.len as usize))
    }

    /// Call an export returning a pointer and copy `len` bytes from it.
    pub fn call_fixed(&mut self, name: &str, len: usize) -> ExecutionResult<Vec<u8>> {
        let ptr = self.instance.call::<(), i32>(name, ())?;
        Ok(self.read(ptr as u32, len))
    }

    pub fn read(&self, offset: u32, len: usize) -> Vec<u8> {
        let memory = self.execution().memory().unwrap();
        let start = offset as usize;
        memory.data(self.instance.store())[start..start + len].to_vec()
    }

    pub fn write(&mut self, offset: u32, bytes: &[u8]) {
        let memory = self.execution().memory().unwrap();
        let start = offset as usize;
        memory.data_mut(self.instance.store_mut())[start..start + bytes.len()]
            .copy_from_slice(bytes);
    }

    pub fn execution(&self) -> &ExecutionContext {
        self.instance.state()
    }
}

/// The host trap behind a failed guest call.
pub(crate) fn host_trap(err: &ExecutionError) -> &HostTrap {
    err.host_error::<HostTrap>()
        .unwrap_or_else(|| panic!("expected a host trap, got {err:?}"))
}

/// Pack `(offset, len)` for use as a WAT `i64.const`.
pub(crate) fn span(offset: u32, len: u32) -> i64 {
    Span::new(offset, len).to_wasm()
}
