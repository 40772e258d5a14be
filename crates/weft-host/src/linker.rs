//! The host function table.
//!
//! [`HostLinker`] wraps wasmtime's `Linker` with the names of what it
//! registered, so a guest's imports can be checked before anything runs and
//! duplicate registrations are caught.

use tracing::{debug, info};
use wasmtime::{Linker, MemoryType};
use weft_core::{
    GuestInstance, ImportInfo, ImportKind, InstanceConfig, SharedEngine, ValidatedModule,
};

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::execution::{ExecutionContext, HostData};
use crate::functions;
use crate::imports::{ENV, HEAP_BASE, MEMORY};

/// How the host satisfies one guest import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportResolution {
    /// A registered host function.
    HostFunction,
    /// The memory the host creates for the guest.
    HostMemory,
    /// Nothing; instantiation would fail.
    Unresolved,
}

/// The `env` host function table.
#[derive(Clone)]
pub struct HostLinker {
    inner: Linker<HostData>,
    registered: Vec<&'static str>,
}

impl HostLinker {
    /// An empty table.
    pub fn new(engine: &SharedEngine) -> Self {
        Self {
            inner: Linker::new(engine.inner()),
            registered: Vec::new(),
        }
    }

    /// The table with every standard host function registered.
    pub fn standard(engine: &SharedEngine) -> HostResult<Self> {
        let mut linker = Self::new(engine);
        functions::register_all(&mut linker)?;
        info!(functions = linker.registered.len(), "Built host function table");
        Ok(linker)
    }

    /// Get a reference to the underlying Wasmtime linker.
    pub fn inner(&self) -> &Linker<HostData> {
        &self.inner
    }

    /// Names registered so far, in registration order.
    pub fn registered_functions(&self) -> &[&'static str] {
        &self.registered
    }

    /// Check if a function is already registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.iter().any(|registered| *registered == name)
    }

    /// Register a host function under `env.name`.
    pub fn func_wrap<Params, Results>(
        &mut self,
        name: &'static str,
        func: impl wasmtime::IntoFunc<HostData, Params, Results>,
    ) -> HostResult<&mut Self> {
        if self.is_registered(name) {
            return Err(HostError::DuplicateImport {
                name: name.to_string(),
            });
        }

        self.inner
            .func_wrap(ENV, name, func)
            .map_err(|e| HostError::RegistrationFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        self.registered.push(name);
        debug!(name, "Registered host function");
        Ok(self)
    }

    /// How `import` would be satisfied.
    pub fn resolve(&self, import: &ImportInfo) -> ImportResolution {
        if import.module != ENV {
            return ImportResolution::Unresolved;
        }
        match import.kind {
            ImportKind::Memory { .. } if import.name == MEMORY => ImportResolution::HostMemory,
            ImportKind::Function { .. } if self.is_registered(&import.name) => {
                ImportResolution::HostFunction
            }
            _ => ImportResolution::Unresolved,
        }
    }

    /// Check a guest's imports against the table.
    ///
    /// # Errors
    ///
    /// [`HostError::UnknownImport`] for the first import the table cannot
    /// satisfy, [`HostError::MissingMemory`] if the guest has no memory.
    pub fn check_module(&self, module: &ValidatedModule) -> HostResult<()> {
        if let Some(import) = module
            .imports()
            .iter()
            .find(|import| self.resolve(import) == ImportResolution::Unresolved)
        {
            return Err(HostError::UnknownImport {
                module: import.module.clone(),
                name: import.name.clone(),
            });
        }

        if module.memory_import().is_none() && !module.exports_memory(MEMORY) {
            return Err(HostError::MissingMemory);
        }

        Ok(())
    }

    /// Check, instantiate and attach memory for `module`.
    ///
    /// A guest importing `env.memory` gets a memory created from the import's
    /// declared limits, with the maximum capped by `host_config`. Otherwise
    /// its exported `memory` is used.
    pub fn instantiate(
        &self,
        engine: SharedEngine,
        module: &ValidatedModule,
        execution: ExecutionContext,
        host_config: &HostConfig,
        instance_config: InstanceConfig,
    ) -> HostResult<GuestInstance<ExecutionContext>> {
        self.check_module(module)?;

        let mut instance =
            GuestInstance::with_linker(engine, self.inner.clone(), execution, instance_config)?;

        let imported = match module.memory_import().map(|import| &import.kind) {
            Some(ImportKind::Memory {
                min_pages,
                max_pages,
            }) => {
                let ty = host_memory_type(*min_pages, *max_pages, host_config)?;
                Some(instance.define_memory(ENV, MEMORY, ty)?)
            }
            _ => None,
        };

        instance.instantiate(module)?;

        let memory = match imported {
            Some(memory) => memory,
            None => instance
                .exported_memory(MEMORY)
                .ok_or(HostError::MissingMemory)?,
        };

        let heap_base = match host_config.heap_base {
            Some(base) => base,
            None => match instance.exported_global_i32(HEAP_BASE) {
                Some(base) => base as u32,
                None => memory.data_size(instance.store()) as u32,
            },
        };

        instance.state_mut().attach_memory(memory, heap_base);
        Ok(instance)
    }
}

fn host_memory_type(
    min_pages: u64,
    max_pages: Option<u64>,
    host_config: &HostConfig,
) -> HostResult<MemoryType> {
    let cap = host_config.max_memory_pages as u64;
    let max = max_pages.map_or(cap, |declared| declared.min(cap));
    if min_pages > max {
        return Err(HostError::Memory(weft_memory::MemoryError::GrowFailed {
            pages: min_pages,
            reason: format!("guest needs {min_pages} pages, limit is {max}"),
        }));
    }
    Ok(MemoryType::new(min_pages as u32, Some(max as u32)))
}

impl std::fmt::Debug for HostLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLinker")
            .field("registered_functions", &self.registered.len())
            .finish()
    }
}
