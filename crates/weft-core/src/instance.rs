//! Guest instances.
//!
//! A [`GuestInstance`] owns one wasmtime store and at most one instantiated
//! module. The host state `S` lives in the store, so host functions reach it
//! through their `Caller`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;
use wasmtime::{
    Instance, Linker, Memory, MemoryType, Store, StoreLimits, StoreLimitsBuilder, Trap, Val,
};

use crate::config::{InstanceConfig, ResourceLimits};
use crate::engine::SharedEngine;
use crate::error::{ExecutionError, ExecutionResult, TrapInfo};
use crate::module::ValidatedModule;
use crate::ticker::EPOCH_TICK;

/// Unique identifier for a guest instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Create a new random instance ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data stored in the wasmtime store.
pub struct InstanceData<S = ()> {
    /// Unique identifier for this instance.
    pub id: InstanceId,
    /// Host state.
    pub state: S,
    /// Store resource limits.
    pub limits: StoreLimits,
    /// Execution metrics.
    pub metrics: InstanceMetrics,
    config: InstanceConfig,
}

impl<S> InstanceData<S> {
    /// Access the host state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Access the host state mutably.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// The configuration the instance was created with.
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }
}

/// Metrics collected while calling into a guest.
#[derive(Debug, Clone, Default)]
pub struct InstanceMetrics {
    /// When the last call started.
    pub start_time: Option<Instant>,
    /// When the last call ended.
    pub end_time: Option<Instant>,
    /// Fuel consumed by the last call.
    pub fuel_consumed: u64,
    /// Host function calls made over the instance's lifetime.
    pub host_calls: u64,
    /// Guest calls made over the instance's lifetime.
    pub calls: u64,
}

impl InstanceMetrics {
    /// Duration of the last call.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}

/// One guest module instantiated in its own store.
///
/// # Example
///
/// ```
/// use weft_core::{GuestInstance, InstanceConfig, IntoShared, ModuleLoader, WeftEngine};
///
/// let engine = WeftEngine::default_engine().unwrap().into_shared();
/// let module = ModuleLoader::new(engine.clone())
///     .load_wat(r#"(module (func (export "answer") (result i32) i32.const 42))"#)
///     .unwrap();
///
/// let mut instance = GuestInstance::new(engine, (), InstanceConfig::default()).unwrap();
/// instance.instantiate(&module).unwrap();
/// let answer: i32 = instance.call("answer", ()).unwrap();
/// assert_eq!(answer, 42);
/// ```
pub struct GuestInstance<S = ()> {
    engine: SharedEngine,
    store: Store<InstanceData<S>>,
    linker: Linker<InstanceData<S>>,
    instance: Option<Instance>,
    module: Option<ValidatedModule>,
}

impl<S: Send + 'static> GuestInstance<S> {
    /// Create an instance with an empty linker.
    pub fn new(engine: SharedEngine, state: S, config: InstanceConfig) -> ExecutionResult<Self> {
        let linker = Linker::new(engine.inner());
        Self::with_linker(engine, linker, state, config)
    }

    /// Create an instance that resolves imports through `linker`.
    pub fn with_linker(
        engine: SharedEngine,
        linker: Linker<InstanceData<S>>,
        state: S,
        config: InstanceConfig,
    ) -> ExecutionResult<Self> {
        let id = InstanceId::new();

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.limits.max_memory_bytes)
            .table_elements(config.limits.max_table_elements as usize)
            .instances(1)
            .tables(10)
            .memories(1)
            .build();

        let data = InstanceData {
            id,
            state,
            limits,
            metrics: InstanceMetrics::default(),
            config: config.clone(),
        };

        let mut store = Store::new(engine.inner(), data);
        store.limiter(|data| &mut data.limits);

        if engine.fuel_enabled() {
            store.set_fuel(config.limits.initial_fuel)?;
        }

        if engine.epoch_enabled() {
            let ticks = (config.limits.timeout.as_millis() / EPOCH_TICK.as_millis()) as u64;
            store.epoch_deadline_trap();
            store.set_epoch_deadline(ticks.max(1));
        }

        info!(instance_id = %id, "Created guest instance");

        Ok(Self {
            engine,
            store,
            linker,
            instance: None,
            module: None,
        })
    }

    /// Get the instance ID.
    pub fn id(&self) -> InstanceId {
        self.store.data().id
    }

    /// Get a reference to the engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Access the host state.
    pub fn state(&self) -> &S {
        &self.store.data().state
    }

    /// Access the host state mutably.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.store.data_mut().state
    }

    /// Get the execution metrics.
    pub fn metrics(&self) -> &InstanceMetrics {
        &self.store.data().metrics
    }

    /// The wasmtime store.
    pub fn store(&self) -> &Store<InstanceData<S>> {
        &self.store
    }

    /// The wasmtime store, mutably.
    pub fn store_mut(&mut self) -> &mut Store<InstanceData<S>> {
        &mut self.store
    }

    /// The linker, for registering further host functions before
    /// instantiation.
    pub fn linker_mut(&mut self) -> &mut Linker<InstanceData<S>> {
        &mut self.linker
    }

    /// Create a memory in this store and offer it to the guest as the import
    /// `module.name`.
    pub fn define_memory(
        &mut self,
        module: &str,
        name: &str,
        ty: MemoryType,
    ) -> ExecutionResult<Memory> {
        let memory = Memory::new(&mut self.store, ty)?;
        self.linker.define(&self.store, module, name, memory)?;

        debug!(
            instance_id = %self.id(),
            module,
            name,
            pages = memory.size(&self.store),
            "Defined host memory"
        );
        Ok(memory)
    }

    /// Instantiate `module`, running its start function.
    ///
    /// An instance holds one module for its whole life.
    pub fn instantiate(&mut self, module: &ValidatedModule) -> ExecutionResult<()> {
        if self.instance.is_some() {
            return Err(ExecutionError::AlreadyInstantiated);
        }

        debug!(
            instance_id = %self.id(),
            module_name = ?module.name(),
            "Instantiating module"
        );

        let instance = self
            .linker
            .instantiate(&mut self.store, module.inner())
            .map_err(|err| self.classify("<start>", err))?;

        self.instance = Some(instance);
        self.module = Some(module.clone());

        info!(
            instance_id = %self.id(),
            module_name = ?module.name(),
            "Module instantiated"
        );

        Ok(())
    }

    /// Check if a module has been instantiated.
    pub fn is_instantiated(&self) -> bool {
        self.instance.is_some()
    }

    /// The instantiated module.
    pub fn module(&self) -> Option<&ValidatedModule> {
        self.module.as_ref()
    }

    /// A memory exported by the guest.
    pub fn exported_memory(&mut self, name: &str) -> Option<Memory> {
        let instance = self.instance.as_ref()?;
        instance.get_memory(&mut self.store, name)
    }

    /// The value of an exported `i32` global.
    pub fn exported_global_i32(&mut self, name: &str) -> Option<i32> {
        let instance = self.instance.as_ref()?;
        let global = instance.get_global(&mut self.store, name)?;
        global.get(&mut self.store).i32()
    }

    /// Call a typed export.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> ExecutionResult<R>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        let instance = self.instance.as_ref().ok_or(ExecutionError::NotInstantiated)?;

        let func = instance
            .get_typed_func::<P, R>(&mut self.store, name)
            .map_err(|_| ExecutionError::FunctionNotFound(name.to_string()))?;

        let initial_fuel = self.begin_call(name);
        let result = func.call(&mut self.store, params);
        self.end_call(initial_fuel);

        match result {
            Ok(value) => {
                info!(
                    instance_id = %self.id(),
                    function = name,
                    duration = ?self.metrics().duration(),
                    "Guest call completed"
                );
                Ok(value)
            }
            Err(err) => Err(self.classify(name, err)),
        }
    }

    /// Call an export whose signature is only known at runtime.
    pub fn call_dynamic(&mut self, name: &str, params: &[Val]) -> ExecutionResult<Vec<Val>> {
        let instance = self.instance.as_ref().ok_or(ExecutionError::NotInstantiated)?;

        let func = instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| ExecutionError::FunctionNotFound(name.to_string()))?;

        let result_count = func.ty(&self.store).results().len();
        let mut results = vec![Val::I32(0); result_count];

        let initial_fuel = self.begin_call(name);
        let result = func.call(&mut self.store, params, &mut results);
        self.end_call(initial_fuel);

        match result {
            Ok(()) => {
                info!(instance_id = %self.id(), function = name, "Guest call completed");
                Ok(results)
            }
            Err(err) => Err(self.classify(name, err)),
        }
    }

    /// The type of an exported function.
    pub fn func_type(&mut self, name: &str) -> Option<wasmtime::FuncType> {
        let instance = self.instance.as_ref()?;
        let func = instance.get_func(&mut self.store, name)?;
        Some(func.ty(&self.store))
    }

    /// Get the remaining fuel.
    pub fn remaining_fuel(&self) -> Option<u64> {
        if self.engine.fuel_enabled() {
            self.store.get_fuel().ok()
        } else {
            None
        }
    }

    /// Add more fuel.
    pub fn add_fuel(&mut self, fuel: u64) -> ExecutionResult<()> {
        if self.engine.fuel_enabled() {
            let current = self.store.get_fuel()?;
            let total = current.saturating_add(fuel);
            self.store.set_fuel(total)?;
            debug!(instance_id = %self.id(), added = fuel, total, "Added fuel");
        }
        Ok(())
    }

    fn begin_call(&mut self, name: &str) -> u64 {
        debug!(instance_id = %self.id(), function = name, "Calling guest");

        let initial_fuel = self.remaining_fuel().unwrap_or(0);
        let metrics = &mut self.store.data_mut().metrics;
        metrics.calls += 1;
        metrics.start_time = Some(Instant::now());
        metrics.end_time = None;
        initial_fuel
    }

    fn end_call(&mut self, initial_fuel: u64) {
        if !self.store.data().config.collect_metrics {
            return;
        }
        let remaining = self.remaining_fuel().unwrap_or(0);
        let metrics = &mut self.store.data_mut().metrics;
        metrics.end_time = Some(Instant::now());
        metrics.fuel_consumed = initial_fuel.saturating_sub(remaining);
    }

    fn classify(&self, name: &str, err: wasmtime::Error) -> ExecutionError {
        let limits: &ResourceLimits = &self.store.data().config.limits;

        let Some(trap) = err.downcast_ref::<Trap>() else {
            warn!(instance_id = %self.id(), function = name, error = %err, "Guest call failed");
            return ExecutionError::Wasmtime(err);
        };

        match trap {
            Trap::OutOfFuel => {
                warn!(instance_id = %self.id(), function = name, "Out of fuel");
                ExecutionError::OutOfFuel {
                    consumed: self.store.data().metrics.fuel_consumed,
                    limit: limits.initial_fuel,
                }
            }
            Trap::Interrupt => {
                warn!(instance_id = %self.id(), function = name, "Execution timeout");
                ExecutionError::Timeout(limits.timeout)
            }
            other => {
                warn!(instance_id = %self.id(), function = name, trap = ?other, "Guest trapped");
                ExecutionError::Trap(TrapInfo::from(*other))
            }
        }
    }
}

impl<S: Send + 'static> std::fmt::Debug for GuestInstance<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestInstance")
            .field("id", &self.id())
            .field("instantiated", &self.is_instantiated())
            .field("metrics", self.metrics())
            .finish()
    }
}

/// Builder for guest instances.
pub struct InstanceBuilder<S = ()> {
    engine: SharedEngine,
    config: InstanceConfig,
    linker: Option<Linker<InstanceData<S>>>,
}

impl<S: Send + 'static> InstanceBuilder<S> {
    /// Create a new instance builder.
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            config: InstanceConfig::default(),
            linker: None,
        }
    }

    /// Set the instance configuration.
    pub fn with_config(mut self, config: InstanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Set the memory limit.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.config.limits.max_memory_bytes = bytes;
        self
    }

    /// Set the fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.config.limits.initial_fuel = fuel;
        self
    }

    /// Set the execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.limits.timeout = timeout;
        self
    }

    /// Resolve imports through a prepared linker.
    pub fn with_linker(mut self, linker: Linker<InstanceData<S>>) -> Self {
        self.linker = Some(linker);
        self
    }

    /// Build the instance with the provided host state.
    pub fn build(self, state: S) -> ExecutionResult<GuestInstance<S>> {
        let linker = self
            .linker
            .unwrap_or_else(|| Linker::new(self.engine.inner()));
        GuestInstance::with_linker(self.engine, linker, state, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ResourceLimits};
    use crate::engine::{IntoShared, WeftEngine};
    use crate::module::ModuleLoader;
    use wasmtime::Caller;

    fn create_engine() -> SharedEngine {
        WeftEngine::new(EngineConfig::default()).unwrap().into_shared()
    }

    fn load(engine: &SharedEngine, wat: &str) -> ValidatedModule {
        ModuleLoader::new(engine.clone()).load_wat(wat).unwrap()
    }

    #[test]
    fn test_instantiate_and_call() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add
                )
            )
        "#,
        );

        let mut instance = GuestInstance::new(engine, (), InstanceConfig::default()).unwrap();
        instance.instantiate(&module).unwrap();

        let result: i32 = instance.call("add", (2i32, 3i32)).unwrap();
        assert_eq!(result, 5);
        assert_eq!(instance.metrics().calls, 1);
        assert!(matches!(
            instance.instantiate(&module),
            Err(ExecutionError::AlreadyInstantiated)
        ));
    }

    #[test]
    fn test_host_memory_is_imported() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (import "env" "memory" (memory 1))
                (func (export "peek") (result i32)
                    i32.const 8
                    i32.load
                )
            )
        "#,
        );

        let mut instance = GuestInstance::new(engine, (), InstanceConfig::default()).unwrap();
        let memory = instance
            .define_memory("env", "memory", MemoryType::new(1, Some(4)))
            .unwrap();
        memory.data_mut(instance.store_mut())[8..12].copy_from_slice(&7i32.to_le_bytes());

        instance.instantiate(&module).unwrap();
        let value: i32 = instance.call("peek", ()).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_exported_memory_and_global() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (memory (export "memory") 2)
                (global (export "__heap_base") i32 (i32.const 4096))
            )
        "#,
        );

        let mut instance = GuestInstance::new(engine, (), InstanceConfig::default()).unwrap();
        assert!(instance.exported_memory("memory").is_none());

        instance.instantiate(&module).unwrap();
        let memory = instance.exported_memory("memory").unwrap();
        assert_eq!(memory.size(instance.store()), 2);
        assert_eq!(instance.exported_global_i32("__heap_base"), Some(4096));
        assert_eq!(instance.exported_global_i32("missing"), None);
    }

    #[test]
    fn test_host_function_sees_state() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (import "env" "bump" (func $bump (param i32)))
                (func (export "run")
                    i32.const 5
                    call $bump
                )
            )
        "#,
        );

        let mut linker = Linker::new(engine.inner());
        linker
            .func_wrap(
                "env",
                "bump",
                |mut caller: Caller<'_, InstanceData<u32>>, by: i32| {
                    caller.data_mut().metrics.host_calls += 1;
                    *caller.data_mut().state_mut() += by as u32;
                },
            )
            .unwrap();

        let mut instance = InstanceBuilder::new(engine).with_linker(linker).build(0u32).unwrap();
        instance.instantiate(&module).unwrap();
        instance.call::<(), ()>("run", ()).unwrap();
        instance.call::<(), ()>("run", ()).unwrap();

        assert_eq!(*instance.state(), 10);
        assert_eq!(instance.metrics().host_calls, 2);
    }

    #[test]
    fn test_out_of_fuel() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (func (export "spin")
                    (loop $loop
                        (br $loop)
                    )
                )
            )
        "#,
        );

        let mut instance = InstanceBuilder::<()>::new(engine)
            .with_limits(ResourceLimits::minimal())
            .build(())
            .unwrap();
        instance.instantiate(&module).unwrap();

        let result = instance.call::<(), ()>("spin", ());
        assert!(matches!(result, Err(ExecutionError::OutOfFuel { .. })));
        assert!(instance.metrics().fuel_consumed > 0);
    }

    #[test]
    fn test_guest_trap_and_dynamic_call() {
        let engine = create_engine();
        let module = load(
            &engine,
            r#"
            (module
                (func (export "boom") unreachable)
                (func (export "twice") (param i64) (result i64)
                    local.get 0
                    i64.const 2
                    i64.mul
                )
            )
        "#,
        );

        let mut instance = GuestInstance::new(engine, (), InstanceConfig::default()).unwrap();
        instance.instantiate(&module).unwrap();

        assert!(matches!(
            instance.call::<(), ()>("boom", ()),
            Err(ExecutionError::Trap(_))
        ));

        let results = instance.call_dynamic("twice", &[Val::I64(21)]).unwrap();
        assert_eq!(results[0].i64(), Some(42));
        assert!(matches!(
            instance.call_dynamic("nope", &[]),
            Err(ExecutionError::FunctionNotFound(_))
        ));
    }
}
