//! Logging, printing and runtime version queries.
//!
//! Guest output is re-emitted through `tracing` under the `runtime` target.
//! Failures to read it are dropped: logging never traps.

use wasmtime::Caller;

use tracing::{debug, error, info, trace, warn};

use crate::context::{HostContext, host_call, host_call_infallible};
use crate::error::HostResult;
use crate::execution::HostData;
use crate::imports::{
    LOGGING_LOG, MISC_PRINT_HEX, MISC_PRINT_NUM, MISC_PRINT_UTF8, MISC_RUNTIME_VERSION,
};
use crate::linker::HostLinker;

/// Severity a guest attaches to a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<u32> for LogLevel {
    /// Anything outside 1..=4 is treated as trace.
    fn from(level: u32) -> Self {
        match level {
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }
}

fn emit(level: LogLevel, module: &str, message: &str) {
    match level {
        LogLevel::Error => error!(target: "runtime", module, "{message}"),
        LogLevel::Warn => warn!(target: "runtime", module, "{message}"),
        LogLevel::Info => info!(target: "runtime", module, "{message}"),
        LogLevel::Debug => debug!(target: "runtime", module, "{message}"),
        LogLevel::Trace => trace!(target: "runtime", module, "{message}"),
    }
}

/// Bytes behind `span`, or nothing when they cannot be read.
fn read_or_empty(ctx: Option<&mut HostContext<'_>>, span: i64) -> Vec<u8> {
    ctx.and_then(|ctx| ctx.read(span).ok()).unwrap_or_default()
}

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(
        LOGGING_LOG,
        |caller: Caller<'_, HostData>, level: i32, target: i64, message: i64| {
            host_call_infallible(caller, LOGGING_LOG, |mut ctx| {
                let target = read_or_empty(ctx.as_deref_mut(), target);
                let message = read_or_empty(ctx, message);
                emit(
                    LogLevel::from(level as u32),
                    &String::from_utf8_lossy(&target),
                    &String::from_utf8_lossy(&message),
                );
            })
        },
    )?;

    linker.func_wrap(
        MISC_PRINT_NUM,
        |caller: Caller<'_, HostData>, number: i64| {
            host_call_infallible(caller, MISC_PRINT_NUM, |_| {
                debug!(target: "runtime", number, "print_num");
            })
        },
    )?;

    linker.func_wrap(
        MISC_PRINT_UTF8,
        |caller: Caller<'_, HostData>, text: i64| {
            host_call_infallible(caller, MISC_PRINT_UTF8, |ctx| {
                if let Ok(text) = String::from_utf8(read_or_empty(ctx, text)) {
                    debug!(target: "runtime", "{text}");
                }
            })
        },
    )?;

    linker.func_wrap(
        MISC_PRINT_HEX,
        |caller: Caller<'_, HostData>, data: i64| {
            host_call_infallible(caller, MISC_PRINT_HEX, |ctx| {
                debug!(target: "runtime", "0x{}", hex::encode(read_or_empty(ctx, data)));
            })
        },
    )?;

    linker.func_wrap(
        MISC_RUNTIME_VERSION,
        |caller: Caller<'_, HostData>, code: i64| {
            host_call(caller, MISC_RUNTIME_VERSION, |ctx| {
                let code = ctx.read(code)?;
                let version = ctx.capabilities().misc().runtime_version(&code)?;
                ctx.return_encoded(&version)
            })
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::Harness;
    use parity_scale_codec::{Decode, Encode};
    use weft_capability::builtin::KnownRuntimeVersions;
    use weft_capability::{CapabilitySet, CapabilitySetBuilder};
    use weft_core::{InstanceConfig, IntoShared, ModuleLoader, WeftEngine};

    use crate::config::HostConfig;
    use crate::execution::ExecutionContext;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(LogLevel::from(1), LogLevel::Error);
        assert_eq!(LogLevel::from(4), LogLevel::Debug);
        assert_eq!(LogLevel::from(5), LogLevel::Trace);
        assert_eq!(LogLevel::from(0), LogLevel::Trace);
        assert_eq!(LogLevel::from(u32::MAX), LogLevel::Trace);
    }

    #[test]
    fn test_logging_never_traps() {
        let mut harness = Harness::new(
            r#"
            (import "env" "ext_logging_log_version_1" (func $log (param i32 i64 i64)))
            (import "env" "ext_misc_print_utf8_version_1" (func $utf8 (param i64)))
            (import "env" "ext_misc_print_hex_version_1" (func $hex (param i64)))
            (import "env" "ext_misc_print_num_version_1" (func $num (param i64)))
            (data (i32.const 16) "weft\ff")
            (func (export "run")
                (call $log (i32.const 3) (i64.const 0x0000000400000010) (i64.const 0x0000000400000010))
                ;; span far out of bounds
                (call $log (i32.const 9) (i64.const 0x00000010ffffff00) (i64.const 0x00000010ffffff00))
                ;; invalid UTF-8 is dropped
                (call $utf8 (i64.const 0x0000000500000010))
                (call $hex (i64.const 0x0000000500000010))
                (call $hex (i64.const 0x00000010ffffff00))
                (call $num (i64.const -1))
            )
        "#,
        );

        harness.call_void("run").unwrap();
        assert_eq!(harness.instance.metrics().host_calls, 6);
    }

    #[test]
    fn test_logging_from_start_function() {
        let harness = Harness::new(
            r#"
            (import "env" "ext_logging_log_version_1" (func $log (param i32 i64 i64)))
            (import "env" "ext_misc_print_utf8_version_1" (func $utf8 (param i64)))
            (import "env" "ext_misc_print_hex_version_1" (func $hex (param i64)))
            (import "env" "ext_misc_print_num_version_1" (func $num (param i64)))
            (data (i32.const 16) "init")
            (func $init
                (call $log (i32.const 3) (i64.const 0x0000000400000010) (i64.const 0x0000000400000010))
                (call $utf8 (i64.const 0x0000000400000010))
                (call $hex (i64.const 0x0000000400000010))
                (call $num (i64.const 7)))
            (start $init)
        "#,
        );

        assert!(harness.execution().is_attached());
        assert_eq!(harness.instance.metrics().host_calls, 4);
    }

    #[test]
    fn test_start_function_cannot_allocate() {
        let engine = WeftEngine::default_engine().unwrap().into_shared();
        let module = ModuleLoader::new(engine.clone())
            .load_wat(
                r#"(module
                    (import "env" "ext_allocator_malloc_version_1" (func $malloc (param i32) (result i32)))
                    (memory (export "memory") 1)
                    (func $init (drop (call $malloc (i32.const 8))))
                    (start $init))"#,
            )
            .unwrap();

        let result = HostLinker::standard(&engine).unwrap().instantiate(
            engine,
            &module,
            ExecutionContext::new(CapabilitySet::in_memory()),
            &HostConfig::new(),
            InstanceConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_version() {
        let versions = KnownRuntimeVersions::new();
        versions.register(b"code", b"v1".to_vec());
        let capabilities = CapabilitySetBuilder::new().with_misc(versions).build();

        let mut harness = Harness::with_capabilities(
            r#"
            (import "env" "ext_misc_runtime_version_version_1" (func $version (param i64) (result i64)))
            (data (i32.const 16) "code")
            (func (export "known") (result i64)
                (call $version (i64.const 0x0000000400000010)))
            (func (export "unknown") (result i64)
                (call $version (i64.const 0x0000000300000010)))
        "#,
            capabilities,
        );

        let known = harness.call_span("known").unwrap();
        assert_eq!(Option::<Vec<u8>>::decode(&mut &known[..]).unwrap(), Some(b"v1".to_vec()));

        let unknown = harness.call_span("unknown").unwrap();
        assert_eq!(unknown, None::<Vec<u8>>.encode());
    }
}
