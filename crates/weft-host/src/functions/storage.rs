//! Top-level and default child storage, plus storage transactions.

use wasmtime::Caller;
use weft_memory::Span;

use crate::context::host_call;
use crate::error::HostResult;
use crate::execution::HostData;
use crate::imports::{
    CHILD_STORAGE_CLEAR, CHILD_STORAGE_GET, CHILD_STORAGE_KILL, CHILD_STORAGE_ROOT,
    CHILD_STORAGE_SET, STORAGE_APPEND, STORAGE_CHANGES_ROOT, STORAGE_CLEAR,
    STORAGE_CLEAR_PREFIX, STORAGE_COMMIT_TRANSACTION, STORAGE_GET, STORAGE_NEXT_KEY,
    STORAGE_READ, STORAGE_ROLLBACK_TRANSACTION, STORAGE_ROOT, STORAGE_SET,
    STORAGE_START_TRANSACTION,
};
use crate::linker::HostLinker;

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(
        STORAGE_SET,
        |caller: Caller<'_, HostData>, key: i64, value: i64| {
            host_call(caller, STORAGE_SET, |ctx| {
                let key = ctx.read(key)?;
                let value = ctx.read(value)?;
                ctx.capabilities().storage().set(&key, &value)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(STORAGE_GET, |caller: Caller<'_, HostData>, key: i64| {
        host_call(caller, STORAGE_GET, |ctx| {
            let key = ctx.read(key)?;
            let value = ctx.capabilities().storage().get(&key)?;
            ctx.return_encoded(&value)
        })
    })?;

    linker.func_wrap(
        STORAGE_READ,
        |caller: Caller<'_, HostData>, key: i64, out: i64, offset: i32| {
            host_call(caller, STORAGE_READ, |ctx| {
                let key = ctx.read(key)?;
                let out = Span::from_wasm(out);
                ctx.check(out)?;

                let Some(value) = ctx.capabilities().storage().get(&key)? else {
                    return ctx.return_encoded(&None::<u32>);
                };
                let start = (offset as u32 as usize).min(value.len());
                let remaining = &value[start..];
                let written = remaining.len().min(out.len as usize);
                ctx.write(out.offset, &remaining[..written])?;
                ctx.return_encoded(&Some(remaining.len() as u32))
            })
        },
    )?;

    linker.func_wrap(STORAGE_CLEAR, |caller: Caller<'_, HostData>, key: i64| {
        host_call(caller, STORAGE_CLEAR, |ctx| {
            let key = ctx.read(key)?;
            ctx.capabilities().storage().clear(&key)?;
            Ok(())
        })
    })?;

    linker.func_wrap(
        STORAGE_CLEAR_PREFIX,
        |caller: Caller<'_, HostData>, prefix: i64| {
            host_call(caller, STORAGE_CLEAR_PREFIX, |ctx| {
                let prefix = ctx.read(prefix)?;
                ctx.capabilities().storage().clear_prefix(&prefix)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(STORAGE_ROOT, |caller: Caller<'_, HostData>| {
        host_call(caller, STORAGE_ROOT, |ctx| {
            let root = ctx.capabilities().storage().root()?;
            ctx.return_bytes(&root)
        })
    })?;

    linker.func_wrap(
        STORAGE_CHANGES_ROOT,
        |caller: Caller<'_, HostData>, parent_hash: i64| {
            host_call(caller, STORAGE_CHANGES_ROOT, |ctx| {
                let parent_hash = ctx.read(parent_hash)?;
                let root = ctx.capabilities().storage().changes_root(&parent_hash)?;
                ctx.return_encoded(&root.map(|root| root.to_vec()))
            })
        },
    )?;

    linker.func_wrap(STORAGE_NEXT_KEY, |caller: Caller<'_, HostData>, key: i64| {
        host_call(caller, STORAGE_NEXT_KEY, |ctx| {
            let key = ctx.read(key)?;
            let next = ctx.capabilities().storage().next_key(&key)?;
            ctx.return_encoded(&next)
        })
    })?;

    linker.func_wrap(
        STORAGE_APPEND,
        |caller: Caller<'_, HostData>, key: i64, item: i64| {
            host_call(caller, STORAGE_APPEND, |ctx| {
                let key = ctx.read(key)?;
                let item = ctx.read(item)?;
                ctx.capabilities().storage().append(&key, &item)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(STORAGE_START_TRANSACTION, |caller: Caller<'_, HostData>| {
        host_call(caller, STORAGE_START_TRANSACTION, |ctx| {
            ctx.execution_mut().start_transaction()
        })
    })?;

    linker.func_wrap(STORAGE_COMMIT_TRANSACTION, |caller: Caller<'_, HostData>| {
        host_call(caller, STORAGE_COMMIT_TRANSACTION, |ctx| {
            ctx.execution_mut().commit_transaction()
        })
    })?;

    linker.func_wrap(STORAGE_ROLLBACK_TRANSACTION, |caller: Caller<'_, HostData>| {
        host_call(caller, STORAGE_ROLLBACK_TRANSACTION, |ctx| {
            ctx.execution_mut().rollback_transaction()
        })
    })?;

    register_child(linker)
}

fn register_child(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(
        CHILD_STORAGE_GET,
        |caller: Caller<'_, HostData>, child: i64, key: i64| {
            host_call(caller, CHILD_STORAGE_GET, |ctx| {
                let child = ctx.read(child)?;
                let key = ctx.read(key)?;
                let value = ctx.capabilities().storage().child_get(&child, &key)?;
                ctx.return_encoded(&value)
            })
        },
    )?;

    linker.func_wrap(
        CHILD_STORAGE_SET,
        |caller: Caller<'_, HostData>, child: i64, key: i64, value: i64| {
            host_call(caller, CHILD_STORAGE_SET, |ctx| {
                let child = ctx.read(child)?;
                let key = ctx.read(key)?;
                let value = ctx.read(value)?;
                ctx.capabilities().storage().child_set(&child, &key, &value)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(
        CHILD_STORAGE_CLEAR,
        |caller: Caller<'_, HostData>, child: i64, key: i64| {
            host_call(caller, CHILD_STORAGE_CLEAR, |ctx| {
                let child = ctx.read(child)?;
                let key = ctx.read(key)?;
                ctx.capabilities().storage().child_clear(&child, &key)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(CHILD_STORAGE_ROOT, |caller: Caller<'_, HostData>, child: i64| {
        host_call(caller, CHILD_STORAGE_ROOT, |ctx| {
            let child = ctx.read(child)?;
            let root = ctx.capabilities().storage().child_root(&child)?;
            ctx.return_bytes(&root)
        })
    })?;

    linker.func_wrap(CHILD_STORAGE_KILL, |caller: Caller<'_, HostData>, child: i64| {
        host_call(caller, CHILD_STORAGE_KILL, |ctx| {
            let child = ctx.read(child)?;
            ctx.capabilities().storage().child_kill(&child)?;
            Ok(())
        })
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parity_scale_codec::{Decode, Encode};
    use weft_capability::builtin::MemoryStorage;
    use weft_capability::{CapabilitySet, CapabilitySetBuilder, Storage};

    use crate::error::HostError;
    use crate::functions::testing::{Harness, host_trap, span};
    use crate::imports::{STORAGE_COMMIT_TRANSACTION, STORAGE_READ};

    const OUT: u32 = 2048;

    /// Data: "a" at 16, "1" at 32, "2" at 48, "hello world" at 64, "kid" at 96.
    fn guest() -> String {
        let key = span(16, 1);
        let one = span(32, 1);
        let two = span(48, 1);
        let long = span(64, 11);
        let child = span(96, 3);
        format!(
            r#"
            (import "env" "ext_storage_set_version_1" (func $set (param i64 i64)))
            (import "env" "ext_storage_get_version_1" (func $get (param i64) (result i64)))
            (import "env" "ext_storage_read_version_1" (func $read (param i64 i64 i32) (result i64)))
            (import "env" "ext_storage_clear_version_1" (func $clear (param i64)))
            (import "env" "ext_storage_root_version_1" (func $root (result i64)))
            (import "env" "ext_storage_next_key_version_1" (func $next (param i64) (result i64)))
            (import "env" "ext_storage_append_version_1" (func $append (param i64 i64)))
            (import "env" "ext_storage_start_transaction_version_1" (func $start))
            (import "env" "ext_storage_commit_transaction_version_1" (func $commit))
            (import "env" "ext_storage_rollback_transaction_version_1" (func $rollback))
            (import "env" "ext_default_child_storage_get_version_1" (func $child_get (param i64 i64) (result i64)))
            (import "env" "ext_default_child_storage_set_version_1" (func $child_set (param i64 i64 i64)))
            (import "env" "ext_default_child_storage_storage_kill_version_1" (func $child_kill (param i64)))
            (data (i32.const 16) "a")
            (data (i32.const 32) "1")
            (data (i32.const 48) "2")
            (data (i32.const 64) "hello world")
            (data (i32.const 96) "kid")
            (func (export "set_one") (call $set (i64.const {key}) (i64.const {one})))
            (func (export "set_two") (call $set (i64.const {key}) (i64.const {two})))
            (func (export "set_long") (call $set (i64.const {key}) (i64.const {long})))
            (func (export "get") (result i64) (call $get (i64.const {key})))
            (func (export "clear") (call $clear (i64.const {key})))
            (func (export "root") (result i64) (call $root))
            (func (export "next_after_empty") (result i64) (call $next (i64.const {empty})))
            (func (export "append_one") (call $append (i64.const {key}) (i64.const {one})))
            (func (export "read_tail") (result i64)
                (call $read (i64.const {key}) (i64.const {out}) (i32.const 6)))
            (func (export "read_past_end") (result i64)
                (call $read (i64.const {key}) (i64.const {out}) (i32.const 50)))
            (func (export "read_bad_out") (result i64)
                (call $read (i64.const {key}) (i64.const {bad_out}) (i32.const 0)))
            (func (export "start") (call $start))
            (func (export "commit") (call $commit))
            (func (export "rollback") (call $rollback))
            (func (export "child_set") (call $child_set (i64.const {child}) (i64.const {key}) (i64.const {one})))
            (func (export "child_get") (result i64) (call $child_get (i64.const {child}) (i64.const {key})))
            (func (export "child_kill") (call $child_kill (i64.const {child})))
            "#,
            empty = span(0, 0),
            out = span(OUT, 4),
            bad_out = span(65_534, 4),
        )
    }

    fn shared() -> (Arc<MemoryStorage>, CapabilitySet) {
        let storage = Arc::new(MemoryStorage::new());
        let caps = CapabilitySetBuilder::new()
            .with_shared_storage(storage.clone())
            .build();
        (storage, caps)
    }

    fn get(harness: &mut Harness) -> Option<Vec<u8>> {
        let encoded = harness.call_span("get").unwrap();
        Option::<Vec<u8>>::decode(&mut encoded.as_slice()).unwrap()
    }

    #[test]
    fn test_set_get_clear() {
        let (storage, caps) = shared();
        let mut harness = Harness::with_capabilities(&guest(), caps);

        assert_eq!(get(&mut harness), None);
        harness.call_void("set_one").unwrap();
        assert_eq!(get(&mut harness), Some(b"1".to_vec()));
        assert_eq!(storage.get(b"a").unwrap(), Some(b"1".to_vec()));

        harness.call_void("clear").unwrap();
        assert_eq!(get(&mut harness), None);
    }

    #[test]
    fn test_read_copies_from_offset() {
        let mut harness = Harness::new(&guest());
        harness.call_void("set_long").unwrap();

        let remaining = harness.call_span("read_tail").unwrap();
        assert_eq!(remaining, Some(5u32).encode());
        assert_eq!(harness.read(OUT, 4), b"worl");

        let remaining = harness.call_span("read_past_end").unwrap();
        assert_eq!(remaining, Some(0u32).encode());
    }

    #[test]
    fn test_read_missing_key() {
        let mut harness = Harness::new(&guest());
        let remaining = harness.call_span("read_tail").unwrap();
        assert_eq!(remaining, None::<u32>.encode());
    }

    #[test]
    fn test_read_rejects_out_of_bounds_buffer() {
        let mut harness = Harness::new(&guest());
        harness.call_void("set_long").unwrap();

        let err = harness.call_span("read_bad_out").unwrap_err();
        let trap = host_trap(&err);
        assert_eq!(trap.import, STORAGE_READ);
        assert!(matches!(trap.source, HostError::Memory(_)));
    }

    #[test]
    fn test_rollback_restores_outer_write() {
        let mut harness = Harness::new(&guest());

        harness.call_void("set_one").unwrap();
        harness.call_void("start").unwrap();
        harness.call_void("set_two").unwrap();
        assert_eq!(get(&mut harness), Some(b"2".to_vec()));
        harness.call_void("rollback").unwrap();

        assert_eq!(get(&mut harness), Some(b"1".to_vec()));
        assert_eq!(harness.execution().transaction_depth(), 0);
    }

    #[test]
    fn test_nested_commit_inside_rollback() {
        let mut harness = Harness::new(&guest());

        harness.call_void("set_one").unwrap();
        harness.call_void("start").unwrap();
        harness.call_void("start").unwrap();
        harness.call_void("set_two").unwrap();
        harness.call_void("commit").unwrap();
        assert_eq!(harness.execution().transaction_depth(), 1);
        assert_eq!(get(&mut harness), Some(b"2".to_vec()));
        harness.call_void("rollback").unwrap();

        assert_eq!(get(&mut harness), Some(b"1".to_vec()));
    }

    #[test]
    fn test_interleaved_instances_keep_their_transactions() {
        let (storage, caps) = shared();
        let mut a = Harness::with_capabilities(&guest(), caps.clone());
        let mut b = Harness::with_capabilities(&guest(), caps);

        a.call_void("start").unwrap();
        b.call_void("start").unwrap();
        a.call_void("set_one").unwrap();
        b.call_void("set_two").unwrap();
        assert_eq!(get(&mut a), Some(b"1".to_vec()));
        assert_eq!(get(&mut b), Some(b"2".to_vec()));

        a.call_void("rollback").unwrap();
        assert_eq!(get(&mut b), Some(b"2".to_vec()));
        b.call_void("commit").unwrap();

        assert_eq!(storage.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(get(&mut a), Some(b"2".to_vec()));
        assert_eq!(a.execution().transaction_depth(), 0);
        assert_eq!(b.execution().transaction_depth(), 0);
    }

    #[test]
    fn test_commit_without_transaction_traps() {
        let mut harness = Harness::new(&guest());

        let err = harness.call_void("commit").unwrap_err();
        let trap = host_trap(&err);
        assert_eq!(trap.import, STORAGE_COMMIT_TRANSACTION);
        assert!(matches!(
            trap.source,
            HostError::TransactionStackMisuse { operation: "commit" }
        ));
    }

    #[test]
    fn test_root_tracks_content() {
        let (storage, caps) = shared();
        let mut harness = Harness::with_capabilities(&guest(), caps);

        let empty = harness.call_span("root").unwrap();
        harness.call_void("set_one").unwrap();
        let root = harness.call_span("root").unwrap();

        assert_eq!(root.len(), 32);
        assert_ne!(root, empty);
        assert_eq!(root, storage.root().unwrap());
    }

    #[test]
    fn test_next_key() {
        let mut harness = Harness::new(&guest());
        assert_eq!(
            harness.call_span("next_after_empty").unwrap(),
            None::<Vec<u8>>.encode()
        );

        harness.call_void("set_one").unwrap();
        assert_eq!(
            harness.call_span("next_after_empty").unwrap(),
            Some(b"a".to_vec()).encode()
        );
    }

    #[test]
    fn test_append_builds_vector() {
        let mut harness = Harness::new(&guest());

        harness.call_void("append_one").unwrap();
        harness.call_void("append_one").unwrap();

        let value = get(&mut harness).unwrap();
        let items = Vec::<u8>::decode(&mut value.as_slice()).unwrap();
        assert_eq!(items, b"11");
    }

    #[test]
    fn test_child_storage() {
        let (storage, caps) = shared();
        let mut harness = Harness::with_capabilities(&guest(), caps);

        harness.call_void("child_set").unwrap();
        assert_eq!(
            harness.call_span("child_get").unwrap(),
            Some(b"1".to_vec()).encode()
        );
        assert_eq!(storage.get(b"a").unwrap(), None);

        harness.call_void("child_kill").unwrap();
        assert_eq!(
            harness.call_span("child_get").unwrap(),
            None::<Vec<u8>>.encode()
        );
    }
}
