//! Off-chain worker facilities.

use wasmtime::Caller;
use weft_capability::StorageKind;

use crate::context::host_call;
use crate::error::HostResult;
use crate::execution::HostData;
use crate::imports::{
    OFFCHAIN_INDEX_SET, OFFCHAIN_IS_VALIDATOR, OFFCHAIN_LOCAL_STORAGE_COMPARE_AND_SET,
    OFFCHAIN_LOCAL_STORAGE_GET, OFFCHAIN_LOCAL_STORAGE_SET, OFFCHAIN_NETWORK_STATE,
    OFFCHAIN_RANDOM_SEED, OFFCHAIN_SUBMIT_TRANSACTION,
};
use crate::linker::HostLinker;

fn storage_kind(kind: i32) -> HostResult<StorageKind> {
    Ok(StorageKind::try_from(kind as u32)?)
}

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(OFFCHAIN_IS_VALIDATOR, |caller: Caller<'_, HostData>| {
        host_call(caller, OFFCHAIN_IS_VALIDATOR, |ctx| {
            Ok(ctx.capabilities().offchain().is_validator()? as i32)
        })
    })?;

    linker.func_wrap(
        OFFCHAIN_LOCAL_STORAGE_GET,
        |caller: Caller<'_, HostData>, kind: i32, key: i64| {
            host_call(caller, OFFCHAIN_LOCAL_STORAGE_GET, |ctx| {
                let kind = storage_kind(kind)?;
                let key = ctx.read(key)?;
                let value = ctx.capabilities().offchain().local_storage_get(kind, &key)?;
                ctx.return_encoded(&value)
            })
        },
    )?;

    linker.func_wrap(
        OFFCHAIN_LOCAL_STORAGE_SET,
        |caller: Caller<'_, HostData>, kind: i32, key: i64, value: i64| {
            host_call(caller, OFFCHAIN_LOCAL_STORAGE_SET, |ctx| {
                let kind = storage_kind(kind)?;
                let key = ctx.read(key)?;
                let value = ctx.read(value)?;
                ctx.capabilities()
                    .offchain()
                    .local_storage_set(kind, &key, &value)?;
                Ok(())
            })
        },
    )?;

    linker.func_wrap(
        OFFCHAIN_LOCAL_STORAGE_COMPARE_AND_SET,
        |caller: Caller<'_, HostData>, kind: i32, key: i64, old: i64, new: i64| {
            host_call(caller, OFFCHAIN_LOCAL_STORAGE_COMPARE_AND_SET, |ctx| {
                let kind = storage_kind(kind)?;
                let key = ctx.read(key)?;
                let old: Option<Vec<u8>> = ctx.decode(old)?;
                let new = ctx.read(new)?;
                let swapped = ctx.capabilities().offchain().local_storage_compare_and_set(
                    kind,
                    &key,
                    old.as_deref(),
                    &new,
                )?;
                Ok(swapped as i32)
            })
        },
    )?;

    linker.func_wrap(OFFCHAIN_NETWORK_STATE, |caller: Caller<'_, HostData>| {
        host_call(caller, OFFCHAIN_NETWORK_STATE, |ctx| {
            let state = ctx.capabilities().offchain().network_state()?;
            ctx.return_encoded(&state.ok_or(()))
        })
    })?;

    linker.func_wrap(OFFCHAIN_RANDOM_SEED, |caller: Caller<'_, HostData>| {
        host_call(caller, OFFCHAIN_RANDOM_SEED, |ctx| {
            let seed = ctx.capabilities().offchain().random_seed()?;
            ctx.return_fixed(&seed)
        })
    })?;

    linker.func_wrap(
        OFFCHAIN_SUBMIT_TRANSACTION,
        |caller: Caller<'_, HostData>, data: i64| {
            host_call(caller, OFFCHAIN_SUBMIT_TRANSACTION, |ctx| {
                let data = ctx.read(data)?;
                let accepted = ctx.capabilities().offchain().submit_transaction(&data)?;
                let result: Result<(), ()> = if accepted { Ok(()) } else { Err(()) };
                ctx.return_encoded(&result)
            })
        },
    )?;

    linker.func_wrap(
        OFFCHAIN_INDEX_SET,
        |caller: Caller<'_, HostData>, key: i64, value: i64| {
            host_call(caller, OFFCHAIN_INDEX_SET, |ctx| {
                let key = ctx.read(key)?;
                let value = ctx.read(value)?;
                ctx.capabilities().offchain().index_set(&key, &value)?;
                Ok(())
            })
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parity_scale_codec::Encode;
    use weft_capability::builtin::MemoryOffchain;
    use weft_capability::{CapabilitySet, CapabilitySetBuilder, OpaqueNetworkState};

    use crate::error::HostError;
    use crate::functions::testing::{Harness, host_trap, span};
    use crate::imports::OFFCHAIN_LOCAL_STORAGE_GET;

    /// Data: "key" at 16, "v1" at 32, "v2" at 48, SCALE `Some("v1")` at 64,
    /// SCALE `None` at 80.
    fn guest() -> String {
        let key = span(16, 3);
        let v1 = span(32, 2);
        let v2 = span(48, 2);
        format!(
            r#"
            (import "env" "ext_offchain_is_validator_version_1" (func $validator (result i32)))
            (import "env" "ext_offchain_local_storage_get_version_1" (func $get (param i32 i64) (result i64)))
            (import "env" "ext_offchain_local_storage_set_version_1" (func $set (param i32 i64 i64)))
            (import "env" "ext_offchain_local_storage_compare_and_set_version_1"
                (func $cas (param i32 i64 i64 i64) (result i32)))
            (import "env" "ext_offchain_network_state_version_1" (func $network (result i64)))
            (import "env" "ext_offchain_random_seed_version_1" (func $seed (result i32)))
            (import "env" "ext_offchain_submit_transaction_version_1" (func $submit (param i64) (result i64)))
            (import "env" "ext_offchain_index_set_version_1" (func $index (param i64 i64)))
            (data (i32.const 16) "key")
            (data (i32.const 32) "v1")
            (data (i32.const 48) "v2")
            (data (i32.const 64) "\01\08v1")
            (data (i32.const 80) "\00")
            (func (export "validator") (result i32) (call $validator))
            (func (export "get_persistent") (result i64) (call $get (i32.const 1) (i64.const {key})))
            (func (export "get_local") (result i64) (call $get (i32.const 2) (i64.const {key})))
            (func (export "get_bogus") (result i64) (call $get (i32.const 7) (i64.const {key})))
            (func (export "set_persistent") (call $set (i32.const 1) (i64.const {key}) (i64.const {v1})))
            (func (export "cas_absent") (result i32)
                (call $cas (i32.const 1) (i64.const {key}) (i64.const {none}) (i64.const {v1})))
            (func (export "cas_v1_to_v2") (result i32)
                (call $cas (i32.const 1) (i64.const {key}) (i64.const {some_v1}) (i64.const {v2})))
            (func (export "network") (result i64) (call $network))
            (func (export "seed") (result i32) (call $seed))
            (func (export "submit") (result i64) (call $submit (i64.const {v1})))
            (func (export "index") (call $index (i64.const {key}) (i64.const {v2})))
            "#,
            some_v1 = span(64, 4),
            none = span(80, 1),
        )
    }

    fn with_offchain(offchain: MemoryOffchain) -> (Arc<MemoryOffchain>, Harness) {
        let offchain = Arc::new(offchain);
        let caps: CapabilitySet = CapabilitySetBuilder::new()
            .with_shared_offchain(offchain.clone())
            .build();
        (offchain, Harness::with_capabilities(&guest(), caps))
    }

    #[test]
    fn test_is_validator() {
        let (_, mut harness) = with_offchain(MemoryOffchain::new().with_validator(true));
        assert_eq!(harness.call_i32("validator").unwrap(), 1);

        let mut harness = Harness::new(&guest());
        assert_eq!(harness.call_i32("validator").unwrap(), 0);
    }

    #[test]
    fn test_local_storage_kinds_are_separate() {
        let mut harness = Harness::new(&guest());

        harness.call_void("set_persistent").unwrap();
        assert_eq!(
            harness.call_span("get_persistent").unwrap(),
            Some(b"v1".to_vec()).encode()
        );
        assert_eq!(
            harness.call_span("get_local").unwrap(),
            None::<Vec<u8>>.encode()
        );
    }

    #[test]
    fn test_unknown_kind_traps() {
        let mut harness = Harness::new(&guest());

        let err = harness.call_span("get_bogus").unwrap_err();
        let trap = host_trap(&err);
        assert_eq!(trap.import, OFFCHAIN_LOCAL_STORAGE_GET);
        assert!(matches!(trap.source, HostError::Capability(_)));
    }

    #[test]
    fn test_compare_and_set() {
        let mut harness = Harness::new(&guest());

        assert_eq!(harness.call_i32("cas_v1_to_v2").unwrap(), 0);
        assert_eq!(harness.call_i32("cas_absent").unwrap(), 1);
        assert_eq!(harness.call_i32("cas_absent").unwrap(), 0);
        assert_eq!(harness.call_i32("cas_v1_to_v2").unwrap(), 1);
        assert_eq!(
            harness.call_span("get_persistent").unwrap(),
            Some(b"v2".to_vec()).encode()
        );
    }

    #[test]
    fn test_network_state() {
        let mut harness = Harness::new(&guest());
        assert_eq!(
            harness.call_span("network").unwrap(),
            Err::<OpaqueNetworkState, ()>(()).encode()
        );

        let state = OpaqueNetworkState {
            peer_id: vec![1, 2, 3],
            external_addresses: vec![b"/ip4/127.0.0.1".to_vec()],
        };
        let (_, mut harness) = with_offchain(MemoryOffchain::new().with_network_state(state.clone()));
        assert_eq!(
            harness.call_span("network").unwrap(),
            Ok::<_, ()>(state).encode()
        );
    }

    #[test]
    fn test_random_seed_on_heap() {
        let mut harness = Harness::new(&guest());
        let first = harness.call_fixed("seed", 32).unwrap();
        let second = harness.call_fixed("seed", 32).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_submit_transaction() {
        let (offchain, mut harness) = with_offchain(MemoryOffchain::new());
        assert_eq!(harness.call_span("submit").unwrap(), Ok::<(), ()>(()).encode());
        assert_eq!(offchain.take_submitted(), vec![b"v1".to_vec()]);

        let (_, mut harness) = with_offchain(MemoryOffchain::new().rejecting_transactions());
        assert_eq!(harness.call_span("submit").unwrap(), Err::<(), ()>(()).encode());
    }

    #[test]
    fn test_index_set() {
        let (offchain, mut harness) = with_offchain(MemoryOffchain::new());
        harness.call_void("index").unwrap();
        assert_eq!(offchain.indexed(b"key"), Some(b"v2".to_vec()));
    }
}
