//! Key generation, signatures and batch verification.

use wasmtime::Caller;
use weft_capability::KeyTypeId;

use crate::context::{HostContext, host_call};
use crate::error::HostResult;
use crate::execution::HostData;
use crate::imports::{
    CRYPTO_ED25519_GENERATE, CRYPTO_ED25519_VERIFY, CRYPTO_FINISH_BATCH_VERIFY,
    CRYPTO_SECP256K1_ECDSA_RECOVER_COMPRESSED, CRYPTO_SR25519_GENERATE,
    CRYPTO_SR25519_PUBLIC_KEYS, CRYPTO_SR25519_SIGN, CRYPTO_SR25519_VERIFY,
    CRYPTO_START_BATCH_VERIFY,
};
use crate::linker::HostLinker;

fn key_type(ctx: &mut HostContext<'_>, ptr: i32) -> HostResult<KeyTypeId> {
    Ok(KeyTypeId(ctx.read_array::<4>(ptr)?))
}

/// Arguments shared by both verify functions: signature, message, public key.
fn verify_args(
    ctx: &mut HostContext<'_>,
    sig: i32,
    msg: i64,
    public: i32,
) -> HostResult<([u8; 64], Vec<u8>, [u8; 32])> {
    Ok((ctx.read_array(sig)?, ctx.read(msg)?, ctx.read_array(public)?))
}

pub(crate) fn register(linker: &mut HostLinker) -> HostResult<()> {
    linker.func_wrap(
        CRYPTO_ED25519_GENERATE,
        |caller: Caller<'_, HostData>, key_type_ptr: i32, seed: i64| {
            host_call(caller, CRYPTO_ED25519_GENERATE, |ctx| {
                let key_type = key_type(ctx, key_type_ptr)?;
                let seed: Option<Vec<u8>> = ctx.decode(seed)?;
                let public = ctx
                    .capabilities()
                    .crypto()
                    .ed25519_generate(key_type, seed.as_deref())?;
                ctx.return_fixed(&public)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_ED25519_VERIFY,
        |caller: Caller<'_, HostData>, sig: i32, msg: i64, public: i32| {
            host_call(caller, CRYPTO_ED25519_VERIFY, |ctx| {
                let (sig, msg, public) = verify_args(ctx, sig, msg, public)?;
                let valid = ctx.capabilities().crypto().ed25519_verify(&sig, &msg, &public)?;
                Ok(ctx.execution_mut().verification_outcome(valid) as i32)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_SR25519_GENERATE,
        |caller: Caller<'_, HostData>, key_type_ptr: i32, seed: i64| {
            host_call(caller, CRYPTO_SR25519_GENERATE, |ctx| {
                let key_type = key_type(ctx, key_type_ptr)?;
                let seed: Option<Vec<u8>> = ctx.decode(seed)?;
                let public = ctx
                    .capabilities()
                    .crypto()
                    .sr25519_generate(key_type, seed.as_deref())?;
                ctx.return_fixed(&public)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_SR25519_PUBLIC_KEYS,
        |caller: Caller<'_, HostData>, key_type_ptr: i32| {
            host_call(caller, CRYPTO_SR25519_PUBLIC_KEYS, |ctx| {
                let key_type = key_type(ctx, key_type_ptr)?;
                let keys = ctx.capabilities().crypto().sr25519_public_keys(key_type)?;
                ctx.return_encoded(&keys)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_SR25519_SIGN,
        |caller: Caller<'_, HostData>, key_type_ptr: i32, public: i32, msg: i64| {
            host_call(caller, CRYPTO_SR25519_SIGN, |ctx| {
                let key_type = key_type(ctx, key_type_ptr)?;
                let public: [u8; 32] = ctx.read_array(public)?;
                let msg = ctx.read(msg)?;
                let signature = ctx
                    .capabilities()
                    .crypto()
                    .sr25519_sign(key_type, &public, &msg)?;
                ctx.return_encoded(&signature)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_SR25519_VERIFY,
        |caller: Caller<'_, HostData>, sig: i32, msg: i64, public: i32| {
            host_call(caller, CRYPTO_SR25519_VERIFY, |ctx| {
                let (sig, msg, public) = verify_args(ctx, sig, msg, public)?;
                let valid = ctx.capabilities().crypto().sr25519_verify(&sig, &msg, &public)?;
                Ok(ctx.execution_mut().verification_outcome(valid) as i32)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_SECP256K1_ECDSA_RECOVER_COMPRESSED,
        |caller: Caller<'_, HostData>, sig: i32, msg: i32| {
            host_call(caller, CRYPTO_SECP256K1_ECDSA_RECOVER_COMPRESSED, |ctx| {
                let sig: [u8; 65] = ctx.read_array(sig)?;
                let msg: [u8; 32] = ctx.read_array(msg)?;
                let recovered = ctx
                    .capabilities()
                    .crypto()
                    .secp256k1_ecdsa_recover_compressed(&sig, &msg)?;
                ctx.return_encoded(&recovered)
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_START_BATCH_VERIFY,
        |caller: Caller<'_, HostData>| {
            host_call(caller, CRYPTO_START_BATCH_VERIFY, |ctx| {
                ctx.execution_mut().start_batch_verify()
            })
        },
    )?;

    linker.func_wrap(
        CRYPTO_FINISH_BATCH_VERIFY,
        |caller: Caller<'_, HostData>| {
            host_call(caller, CRYPTO_FINISH_BATCH_VERIFY, |ctx| {
                Ok(ctx.execution_mut().finish_batch_verify()? as i32)
            })
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::HostError;
    use crate::functions::testing::{Harness, host_trap};
    use crate::imports::{CRYPTO_FINISH_BATCH_VERIFY, CRYPTO_SR25519_GENERATE};
    use ed25519_dalek::{Signer, SigningKey};
    use parity_scale_codec::Encode;
    use weft_capability::builtin::blake2_256;

    const SIG: u32 = 256;
    const PUBLIC: u32 = 384;
    const MSG: u32 = 512;
    const SEED: u32 = 1024;

    const GUEST: &str = r#"
        (import "env" "ext_crypto_ed25519_generate_version_1" (func $gen (param i32 i64) (result i32)))
        (import "env" "ext_crypto_ed25519_verify_version_1" (func $verify (param i32 i64 i32) (result i32)))
        (import "env" "ext_crypto_sr25519_generate_version_1" (func $sr_gen (param i32 i64) (result i32)))
        (import "env" "ext_crypto_start_batch_verify_version_1" (func $start))
        (import "env" "ext_crypto_finish_batch_verify_version_1" (func $finish (result i32)))
        (data (i32.const 16) "test")
        ;; seed: SCALE Option<Vec<u8>> at 1024, 7 bytes
        (func (export "generate") (result i32)
            (call $gen (i32.const 16) (i64.const 0x0000000700000400)))
        (func (export "sr_generate") (result i32)
            (call $sr_gen (i32.const 16) (i64.const 0x0000000700000400)))
        ;; signature at 256, message at 512 (5 bytes), public key at 384
        (func (export "verify") (result i32)
            (call $verify (i32.const 256) (i64.const 0x0000000500000200) (i32.const 384)))
        (func (export "start") (call $start))
        (func (export "finish") (result i32) (call $finish))
    "#;

    fn signed(harness: &mut Harness, message: &[u8; 5], tamper: bool) {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let mut signature = key.sign(message).to_bytes();
        if tamper {
            signature[0] ^= 1;
        }
        harness.write(SIG, &signature);
        harness.write(PUBLIC, key.verifying_key().as_bytes());
        harness.write(MSG, message);
    }

    #[test]
    fn test_generate_from_seed() {
        let mut harness = Harness::new(GUEST);
        let seed = Some(b"alice".to_vec()).encode();
        assert_eq!(seed.len(), 7);
        harness.write(SEED, &seed);

        let public = harness.call_fixed("generate", 32).unwrap();

        let expected = SigningKey::from_bytes(&blake2_256(b"alice")).verifying_key();
        assert_eq!(public, expected.as_bytes());
    }

    #[test]
    fn test_verify() {
        let mut harness = Harness::new(GUEST);

        signed(&mut harness, b"hello", false);
        assert_eq!(harness.call_i32("verify").unwrap(), 1);

        signed(&mut harness, b"hello", true);
        assert_eq!(harness.call_i32("verify").unwrap(), 0);
    }

    #[test]
    fn test_batch_verify_conjunction() {
        let mut harness = Harness::new(GUEST);

        harness.call_void("start").unwrap();
        signed(&mut harness, b"first", false);
        assert_eq!(harness.call_i32("verify").unwrap(), 1);
        signed(&mut harness, b"other", true);
        // Deferred: the guest is told the check passed.
        assert_eq!(harness.call_i32("verify").unwrap(), 1);
        assert_eq!(harness.call_i32("finish").unwrap(), 0);

        harness.call_void("start").unwrap();
        assert_eq!(harness.call_i32("finish").unwrap(), 1);
    }

    #[test]
    fn test_batch_of_valid_signatures_passes() {
        let mut harness = Harness::new(GUEST);

        harness.call_void("start").unwrap();
        for message in [b"first", b"other", b"third"] {
            signed(&mut harness, message, false);
            assert_eq!(harness.call_i32("verify").unwrap(), 1);
        }
        assert_eq!(harness.execution().batch().map(|b| b.checked()), Some(3));

        assert_eq!(harness.call_i32("finish").unwrap(), 1);
        assert!(harness.execution().batch().is_none());
    }

    #[test]
    fn test_finish_without_start_traps() {
        let mut harness = Harness::new(GUEST);

        let err = harness.call_i32("finish").unwrap_err();
        let trap = host_trap(&err);
        assert_eq!(trap.import, CRYPTO_FINISH_BATCH_VERIFY);
        assert!(matches!(trap.source, HostError::BatchVerifyMisuse { .. }));
    }

    #[test]
    fn test_sr25519_unsupported_by_keystore() {
        let mut harness = Harness::new(GUEST);
        harness.write(SEED, &None::<Vec<u8>>.encode());

        let err = harness.call_i32("sr_generate").unwrap_err();
        let trap = host_trap(&err);
        assert_eq!(trap.import, CRYPTO_SR25519_GENERATE);
        assert!(matches!(&trap.source, HostError::Capability(e) if e.is_unsupported()));
    }
}
