//! Names of everything a guest may import.

/// Namespace of every import.
pub const ENV: &str = "env";

/// The linear memory, imported or exported under this name.
pub const MEMORY: &str = "memory";

/// Global a guest may export to mark where its heap begins.
pub const HEAP_BASE: &str = "__heap_base";

pub const LOGGING_LOG: &str = "ext_logging_log_version_1";

pub const MISC_PRINT_NUM: &str = "ext_misc_print_num_version_1";
pub const MISC_PRINT_UTF8: &str = "ext_misc_print_utf8_version_1";
pub const MISC_PRINT_HEX: &str = "ext_misc_print_hex_version_1";
pub const MISC_RUNTIME_VERSION: &str = "ext_misc_runtime_version_version_1";

pub const ALLOCATOR_MALLOC: &str = "ext_allocator_malloc_version_1";
pub const ALLOCATOR_FREE: &str = "ext_allocator_free_version_1";

pub const HASHING_BLAKE2_128: &str = "ext_hashing_blake2_128_version_1";
pub const HASHING_BLAKE2_256: &str = "ext_hashing_blake2_256_version_1";
pub const HASHING_KECCAK_256: &str = "ext_hashing_keccak_256_version_1";
pub const HASHING_SHA2_256: &str = "ext_hashing_sha2_256_version_1";
pub const HASHING_TWOX_64: &str = "ext_hashing_twox_64_version_1";
pub const HASHING_TWOX_128: &str = "ext_hashing_twox_128_version_1";
pub const TRIE_BLAKE2_256_ORDERED_ROOT: &str = "ext_trie_blake2_256_ordered_root_version_1";

pub const CRYPTO_ED25519_GENERATE: &str = "ext_crypto_ed25519_generate_version_1";
pub const CRYPTO_ED25519_VERIFY: &str = "ext_crypto_ed25519_verify_version_1";
pub const CRYPTO_SR25519_GENERATE: &str = "ext_crypto_sr25519_generate_version_1";
pub const CRYPTO_SR25519_PUBLIC_KEYS: &str = "ext_crypto_sr25519_public_keys_version_1";
pub const CRYPTO_SR25519_SIGN: &str = "ext_crypto_sr25519_sign_version_1";
pub const CRYPTO_SR25519_VERIFY: &str = "ext_crypto_sr25519_verify_version_2";
pub const CRYPTO_SECP256K1_ECDSA_RECOVER_COMPRESSED: &str =
    "ext_crypto_secp256k1_ecdsa_recover_compressed_version_1";
pub const CRYPTO_START_BATCH_VERIFY: &str = "ext_crypto_start_batch_verify_version_1";
pub const CRYPTO_FINISH_BATCH_VERIFY: &str = "ext_crypto_finish_batch_verify_version_1";

pub const STORAGE_SET: &str = "ext_storage_set_version_1";
pub const STORAGE_GET: &str = "ext_storage_get_version_1";
pub const STORAGE_READ: &str = "ext_storage_read_version_1";
pub const STORAGE_CLEAR: &str = "ext_storage_clear_version_1";
pub const STORAGE_CLEAR_PREFIX: &str = "ext_storage_clear_prefix_version_1";
pub const STORAGE_ROOT: &str = "ext_storage_root_version_1";
pub const STORAGE_CHANGES_ROOT: &str = "ext_storage_changes_root_version_1";
pub const STORAGE_NEXT_KEY: &str = "ext_storage_next_key_version_1";
pub const STORAGE_APPEND: &str = "ext_storage_append_version_1";
pub const STORAGE_START_TRANSACTION: &str = "ext_storage_start_transaction_version_1";
pub const STORAGE_COMMIT_TRANSACTION: &str = "ext_storage_commit_transaction_version_1";
pub const STORAGE_ROLLBACK_TRANSACTION: &str = "ext_storage_rollback_transaction_version_1";

pub const CHILD_STORAGE_GET: &str = "ext_default_child_storage_get_version_1";
pub const CHILD_STORAGE_SET: &str = "ext_default_child_storage_set_version_1";
pub const CHILD_STORAGE_CLEAR: &str = "ext_default_child_storage_clear_version_1";
pub const CHILD_STORAGE_ROOT: &str = "ext_default_child_storage_root_version_1";
pub const CHILD_STORAGE_KILL: &str = "ext_default_child_storage_storage_kill_version_1";

pub const OFFCHAIN_IS_VALIDATOR: &str = "ext_offchain_is_validator_version_1";
pub const OFFCHAIN_LOCAL_STORAGE_GET: &str = "ext_offchain_local_storage_get_version_1";
pub const OFFCHAIN_LOCAL_STORAGE_SET: &str = "ext_offchain_local_storage_set_version_1";
pub const OFFCHAIN_LOCAL_STORAGE_COMPARE_AND_SET: &str =
    "ext_offchain_local_storage_compare_and_set_version_1";
pub const OFFCHAIN_NETWORK_STATE: &str = "ext_offchain_network_state_version_1";
pub const OFFCHAIN_RANDOM_SEED: &str = "ext_offchain_random_seed_version_1";
pub const OFFCHAIN_SUBMIT_TRANSACTION: &str = "ext_offchain_submit_transaction_version_1";
pub const OFFCHAIN_INDEX_SET: &str = "ext_offchain_index_set_version_1";

pub const SANDBOX_INSTANTIATE: &str = "ext_sandbox_instantiate_version_1";
pub const SANDBOX_INVOKE: &str = "ext_sandbox_invoke_version_1";
pub const SANDBOX_INSTANCE_TEARDOWN: &str = "ext_sandbox_instance_teardown_version_1";
pub const SANDBOX_MEMORY_NEW: &str = "ext_sandbox_memory_new_version_1";
pub const SANDBOX_MEMORY_GET: &str = "ext_sandbox_memory_get_version_1";
pub const SANDBOX_MEMORY_SET: &str = "ext_sandbox_memory_set_version_1";
pub const SANDBOX_MEMORY_TEARDOWN: &str = "ext_sandbox_memory_teardown_version_1";

/// Every host function, grouped by capability, in registration order.
pub const ALL: [&str; 55] = [
    LOGGING_LOG,
    MISC_PRINT_NUM,
    MISC_PRINT_UTF8,
    MISC_PRINT_HEX,
    MISC_RUNTIME_VERSION,
    ALLOCATOR_MALLOC,
    ALLOCATOR_FREE,
    HASHING_BLAKE2_128,
    HASHING_BLAKE2_256,
    HASHING_KECCAK_256,
    HASHING_SHA2_256,
    HASHING_TWOX_64,
    HASHING_TWOX_128,
    TRIE_BLAKE2_256_ORDERED_ROOT,
    CRYPTO_ED25519_GENERATE,
    CRYPTO_ED25519_VERIFY,
    CRYPTO_SR25519_GENERATE,
    CRYPTO_SR25519_PUBLIC_KEYS,
    CRYPTO_SR25519_SIGN,
    CRYPTO_SR25519_VERIFY,
    CRYPTO_SECP256K1_ECDSA_RECOVER_COMPRESSED,
    CRYPTO_START_BATCH_VERIFY,
    CRYPTO_FINISH_BATCH_VERIFY,
    STORAGE_SET,
    STORAGE_GET,
    STORAGE_READ,
    STORAGE_CLEAR,
    STORAGE_CLEAR_PREFIX,
    STORAGE_ROOT,
    STORAGE_CHANGES_ROOT,
    STORAGE_NEXT_KEY,
    STORAGE_APPEND,
    STORAGE_START_TRANSACTION,
    STORAGE_COMMIT_TRANSACTION,
    STORAGE_ROLLBACK_TRANSACTION,
    CHILD_STORAGE_GET,
    CHILD_STORAGE_SET,
    CHILD_STORAGE_CLEAR,
    CHILD_STORAGE_ROOT,
    CHILD_STORAGE_KILL,
    OFFCHAIN_IS_VALIDATOR,
    OFFCHAIN_LOCAL_STORAGE_GET,
    OFFCHAIN_LOCAL_STORAGE_SET,
    OFFCHAIN_LOCAL_STORAGE_COMPARE_AND_SET,
    OFFCHAIN_NETWORK_STATE,
    OFFCHAIN_RANDOM_SEED,
    OFFCHAIN_SUBMIT_TRANSACTION,
    OFFCHAIN_INDEX_SET,
    SANDBOX_INSTANTIATE,
    SANDBOX_INVOKE,
    SANDBOX_INSTANCE_TEARDOWN,
    SANDBOX_MEMORY_NEW,
    SANDBOX_MEMORY_GET,
    SANDBOX_MEMORY_SET,
    SANDBOX_MEMORY_TEARDOWN,
];

/// Capability family an import belongs to, for reporting.
pub fn category(name: &str) -> Option<&'static str> {
    if !ALL.iter().any(|known| *known == name) {
        return None;
    }
    [
        ("ext_logging_", "logging"),
        ("ext_misc_", "misc"),
        ("ext_allocator_", "allocator"),
        ("ext_hashing_", "hashing"),
        ("ext_trie_", "hashing"),
        ("ext_crypto_", "crypto"),
        ("ext_storage_", "storage"),
        ("ext_default_child_storage_", "child storage"),
        ("ext_offchain_", "offchain"),
        ("ext_sandbox_", "sandbox"),
    ]
    .into_iter()
    .find(|(prefix, _)| name.starts_with(prefix))
    .map(|(_, family)| family)
}
