//! Per-instance host state.
//!
//! The [`ExecutionContext`] lives in the wasmtime store of one guest
//! instance. It carries the capability backends, the guest memory and its
//! allocator, and the state of the two protocols layered over host calls:
//! nested storage transactions and batch signature verification.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use wasmtime::Memory;
use weft_capability::CapabilitySet;
use weft_core::InstanceData;
use weft_memory::HeapAllocator;

use crate::error::{HostError, HostResult};

/// What the wasmtime store of a weft guest holds.
pub type HostData = InstanceData<ExecutionContext>;

/// Signature checks collected between batch start and finish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchVerification {
    checked: usize,
    failed: usize,
}

impl BatchVerification {
    /// Record the outcome of one deferred check.
    pub fn record(&mut self, valid: bool) {
        self.checked += 1;
        if !valid {
            self.failed += 1;
        }
    }

    /// Number of signatures checked so far.
    pub fn checked(&self) -> usize {
        self.checked
    }

    /// Whether every recorded check passed. True for an empty batch.
    pub fn all_valid(&self) -> bool {
        self.failed == 0
    }
}

/// Host state for one guest instance.
pub struct ExecutionContext {
    capabilities: CapabilitySet,
    memory: Option<Memory>,
    allocator: Option<Arc<Mutex<HeapAllocator>>>,
    transaction_depth: usize,
    batch: Option<BatchVerification>,
}

impl ExecutionContext {
    /// A fresh context with no memory attached.
    ///
    /// Storage transactions opened through this context are private to it;
    /// see [`CapabilitySet::for_instance`].
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities: capabilities.for_instance(),
            memory: None,
            allocator: None,
            transaction_depth: 0,
            batch: None,
        }
    }

    /// The capability backends.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Bind the guest's memory and start a heap at `heap_base`.
    pub fn attach_memory(&mut self, memory: Memory, heap_base: u32) {
        let allocator = HeapAllocator::new(heap_base);
        info!(heap_base = allocator.heap_base(), "Attached guest memory");

        self.memory = Some(memory);
        self.allocator = Some(Arc::new(Mutex::new(allocator)));
    }

    /// The attached guest memory.
    pub fn memory(&self) -> HostResult<Memory> {
        self.memory.ok_or(HostError::MemoryNotAttached)
    }

    /// The allocator for the attached memory.
    pub fn allocator(&self) -> HostResult<Arc<Mutex<HeapAllocator>>> {
        self.allocator
            .as_ref()
            .map(Arc::clone)
            .ok_or(HostError::MemoryNotAttached)
    }

    /// Whether memory has been attached.
    pub fn is_attached(&self) -> bool {
        self.memory.is_some()
    }

    /// Open a storage transaction.
    pub fn start_transaction(&mut self) -> HostResult<()> {
        self.capabilities.storage().start_transaction()?;
        self.transaction_depth += 1;
        debug!(depth = self.transaction_depth, "Storage transaction started");
        Ok(())
    }

    /// Close the innermost transaction, keeping its writes.
    pub fn commit_transaction(&mut self) -> HostResult<()> {
        self.close_transaction("commit")?;
        self.capabilities.storage().commit_transaction()?;
        Ok(())
    }

    /// Close the innermost transaction, discarding its writes.
    pub fn rollback_transaction(&mut self) -> HostResult<()> {
        self.close_transaction("rollback")?;
        self.capabilities.storage().rollback_transaction()?;
        Ok(())
    }

    fn close_transaction(&mut self, operation: &'static str) -> HostResult<()> {
        if self.transaction_depth == 0 {
            return Err(HostError::TransactionStackMisuse { operation });
        }
        self.transaction_depth -= 1;
        debug!(depth = self.transaction_depth, operation, "Storage transaction closed");
        Ok(())
    }

    /// Number of storage transactions currently open.
    pub fn transaction_depth(&self) -> usize {
        self.transaction_depth
    }

    /// Begin collecting signature checks.
    pub fn start_batch_verify(&mut self) -> HostResult<()> {
        if self.batch.is_some() {
            return Err(HostError::BatchVerifyMisuse { operation: "start" });
        }
        self.batch = Some(BatchVerification::default());
        Ok(())
    }

    /// Stop collecting and report whether every check passed.
    pub fn finish_batch_verify(&mut self) -> HostResult<bool> {
        let batch = self
            .batch
            .take()
            .ok_or(HostError::BatchVerifyMisuse { operation: "finish" })?;
        debug!(checked = batch.checked(), valid = batch.all_valid(), "Batch verification finished");
        Ok(batch.all_valid())
    }

    /// The open batch, if any.
    pub fn batch(&self) -> Option<&BatchVerification> {
        self.batch.as_ref()
    }

    /// Report a verification outcome to the guest.
    ///
    /// Inside a batch the outcome is recorded and the guest is told `true`;
    /// the real answer comes from [`finish_batch_verify`](Self::finish_batch_verify).
    pub fn verification_outcome(&mut self, valid: bool) -> bool {
        match self.batch.as_mut() {
            Some(batch) => {
                batch.record(valid);
                true
            }
            None => valid,
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("capabilities", &self.capabilities)
            .field("attached", &self.is_attached())
            .field("transaction_depth", &self.transaction_depth)
            .field("batch", &self.batch)
            .finish()
    }
}
