//! Bounds-checked access to guest memory.
//!
//! Every host function reads its arguments and writes its results through
//! [`MemoryView`]; nothing indexes guest memory directly.

use std::ops::Range;

use crate::error::{MemoryError, MemoryResult};
use crate::linear::LinearMemory;
use crate::span::Span;

/// Checked reads and writes over any [`LinearMemory`].
pub trait MemoryView: LinearMemory {
    /// Borrow the bytes covered by `span`.
    fn read(&self, span: Span) -> MemoryResult<&[u8]> {
        let range = checked_range(span.offset, span.len as u64, self.size())?;
        Ok(&self.data()[range])
    }

    /// Copy `bytes` into memory starting at `offset`.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> MemoryResult<()> {
        let range = checked_range(offset, bytes.len() as u64, self.size())?;
        self.data_mut()[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read a fixed-size argument such as a signature or public key.
    fn read_array<const N: usize>(&self, offset: u32) -> MemoryResult<[u8; N]> {
        let range = checked_range(offset, N as u64, self.size())?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data()[range]);
        Ok(out)
    }
}

impl<M: LinearMemory + ?Sized> MemoryView for M {}

fn checked_range(offset: u32, len: u64, memory_size: u64) -> MemoryResult<Range<usize>> {
    let start = offset as u64;
    // Both operands fit in 32 bits, so the sum cannot wrap in 64.
    let end = start + len;
    if end > memory_size {
        return Err(MemoryError::OutOfBounds {
            offset: start,
            len,
            memory_size,
        });
    }
    Ok(start as usize..end as usize)
}
