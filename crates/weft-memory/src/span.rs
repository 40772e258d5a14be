//! Pointer/length packing used at the guest boundary.
//!
//! A span carries a 32-bit offset in the low half and a 32-bit length in
//! the high half of a single 64-bit word, so one wasm `i64` can describe a
//! buffer.

use std::fmt;

/// A `(offset, len)` pair inside guest linear memory.
///
/// Decoding a span performs no validation; bounds are checked by the
/// [`MemoryView`](crate::MemoryView) at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start offset.
    pub offset: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a span.
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// Pack into `offset | (len << 32)`.
    pub const fn encode(self) -> u64 {
        (self.offset as u64) | ((self.len as u64) << 32)
    }

    /// Unpack a value produced by [`Span::encode`].
    pub const fn decode(packed: u64) -> Self {
        Self {
            offset: (packed & 0xFFFF_FFFF) as u32,
            len: (packed >> 32) as u32,
        }
    }

    /// Reinterpret a wasm `i64` argument.
    pub const fn from_wasm(value: i64) -> Self {
        Self::decode(value as u64)
    }

    /// Bit pattern to hand back to the guest as an `i64`.
    pub const fn to_wasm(self) -> i64 {
        self.encode() as i64
    }

    /// One past the last byte, computed without wrapping.
    pub const fn end(self) -> u64 {
        self.offset as u64 + self.len as u64
    }

    /// Whether the span covers no bytes.
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

impl From<u64> for Span {
    fn from(packed: u64) -> Self {
        Self::decode(packed)
    }
}

impl From<Span> for u64 {
    fn from(span: Span) -> Self {
        span.encode()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{}", self.offset, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_extremes() {
        for (offset, len) in [(0, 0), (u32::MAX, u32::MAX), (0x10, 0), (0, 0x20), (65536, 7)] {
            let span = Span::new(offset, len);
            assert_eq!(Span::decode(span.encode()), span);
            assert_eq!(Span::from_wasm(span.to_wasm()), span);
        }
    }

    #[test]
    fn test_layout() {
        let packed = Span::new(0x1234, 0x10).encode();
        assert_eq!(packed, 0x0000_0010_0000_1234);
        assert_eq!(Span::decode(0xFFFF_FFFF_0000_0001), Span::new(1, u32::MAX));
    }

    #[test]
    fn test_negative_wasm_value() {
        // High bit set in the length must not be sign-extended away.
        let span = Span::from_wasm(-1);
        assert_eq!(span, Span::new(u32::MAX, u32::MAX));
        assert_eq!(span.end(), 2 * u32::MAX as u64);
    }
}
