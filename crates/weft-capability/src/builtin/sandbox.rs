//! Nested sandbox backend that refuses every request.

use crate::backend::NestedSandbox;
use crate::capability::Capability;

/// A [`NestedSandbox`] that supports nothing.
///
/// Every call reports unsupported, so a guest that tries to spin up a nested
/// sandbox traps with the name of the operation instead of getting a
/// plausible-looking failure code.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSandbox;

impl Capability for UnsupportedSandbox {
    fn name(&self) -> &str {
        "unsupported-sandbox"
    }
}

impl NestedSandbox for UnsupportedSandbox {}
