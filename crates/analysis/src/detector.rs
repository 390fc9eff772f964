use std::collections::HashSet;

use auto_impl::auto_impl;
use libsigil_core::{engine::state::MachineState, error::Result};

use crate::finding::Finding;

/// One trace-pattern detector.
///
/// A detector names the opcodes it wants to observe and is called once
/// per hooked occurrence, in registration order. It may attach markers
/// through the state and keep its own bookkeeping, nothing else: the
/// instruction stream, the path schedule, and the other detectors are
/// out of reach.
#[auto_impl(&mut, Box)]
pub trait Detector: Send {
    /// Unique detector name, used for registration, filtering, and
    /// result keys.
    fn name(&self) -> &'static str;

    /// Opcodes to observe before they execute.
    fn pre_hooks(&self) -> &'static [u8] {
        &[]
    }

    /// Opcodes to observe after they execute.
    fn post_hooks(&self) -> &'static [u8] {
        &[]
    }

    /// Inspect one hooked occurrence. `prev` is the pre-execution
    /// snapshot and is present exactly for post hooks.
    fn analyze(
        &mut self,
        state: &mut MachineState,
        prev: Option<&MachineState>,
    ) -> Result<Option<Finding>>;

    /// Drop all per-run state (dedup tables, sequence flags).
    fn reset(&mut self);
}

/// Functions a detector has already reported in the current run.
#[derive(Debug, Clone, Default)]
pub struct Reported(HashSet<String>);

impl Reported {
    pub fn contains(&self, function: &str) -> bool {
        self.0.contains(function)
    }

    /// Mark the function reported. Returns false when it already was.
    pub fn mark(&mut self, function: &str) -> bool {
        self.0.insert(function.to_string())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_marks_once() {
        let mut reported = Reported::default();
        assert!(!reported.contains("transfer(address,uint256)"));
        assert!(reported.mark("transfer(address,uint256)"));
        assert!(!reported.mark("transfer(address,uint256)"));
        assert!(reported.contains("transfer(address,uint256)"));

        reported.clear();
        assert!(!reported.contains("transfer(address,uint256)"));
    }
}
