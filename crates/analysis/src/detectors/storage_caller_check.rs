use libsigil_core::{
    engine::{opcode, state::MachineState, types::U256},
    error::Result,
    taint::{Marker, MarkerKind},
};
use libsigil_utils::log::debug;

use crate::{detector::Detector, finding::Finding};

/// Largest storage slot index tracked by value. Higher or symbolic keys
/// are hash-derived mapping slots and carry no useful index.
pub const MAX_TRACKED_SLOT: u64 = 255;

const POST_HOOKS: &[u8] = &[opcode::CALLER, opcode::SLOAD, opcode::EQ];
const PRE_HOOKS: &[u8] = &[opcode::JUMPI];

/// Recognizes caller-authorization checks: `CALLER` compared for
/// equality against a value loaded from a tracked storage slot, with the
/// comparison result steering a conditional jump.
///
/// Fires once per matched `JUMPI` occurrence; repeated checks in one
/// function are all reported.
#[derive(Debug, Default)]
pub struct StorageCallerCheck;

impl Detector for StorageCallerCheck {
    fn name(&self) -> &'static str {
        "StorageCallerCheck"
    }

    fn pre_hooks(&self) -> &'static [u8] {
        PRE_HOOKS
    }

    fn post_hooks(&self) -> &'static [u8] {
        POST_HOOKS
    }

    fn analyze(
        &mut self,
        state: &mut MachineState,
        prev: Option<&MachineState>,
    ) -> Result<Option<Finding>> {
        match state.instruction.op {
            opcode::CALLER => {
                if let Some(top) = state.stack.top() {
                    top.attach(Marker::Caller);
                }
            }
            opcode::SLOAD => {
                let index = prev.and_then(sload_index);
                if let (Some(index), Some(top)) = (index, state.stack.top()) {
                    top.attach(Marker::StorageLoad(Some(index)));
                }
            }
            opcode::EQ => {
                let index = prev.and_then(checked_slot);
                if let (Some(index), Some(top)) = (index, state.stack.top()) {
                    top.attach(Marker::CallerCheck(index));
                }
            }
            opcode::JUMPI => {
                // pre hook: the condition sits below the jump target
                if let Ok(cond) = state.stack.peek(1) {
                    if let Some(Marker::CallerCheck(index)) =
                        cond.marker(MarkerKind::CallerCheck)
                    {
                        return Ok(Some(
                            Finding::new(state, "StorageCallerCheck")
                                .with_storage_address(index),
                        ));
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn reset(&mut self) {}
}

/// Key of a completed `SLOAD`, when concrete and within the tracked
/// range.
fn sload_index(prev: &MachineState) -> Option<u64> {
    let key = prev.stack.peek(0).ok()?.value.as_concrete()?;
    if key > U256::from(MAX_TRACKED_SLOT) {
        return None;
    }
    Some(key.to::<u64>())
}

/// Slot index a completed `EQ` compared against the caller: one operand
/// carried the caller, the other a tracked storage load, either order.
fn checked_slot(prev: &MachineState) -> Option<u64> {
    let a = prev.stack.peek(0).ok()?;
    let b = prev.stack.peek(1).ok()?;
    [(a, b), (b, a)].into_iter().find_map(|(x, y)| {
        if !x.carries(&Marker::Caller) {
            return None;
        }
        match y.marker(MarkerKind::StorageLoad) {
            Some(Marker::StorageLoad(Some(index))) => Some(index),
            _ => None,
        }
    })
}

const SEQ_PRE_HOOKS: &[u8] =
    &[opcode::JUMPDEST, opcode::SLOAD, opcode::CALLER, opcode::EQ];

/// Sequence-flag variant of [`StorageCallerCheck`] for engines that
/// surface opcode occurrences but no operand values.
///
/// Tracks `JUMPDEST` then `SLOAD` then `CALLER` then `EQ` within one
/// basic block; entering a new block restarts the chain, so a check that
/// straddles a block boundary goes unreported. Reports the shared
/// pattern name without a slot index.
#[derive(Debug, Default)]
pub struct StorageCallerCheckSeq {
    after_jumpdest: bool,
    storage_loaded: bool,
    caller_loaded: bool,
}

impl Detector for StorageCallerCheckSeq {
    fn name(&self) -> &'static str {
        "StorageCallerCheckSeq"
    }

    fn pre_hooks(&self) -> &'static [u8] {
        SEQ_PRE_HOOKS
    }

    fn analyze(
        &mut self,
        state: &mut MachineState,
        _prev: Option<&MachineState>,
    ) -> Result<Option<Finding>> {
        debug!(
            contract = state.env.contract.as_str(),
            function = state.env.function.as_str(),
            "encountered {}",
            opcode::name(state.instruction.op)
        );
        match state.instruction.op {
            opcode::JUMPDEST => {
                self.storage_loaded = false;
                self.caller_loaded = false;
                self.after_jumpdest = true;
            }
            opcode::SLOAD if self.after_jumpdest => {
                self.storage_loaded = true;
            }
            opcode::CALLER if self.storage_loaded => {
                self.caller_loaded = true;
            }
            opcode::EQ => {
                let complete = self.after_jumpdest
                    && self.storage_loaded
                    && self.caller_loaded;
                self.reset();
                if complete {
                    return Ok(Some(Finding::new(state, "StorageCallerCheck")));
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.after_jumpdest = false;
        self.storage_loaded = false;
        self.caller_loaded = false;
    }
}
