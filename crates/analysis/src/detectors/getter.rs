use libsigil_core::{
    engine::{opcode, state::MachineState},
    error::Result,
    taint::Marker,
};

use crate::{
    detector::{Detector, Reported},
    finding::Finding,
};

const POST_HOOKS: &[u8] = &[opcode::PUSH1, opcode::DUP1, opcode::SLOAD];

/// Recognizes the storage-getter prologue compilers emit for public
/// state variables: a small constant pushed, duplicated, and used as an
/// `SLOAD` key.
///
/// Reports at most once per function.
#[derive(Debug, Default)]
pub struct Getter {
    reported: Reported,
}

impl Detector for Getter {
    fn name(&self) -> &'static str {
        "Getter"
    }

    fn post_hooks(&self) -> &'static [u8] {
        POST_HOOKS
    }

    fn analyze(
        &mut self,
        state: &mut MachineState,
        _prev: Option<&MachineState>,
    ) -> Result<Option<Finding>> {
        match state.instruction.op {
            opcode::PUSH1 => {
                if let Some(top) = state.stack.top() {
                    top.attach(Marker::PushOne);
                }
            }
            opcode::DUP1 => {
                if let Some(top) = state.stack.top() {
                    if top.carries(&Marker::PushOne) {
                        top.attach(Marker::DupOne);
                    }
                }
            }
            opcode::SLOAD => {
                if self.reported.contains(&state.env.function) {
                    return Ok(None);
                }
                // bottom-up: the slot closest to the frame base wins
                for slot in state.stack.iter() {
                    if slot.carries(&Marker::DupOne) {
                        slot.attach(Marker::StorageLoad(None));
                        self.reported.mark(&state.env.function);
                        return Ok(Some(Finding::new(state, "Getter")));
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.reported.clear();
    }
}
