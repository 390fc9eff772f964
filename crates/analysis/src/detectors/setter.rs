use libsigil_core::{
    engine::{opcode, state::MachineState},
    error::Result,
    taint::Marker,
};

use crate::{
    detector::{Detector, Reported},
    finding::Finding,
};

const POST_HOOKS: &[u8] = &[
    opcode::DUP1,
    opcode::PUSH1,
    opcode::DUP2,
    opcode::SWAP1,
    opcode::SSTORE,
];

/// Recognizes the storage-setter shape: an argument duplicated, the slot
/// constant pushed over it, reshuffled, and written with `SSTORE`.
///
/// The marker chain must build up in order on one value; each stage only
/// extends a slot that already carries the previous stages. Reports at
/// most once per function.
#[derive(Debug, Default)]
pub struct Setter {
    reported: Reported,
}

impl Detector for Setter {
    fn name(&self) -> &'static str {
        "Setter"
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
            opcode::DUP1 => {
                if let Some(top) = state.stack.top() {
                    top.attach(Marker::DupOne);
                }
            }
            opcode::PUSH1 => {
                // the chained value now sits one below the pushed constant
                if let Ok(below) = state.stack.peek(1) {
                    if below.carries(&Marker::DupOne) {
                        below.attach(Marker::PushOne);
                    }
                }
            }
            opcode::DUP2 => {
                if let Some(top) = state.stack.top() {
                    if top.carries_all(&[Marker::DupOne, Marker::PushOne]) {
                        top.attach(Marker::DupTwo);
                    }
                }
            }
            opcode::SWAP1 => {
                if let Some(top) = state.stack.top() {
                    if top.carries_all(&[
                        Marker::DupOne,
                        Marker::PushOne,
                        Marker::DupTwo,
                    ]) {
                        top.attach(Marker::SwapOne);
                    }
                }
            }
            opcode::SSTORE => {
                if self.reported.contains(&state.env.function) {
                    return Ok(None);
                }
                for slot in state.stack.iter() {
                    if slot.carries_all(&[
                        Marker::DupOne,
                        Marker::PushOne,
                        Marker::DupTwo,
                        Marker::SwapOne,
                    ]) {
                        slot.attach(Marker::StorageSave(None));
                        self.reported.mark(&state.env.function);
                        return Ok(Some(Finding::new(state, "Setter")));
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

#[cfg(test)]
mod tests {
    use libsigil_core::engine::{
        replay::{replay, Trace, TraceBuilder},
        types::U256,
    };

    use super::*;
    use crate::registry::Registry;

    // set(uint256): dup the argument, push the slot, reshuffle, store
    fn setter_trace() -> Trace {
        TraceBuilder::new("Token")
            .function("set(uint256)")
            .push(opcode::PUSH1, U256::from(7))
            .op(opcode::DUP1)
            .push(opcode::PUSH1, U256::from(5))
            .op(opcode::DUP2)
            .op(opcode::SWAP1)
            .op(opcode::SWAP1)
            .op(opcode::SSTORE)
            .build()
    }

    fn registry() -> Registry {
        let mut registry = Registry::default();
        registry.register(Box::new(Setter::default())).unwrap();
        registry
    }

    #[test]
    fn test_setter_chain_fires_once() {
        let mut registry = registry();
        replay(&setter_trace(), &mut registry).unwrap();

        let results = registry.results();
        assert_eq!(
            results["Setter"],
            vec![Finding {
                contract: "Token".to_string(),
                function: "set(uint256)".to_string(),
                pattern: "Setter".to_string(),
                storage_address: None,
            }]
        );
    }

    #[test]
    fn test_broken_chain_is_silent() {
        // same opcodes minus the DUP2 stage: the chain never completes
        let trace = TraceBuilder::new("Token")
            .function("set(uint256)")
            .push(opcode::PUSH1, U256::from(7))
            .op(opcode::DUP1)
            .push(opcode::PUSH1, U256::from(5))
            .op(opcode::SWAP1)
            .op(opcode::SSTORE)
            .build();
        let mut registry = registry();
        replay(&trace, &mut registry).unwrap();
        assert!(registry.results()["Setter"].is_empty());
    }

    #[test]
    fn test_results_stable_across_fresh_registries() {
        let mut first = registry();
        replay(&setter_trace(), &mut first).unwrap();
        let mut second = registry();
        replay(&setter_trace(), &mut second).unwrap();

        assert_eq!(
            serde_json::to_string(&first.results()).unwrap(),
            serde_json::to_string(&second.results()).unwrap()
        );
    }
}
