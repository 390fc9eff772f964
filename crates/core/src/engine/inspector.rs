use auto_impl::auto_impl;

use super::state::MachineState;

/// Hook interface driven by the execution engine.
///
/// The engine calls `step` immediately before executing the instruction at
/// `state.instruction` and `step_end` immediately after. In `step_end`,
/// `state` is the resulting state still addressed at the executed
/// instruction and `prev` the state immediately preceding it; the engine
/// advances only afterwards. Hooks run synchronously, one instruction at a
/// time, along a single path.
#[auto_impl(&mut, Box)]
pub trait Inspector {
    /// Called before the instruction is executed.
    fn step(&mut self, _state: &mut MachineState) {}

    /// Called after the instruction has been executed.
    fn step_end(&mut self, _state: &mut MachineState, _prev: &MachineState) {}
}

#[derive(Default, Clone, PartialEq, Eq, Copy, Debug)]
pub struct NoInspector;

impl Inspector for NoInspector {}
