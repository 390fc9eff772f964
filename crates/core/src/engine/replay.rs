//! Linear replay of recorded instruction traces.
//!
//! A concrete stand-in for the symbolic engine: it drives an [`Inspector`]
//! along one straight-line path, maintaining the symbolic operand stack
//! the way the engine would. No branching, no memory or storage model.

use crate::error::{Result, SigilError};

use super::{
    inspector::Inspector,
    opcode,
    state::{CallEnv, Instruction, MachineState, OperandStack, StackSlot},
    types::U256,
};

/// One recorded instruction.
#[derive(Clone, Debug)]
pub struct TraceStep {
    pub op: u8,
    pub pc: u64,
    /// Function the instruction belongs to.
    pub function: String,
    /// Immediate operand of PUSH1..PUSH32.
    pub imm: Option<U256>,
}

/// A straight-line instruction trace within one contract.
#[derive(Clone, Debug)]
pub struct Trace {
    pub contract: String,
    pub steps: Vec<TraceStep>,
}

/// Builds traces step by step; the program counter advances by the
/// instruction width automatically.
#[derive(Debug)]
pub struct TraceBuilder {
    contract: String,
    function: String,
    steps: Vec<TraceStep>,
    pc: u64,
}

impl TraceBuilder {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            function: String::new(),
            steps: Vec::new(),
            pc: 0,
        }
    }

    /// Subsequent steps belong to `function`.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    pub fn op(mut self, op: u8) -> Self {
        self.record(op, None);
        self
    }

    /// Record a PUSH instruction together with its immediate.
    pub fn push(mut self, op: u8, imm: U256) -> Self {
        self.record(op, Some(imm));
        self
    }

    fn record(&mut self, op: u8, imm: Option<U256>) {
        self.steps.push(TraceStep {
            op,
            pc: self.pc,
            function: self.function.clone(),
            imm,
        });
        self.pc += 1 + opcode::push_width(op) as u64;
    }

    pub fn build(self) -> Trace {
        Trace {
            contract: self.contract,
            steps: self.steps,
        }
    }
}

/// Replay a trace against an inspector, starting from an empty stack.
/// Replay stops after the first terminal instruction.
pub fn replay(trace: &Trace, inspector: &mut impl Inspector) -> Result<()> {
    let mut state = MachineState::new(CallEnv {
        contract: trace.contract.clone(),
        function: String::new(),
    });
    for step in &trace.steps {
        state.instruction = Instruction {
            op: step.op,
            pc: step.pc,
        };
        state.env.function = step.function.clone();
        inspector.step(&mut state);
        let before = state.clone();
        execute(&mut state.stack, step)?;
        inspector.step_end(&mut state, &before);
        if opcode::is_terminal(step.op) {
            break;
        }
    }
    Ok(())
}

/// Apply the stack effect of one instruction.
fn execute(stack: &mut OperandStack, step: &TraceStep) -> Result<()> {
    match step.op {
        opcode::PUSH0 => stack.push(StackSlot::concrete(U256::ZERO)),
        op if opcode::is_push(op) => {
            let imm = step.imm.ok_or_else(|| {
                SigilError::Trace(format!(
                    "{} without immediate at pc {}",
                    opcode::name(op),
                    step.pc
                ))
            })?;
            stack.push(StackSlot::concrete(imm));
        }
        op if opcode::is_dup(op) => {
            stack.dup((op - opcode::DUP1) as usize)?;
        }
        op if opcode::is_swap(op) => {
            stack.swap((op - opcode::SWAP1 + 1) as usize)?;
        }
        op => {
            let (n_pop, n_push) = opcode::STACK_DELTA[op as usize];
            for _ in 0..n_pop {
                stack.pop()?;
            }
            for _ in 0..n_push {
                stack.push(StackSlot::symbolic());
            }
        }
    }
    Ok(())
}
