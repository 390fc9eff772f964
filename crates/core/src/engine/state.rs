use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Result, SigilError};
use crate::taint::{Marker, MarkerKind, MarkerSet};

use super::{opcode, types::U256};

/// A machine word as seen by the engine: either a concrete 256-bit value
/// or an opaque symbolic expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymWord {
    Concrete(U256),
    Symbolic,
}

impl SymWord {
    pub fn is_concrete(&self) -> bool {
        matches!(self, SymWord::Concrete(_))
    }

    pub fn as_concrete(&self) -> Option<U256> {
        match self {
            SymWord::Concrete(v) => Some(*v),
            SymWord::Symbolic => None,
        }
    }
}

/// Shared handle to the marker set of one value.
///
/// Duplicating a slot aliases the handle, so a marker attached through any
/// copy is visible through every copy. This mirrors symbolic engines that
/// keep one annotation store per value object, and it is what lets a
/// detector recognize a value after the copy it tagged has been consumed.
#[derive(Clone, Debug, Default)]
pub struct MarkerCell(Rc<RefCell<MarkerSet>>);

impl MarkerCell {
    /// Attach a marker. Returns false when a marker of the same kind is
    /// already present.
    pub fn attach(&self, marker: Marker) -> bool {
        self.0.borrow_mut().insert(marker)
    }

    pub fn carries(&self, marker: &Marker) -> bool {
        self.0.borrow().contains(marker)
    }

    pub fn carries_kind(&self, kind: MarkerKind) -> bool {
        self.0.borrow().contains_kind(kind)
    }

    pub fn carries_all(&self, markers: &[Marker]) -> bool {
        self.0.borrow().contains_all(markers)
    }

    pub fn get(&self, kind: MarkerKind) -> Option<Marker> {
        self.0.borrow().get(kind)
    }

    /// Whether two cells are the same underlying store.
    pub fn aliases(&self, other: &MarkerCell) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// One slot of the symbolic operand stack.
#[derive(Clone, Debug)]
pub struct StackSlot {
    pub value: SymWord,
    markers: MarkerCell,
}

impl StackSlot {
    /// A new slot holding a concrete value, with an empty marker cell of
    /// its own.
    pub fn concrete(value: U256) -> Self {
        Self {
            value: SymWord::Concrete(value),
            markers: MarkerCell::default(),
        }
    }

    /// A new slot holding an opaque symbolic value.
    pub fn symbolic() -> Self {
        Self {
            value: SymWord::Symbolic,
            markers: MarkerCell::default(),
        }
    }

    pub fn attach(&self, marker: Marker) -> bool {
        self.markers.attach(marker)
    }

    pub fn carries(&self, marker: &Marker) -> bool {
        self.markers.carries(marker)
    }

    pub fn carries_kind(&self, kind: MarkerKind) -> bool {
        self.markers.carries_kind(kind)
    }

    pub fn carries_all(&self, markers: &[Marker]) -> bool {
        self.markers.carries_all(markers)
    }

    pub fn marker(&self, kind: MarkerKind) -> Option<Marker> {
        self.markers.get(kind)
    }

    pub fn markers(&self) -> &MarkerCell {
        &self.markers
    }
}

/// The symbolic operand stack of the executing frame.
///
/// Slots are stored bottom-up: `iter` starts at index 0, the bottom.
/// Depth-based accessors count from the top: depth 0 is the top slot.
#[derive(Clone, Debug, Default)]
pub struct OperandStack {
    slots: Vec<StackSlot>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&mut self, slot: StackSlot) {
        self.slots.push(slot);
    }

    pub fn pop(&mut self) -> Result<StackSlot> {
        self.slots.pop().ok_or(SigilError::StackUnderflow {
            depth: 0,
            len: 0,
        })
    }

    pub fn top(&self) -> Option<&StackSlot> {
        self.slots.last()
    }

    /// The slot at `depth` below the top.
    pub fn peek(&self, depth: usize) -> Result<&StackSlot> {
        let len = self.slots.len();
        if depth >= len {
            return Err(SigilError::StackUnderflow { depth, len });
        }
        Ok(&self.slots[len - 1 - depth])
    }

    /// Push a copy of the slot at `depth`. The copy shares the original's
    /// marker cell.
    pub fn dup(&mut self, depth: usize) -> Result<()> {
        let slot = self.peek(depth)?.clone();
        self.push(slot);
        Ok(())
    }

    /// Exchange the top slot with the slot at `depth`. Markers travel with
    /// their slots.
    pub fn swap(&mut self, depth: usize) -> Result<()> {
        let len = self.slots.len();
        if depth >= len {
            return Err(SigilError::StackUnderflow { depth, len });
        }
        self.slots.swap(len - 1, len - 1 - depth);
        Ok(())
    }

    /// Bottom-up iteration, index 0 first.
    pub fn iter(&self) -> std::slice::Iter<'_, StackSlot> {
        self.slots.iter()
    }
}

/// The instruction the engine is positioned at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: u8,
    pub pc: u64,
}

/// Identifiers of the code the current instruction belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallEnv {
    pub contract: String,
    pub function: String,
}

/// Everything a detector may observe about the engine at one instruction.
///
/// Cloning snapshots the stack layout and values; marker cells stay shared
/// between the clone and the original.
#[derive(Clone, Debug)]
pub struct MachineState {
    pub instruction: Instruction,
    pub stack: OperandStack,
    pub env: CallEnv,
}

impl MachineState {
    pub fn new(env: CallEnv) -> Self {
        Self {
            instruction: Instruction {
                op: opcode::STOP,
                pc: 0,
            },
            stack: OperandStack::new(),
            env,
        }
    }
}
