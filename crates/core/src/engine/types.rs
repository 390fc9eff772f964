/// This module defines a set of types that are used throughout the library.
/// Word types are re-exported from alloy.

// Low level types
pub type U256 = alloy_primitives::U256;
pub type U64 = alloy_primitives::U64;

pub use super::opcode;
