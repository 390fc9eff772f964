pub mod inspector;
pub mod opcode;
pub mod replay;
pub mod solver;
pub mod state;
pub mod types;
