//! The shipped detectors.

pub mod getter;
pub mod payable;
pub mod setter;
pub mod storage_caller_check;
