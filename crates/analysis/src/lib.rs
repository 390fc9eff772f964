// Trace-pattern detection over EVM execution.

pub mod config;
pub mod detector;
pub mod detectors;
pub mod finding;
pub mod registry;
