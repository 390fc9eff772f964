pub type Result<T, E = SigilError> = std::result::Result<T, E>;

#[derive(Debug, derive_more::Display, thiserror::Error)]
pub enum SigilError {
    #[display(fmt = "Err detector not found: {}", _0)]
    DetectorNotFound(String),

    #[display(fmt = "Err invalid detector: {}", _0)]
    InvalidDetector(String),

    #[display(
        fmt = "Err stack underflow: access at depth {} on stack of {}",
        depth,
        len
    )]
    StackUnderflow { depth: usize, len: usize },

    #[display(fmt = "Err malformed trace: {}", _0)]
    Trace(String),

    #[display(fmt = "Err invalid config: {}", _0)]
    Config(String),

    #[display(fmt = "Err: {}", _0)]
    Custom(String),
}
