use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// `base..base+count` is not inside a memory of `size` words
    OutOfRange { base: usize, count: usize, size: usize },
    UnknownProtocol(String),
    UnknownCpu(usize),
    /// advisory only, see `SystemSpec::mismatches`
    ConfigurationMismatch(String),
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::OutOfRange { base, count, size } => write!(
                f,
                "memory range {}..{} is outside of {} words",
                base,
                base.saturating_add(*count),
                size
            ),
            SimError::UnknownProtocol(sel) => write!(f, "unknown protocol: {}", sel),
            SimError::UnknownCpu(cpu) => write!(f, "no cpu {} in this system", cpu),
            SimError::ConfigurationMismatch(msg) => write!(f, "configuration mismatch: {}", msg),
            SimError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}
