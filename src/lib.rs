pub mod coherence;
pub mod regression;

pub use coherence::*;
