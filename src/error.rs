//! Error types for segmentation, trial rejection and onset detection.
//!
//! A detector that finds no onset does **not** return an error: that outcome
//! is [`Latency::NotFound`](crate::onset::Latency::NotFound). Everything here is
//! a configuration or data fault that should abort the offending subject.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeplError {
    /// Window bounds are reversed, empty, or fall outside the signal.
    #[error("invalid window: samples [{start}, {end}) for a signal of {len} samples")]
    InvalidWindow { start: i64, end: i64, len: usize },

    /// Population statistics are undefined for this batch size.
    #[error("insufficient trials: got {got}, need at least {need}")]
    InsufficientTrials { got: usize, need: usize },

    /// Epoch violates the detector contract (empty signal, bad sampling rate).
    #[error("invalid epoch: {0}")]
    InvalidEpoch(&'static str),

    /// A per-trial baseline method was called on an epoch without a source trace.
    #[error("method {method} needs the trial's source trace for its baseline")]
    MissingBaseline { method: &'static str },

    /// Two arrays that must line up do not.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
}

pub type Result<T> = std::result::Result<T, MeplError>;
