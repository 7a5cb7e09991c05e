use thiserror::Error;

/// Errors surfaced by model construction and training.
///
/// All of these are detected before the first EM iteration; the algorithm
/// itself is deterministic given valid inputs, so nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Model parameters or observations violate the input contract:
    /// dimension mismatches, rows not summing to one within tolerance,
    /// probabilities outside `[0, 1]`, an empty observation sequence, or a
    /// symbol outside the emission alphabet.
    #[error("invalid model input: {0}")]
    InvalidModelInput(String),

    /// A training run was requested with zero iterations.
    #[error("iteration count must be at least 1")]
    InvalidIterationCount,
}

pub type Result<T> = std::result::Result<T, Error>;
