pub mod gaussian;

pub use gaussian::GaussianHMM;

use thiserror::Error;

/// Failures raised by [`GaussianHMM::fit`] and [`GaussianHMM::score`].
///
/// Fitting is numerically unstable on small samples and extreme state
/// counts, so callers in the selection layer treat these as expected
/// outcomes and recover locally instead of propagating them.
#[derive(Debug, Error)]
pub enum HmmError {
    #[error("feature dimension mismatch: model expects {expected}, data has {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("sequence lengths sum to {sum} but the matrix has {rows} rows")]
    LengthMismatch { sum: usize, rows: usize },
    #[error("zero-length sequence in lengths vector")]
    EmptySequence,
    #[error("{frames} observation frames cannot support {states} hidden states")]
    TooFewFrames { frames: usize, states: usize },
    #[error("likelihood became non-finite during {0}")]
    NonFiniteLikelihood(&'static str),
}
