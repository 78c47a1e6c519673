use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    /// The epoch proposal was empty: nothing to solve.
    #[error("no candidates provided")]
    NoCandidates,

    /// Candidate refers to a satellite the arena does not address
    /// (unsupported constellation or out-of-range PRN).
    #[error("satellite is not supported")]
    UnsupportedSatellite,

    /// Bad signal data or invalid orbital states may cause the
    /// measurement update to wind up here.
    #[error("failed to invert innovation matrix")]
    MatrixInversion,

    /// Internal dimension mismatch between design matrix, residual
    /// vector and weights. Indicates a programming error.
    #[error("internal error: invalid matrix setup")]
    MatrixDimension,

    #[error("invalid frequency")]
    InvalidFrequency,

    #[error("unknown carrier frequency")]
    UnknownCarrierFrequency,

    /// The iteration loop exhausted [crate::constants::MAX_ITER]
    /// without ever passing the post-fit screening.
    #[error("measurement iteration overflow")]
    IterationOverflow,
}
