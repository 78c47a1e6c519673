//! Ambiguity resolution seam
use nalgebra::{DMatrix, DVector};

use crate::{observation::Candidate, state::StateIndexer};

/// Candidate integer-fixed state, produced by an external search
/// (LAMBDA or similar) over the float ambiguity block.
#[derive(Debug, Clone)]
pub struct FixedSolution {
    /// Fixed state vector
    pub x: DVector<f64>,
    /// Fixed covariance
    pub p: DMatrix<f64>,
}

/// Integer ambiguity search seam. The estimator hands over its
/// float state and covariance after every accepted epoch; a
/// resolver may return an integer-fixed alternative which is then
/// validated against the measurements before being retained.
pub trait AmbiguityResolver {
    /// Attempt to fix the float ambiguities.
    ///
    /// ## Input
    /// - indexer: state layout, locating the ambiguity block
    /// - candidates: this epoch's proposal
    /// - x: float state vector
    /// - p: float covariance
    ///
    /// ## Output
    /// - Some([FixedSolution]) on success, None to stay float
    fn resolve(
        &mut self,
        indexer: &StateIndexer,
        candidates: &[Candidate],
        x: &DVector<f64>,
        p: &DMatrix<f64>,
    ) -> Option<FixedSolution>;
}

/// Default seam implementation: never fixes, the estimator
/// remains a float PPP filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAmbiguityResolution;

impl AmbiguityResolver for NoAmbiguityResolution {
    fn resolve(
        &mut self,
        _: &StateIndexer,
        _: &[Candidate],
        _: &DVector<f64>,
        _: &DMatrix<f64>,
    ) -> Option<FixedSolution> {
        None
    }
}
