//! Filter state vector and covariance
use nalgebra::{DMatrix, DVector};

pub mod index;
pub mod satellite;

pub use index::{Parameter, StateIndexer};
pub use satellite::SatelliteState;

/// The estimator's state vector and covariance, maintained in
/// lockstep. A parameter i is *active* iff `x[i] != 0` and
/// `p[(i, i)] > 0`; deactivation must clear both.
#[derive(Debug, Clone)]
pub struct FilterState {
    /// State vector
    pub x: DVector<f64>,

    /// Covariance, symmetric positive semi-definite
    pub p: DMatrix<f64>,

    /// Ambiguity-fixed state vector
    pub xa: DVector<f64>,

    /// Ambiguity-fixed covariance
    pub pa: DMatrix<f64>,
}

impl FilterState {
    /// Allocate a zeroed [FilterState] of given dimension.
    /// All parameters start inactive.
    pub fn new(nx: usize) -> Self {
        Self {
            x: DVector::zeros(nx),
            p: DMatrix::zeros(nx, nx),
            xa: DVector::zeros(nx),
            pa: DMatrix::zeros(nx, nx),
        }
    }

    /// State dimension.
    pub fn nx(&self) -> usize {
        self.x.nrows()
    }

    /// True if parameter i carries information.
    pub fn is_active(&self, i: usize) -> bool {
        self.x[i] != 0.0 && self.p[(i, i)] > 0.0
    }

    /// (Re)initialize parameter i: sets its value, clears its
    /// covariance row and column, then sets the diagonal.
    /// `init_param(i, 0.0, 0.0)` deactivates the parameter.
    pub fn init_param(&mut self, i: usize, x0: f64, var: f64) {
        self.x[i] = x0;
        for j in 0..self.nx() {
            let v = if i == j { var } else { 0.0 };
            self.p[(i, j)] = v;
            self.p[(j, i)] = v;
        }
    }

    /// Random-walk inflation of parameter i's variance.
    pub fn add_variance(&mut self, i: usize, dv: f64) {
        self.p[(i, i)] += dv;
    }
}
