use hifitime::Epoch;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::NSYS;

/// Solution quality reached for one epoch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolutionStatus {
    /// No solution formed.
    #[default]
    None,
    /// Single point seed only: the filter did not accept the epoch.
    Single,
    /// Float PPP solution.
    Float,
    /// Ambiguity-fixed PPP solution.
    Fixed,
}

/// One epoch's estimation outcome.
#[derive(Debug, Default, Clone)]
pub struct Solution {
    /// [Epoch] of resolution
    pub time: Epoch,

    /// Reached [SolutionStatus]
    pub status: SolutionStatus,

    /// Receiver position (ECEF m)
    pub position_ecef_m: Vector3<f64>,

    /// Position covariance, packed (xx, yy, zz, xy, yz, zx) (m²)
    pub position_covar_m2: [f64; 6],

    /// Receiver clocks (m): index 0 carries the reference clock,
    /// following indices the inter-system offsets against it.
    pub receiver_clock_m: [f64; NSYS],

    /// Number of satellites contributing on the first frequency
    pub satellites: usize,
}
