#![doc = include_str!("../README.md")]

extern crate gnss_rs as gnss;

// private modules
mod ambiguity;
mod attitude;
mod bias;
mod carrier;
mod cfg;
mod constants;
mod correction;
mod error;
mod geodesy;
mod kalman;
mod navdata;
mod observation;
mod residuals;
mod slip;
mod solution;
mod solver;
mod state;
mod status;
mod timeupdate;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::ambiguity::{AmbiguityResolver, FixedSolution, NoAmbiguityResolution};
    pub use crate::carrier::Carrier;
    pub use crate::cfg::{ArMode, Config, IonoOpt, Mode, TropOpt, WeightMode};
    pub use crate::constants::{NFREQ, NSYS, SPEED_OF_LIGHT_M_S};
    pub use crate::error::Error;
    pub use crate::geodesy::Geodetic;
    pub use crate::navdata::{
        AntennaPcv, ExternalCorrections, IonoMapModel, NavData, StecRecord,
    };
    pub use crate::observation::{Candidate, Code, EpochInput, Observation};
    pub use crate::solution::{Solution, SolutionStatus};
    pub use crate::solver::Estimator;
    pub use crate::state::{
        satellite::{SatelliteState, MAX_SAT},
        FilterState, Parameter, StateIndexer,
    };
    pub use crate::status::write_status;
    // re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch, TimeScale};
    pub use nalgebra::Vector3;
}
