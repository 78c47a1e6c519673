//! Epoch measurement proposal
use gnss::prelude::SV;
use hifitime::Epoch;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{constants::NFREQ, state::satellite::slot};

/// Code (pseudo range modulation) identifier, following the
/// RINEX observable naming.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Code {
    /// Unknown or absent modulation
    #[default]
    Unknown,
    /// L1 C/A
    C1C,
    /// L1 P(Y)
    C1W,
    /// G1 P (Glonass)
    C1P,
    /// G2 P (Glonass)
    C2P,
    /// L2 C/A
    C2C,
    /// L2C (M)
    C2S,
    /// L2C (L)
    C2L,
    /// L2C (M+L)
    C2X,
    /// L2 P(Y)
    C2W,
    /// L5/E5a (Q)
    C5Q,
    /// L5/E5a (I+Q)
    C5X,
    /// B1 (I)
    C2I,
    /// B2/E5b (I)
    C7I,
    /// B3 (I)
    C6I,
}

impl Code {
    /// Total number of identifiers, sizing SSR bias tables.
    pub const COUNT: usize = 15;

    /// Index into SSR per-signal bias tables.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// True for the civil L1 C/A code, which the P1-C1 DCB maps to P1.
    pub(crate) fn is_l1_civil(&self) -> bool {
        matches!(self, Self::C1C)
    }

    /// True for civil L2C variants, which the P2-C2 DCB maps to P2.
    pub(crate) fn is_l2_civil(&self) -> bool {
        matches!(self, Self::C2C | Self::C2S | Self::C2L | Self::C2X)
    }
}

/// One satellite's raw signal sampling for one epoch.
/// Frequencies are indexed 0..[NFREQ] in the constellation's
/// nominal band order; unavailable signals are all-zero.
#[derive(Debug, Default, Clone)]
pub struct Observation {
    /// Carrier phase (cycles)
    pub phase_cycles: [f64; NFREQ],
    /// Pseudo range (m)
    pub pseudo_range_m: [f64; NFREQ],
    /// Doppler shift (Hz)
    pub doppler_hz: [f64; NFREQ],
    /// Signal strength (dB-Hz)
    pub snr_dbhz: [f64; NFREQ],
    /// Loss of lock indicator
    pub lli: [u8; NFREQ],
    /// Sampled [Code]s
    pub code: [Code; NFREQ],
}

/// Position solving candidate: one satellite's [Observation]
/// along with its precise orbital and clock products.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// [SV] identity
    pub sv: SV,

    /// Sampling [Epoch]
    pub t: Epoch,

    /// Signal [Observation]
    pub observation: Observation,

    /// Antenna phase center position at transmission (ECEF m),
    /// from the precise orbit product. Zeroed by the eclipse filter.
    pub position_ecef_m: Vector3<f64>,

    /// Velocity at transmission (ECEF m.s⁻¹)
    pub velocity_ecef_m_s: Vector3<f64>,

    /// Clock bias at transmission (s), from the precise clock product
    pub clock_bias_s: f64,

    /// Clock drift (s.s⁻¹)
    pub clock_drift_s_s: f64,

    /// Orbit product variance (m²)
    pub orbit_variance_m2: f64,

    /// Health word: any non zero value excludes the satellite
    pub health: u32,
}

impl Candidate {
    /// Basic [Candidate] definition, to propose to the estimator.
    /// Orbital state, clock products and health may then be refined
    /// with direct field access.
    pub fn new(sv: SV, t: Epoch, observation: Observation) -> Self {
        Self {
            sv,
            t,
            observation,
            position_ecef_m: Vector3::zeros(),
            velocity_ecef_m_s: Vector3::zeros(),
            clock_bias_s: 0.0,
            clock_drift_s_s: 0.0,
            orbit_variance_m2: 0.0,
            health: 0,
        }
    }

    /// Arena slot addressing all per-satellite state.
    pub(crate) fn slot(&self) -> Option<usize> {
        slot(self.sv)
    }
}

/// One epoch of measurements and models, proposed to
/// [crate::prelude::Estimator::process].
#[derive(Debug, Clone)]
pub struct EpochInput {
    /// Sampling [Epoch]
    pub time: Epoch,

    /// Measurement proposal
    pub candidates: Vec<Candidate>,

    /// Receiver position from the caller's single point solution
    /// (ECEF m), seeding position states and linearization.
    pub apriori_position_ecef_m: Vector3<f64>,

    /// Receiver velocity from the single point solution
    /// (ECEF m.s⁻¹), seeding velocity states when dynamics are on.
    pub apriori_velocity_ecef_m_s: Vector3<f64>,

    /// Receiver clock from the single point solution:
    /// index 0 is the GPS clock (s), following indices are
    /// inter-system offsets with respect to it.
    pub apriori_clock_s: [f64; crate::constants::NSYS],

    /// Sun position (ECEF m), from precise products, for the
    /// attitude, eclipse and phase windup models.
    pub sun_position_ecef_m: Vector3<f64>,

    /// Solid tide site displacement (ECEF m), computed by the
    /// caller, applied when [crate::prelude::Config] requests it.
    pub tide_displacement_m: Vector3<f64>,
}

impl EpochInput {
    /// Define a new epoch proposal. Sun position and tide
    /// displacement may then be refined with direct field access.
    pub fn new(
        time: Epoch,
        candidates: Vec<Candidate>,
        apriori_position_ecef_m: Vector3<f64>,
        apriori_clock_s: [f64; crate::constants::NSYS],
    ) -> Self {
        Self {
            time,
            candidates,
            apriori_position_ecef_m,
            apriori_clock_s,
            apriori_velocity_ecef_m_s: Vector3::zeros(),
            sun_position_ecef_m: Vector3::zeros(),
            tide_displacement_m: Vector3::zeros(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Code;

    #[test]
    fn test_code_classes() {
        assert!(Code::C1C.is_l1_civil());
        assert!(!Code::C1W.is_l1_civil());

        for code in [Code::C2C, Code::C2S, Code::C2L, Code::C2X] {
            assert!(code.is_l2_civil());
        }
        assert!(!Code::C2W.is_l2_civil());

        assert!(Code::C6I.index() < Code::COUNT);
    }
}
