//! Arena-addressed per-satellite state
use gnss::prelude::{Constellation, SV};

use crate::constants::NFREQ;

/// Arena capacity per constellation.
const NSAT_GPS: usize = 32;
const NSAT_GLO: usize = 27;
const NSAT_GAL: usize = 36;
const NSAT_BDS: usize = 46;
const NSAT_QZS: usize = 10;
const NSAT_SBS: usize = 23;

/// Total arena capacity: one slot per addressable satellite.
pub const MAX_SAT: usize = NSAT_GPS + NSAT_GLO + NSAT_GAL + NSAT_BDS + NSAT_QZS + NSAT_SBS;

/// Fixed [SV] to arena slot mapping. No hashing, no allocation:
/// all per-satellite state is addressed by this index.
pub(crate) fn slot(sv: SV) -> Option<usize> {
    let prn = sv.prn as usize;
    let base_prn = 1;

    let (base, capacity) = match sv.constellation {
        Constellation::GPS => (0, NSAT_GPS),
        Constellation::Glonass => (NSAT_GPS, NSAT_GLO),
        Constellation::Galileo => (NSAT_GPS + NSAT_GLO, NSAT_GAL),
        Constellation::BeiDou => (NSAT_GPS + NSAT_GLO + NSAT_GAL, NSAT_BDS),
        Constellation::QZSS => (NSAT_GPS + NSAT_GLO + NSAT_GAL + NSAT_BDS, NSAT_QZS),
        c if c.is_sbas() => {
            // SBAS GEOs broadcast PRNs 120..
            let base = NSAT_GPS + NSAT_GLO + NSAT_GAL + NSAT_BDS + NSAT_QZS;
            if (120..120 + NSAT_SBS).contains(&prn) {
                return Some(base + prn - 120);
            }
            return None;
        },
        _ => return None,
    };

    if (base_prn..base_prn + capacity).contains(&prn) {
        Some(base + prn - base_prn)
    } else {
        None
    }
}

/// Inverse of [slot], for diagnostics and status reports.
pub(crate) fn sv_from_slot(slot: usize) -> Option<SV> {
    let mut base = 0;
    for (constellation, capacity) in [
        (Constellation::GPS, NSAT_GPS),
        (Constellation::Glonass, NSAT_GLO),
        (Constellation::Galileo, NSAT_GAL),
        (Constellation::BeiDou, NSAT_BDS),
        (Constellation::QZSS, NSAT_QZS),
        (Constellation::SBAS, NSAT_SBS),
    ] {
        if slot < base + capacity {
            let prn = if constellation == Constellation::SBAS {
                120 + slot - base
            } else {
                1 + slot - base
            };
            return Some(SV::new(constellation, prn as u8));
        }
        base += capacity;
    }
    None
}

/// Per-satellite filtering state, diagnostics and signal history.
#[derive(Debug, Clone)]
pub struct SatelliteState {
    /// Azimuth at last epoch (radians)
    pub azimuth_rad: f64,

    /// Elevation at last epoch (radians)
    pub elevation_rad: f64,

    /// Satellite contributed a valid solution at last epoch
    pub vs: bool,

    /// Per-frequency phase validity at last epoch
    pub vsat: [bool; NFREQ],

    /// Previous geometry-free combination (m)
    pub gf: f64,

    /// Previous Melbourne-Wübbena combination (m)
    pub mw: f64,

    /// Melbourne-Wübbena running mean (m)
    pub mw_mean: f64,

    /// Melbourne-Wübbena running second moment (m²)
    pub mw_var: f64,

    /// Melbourne-Wübbena arc length (epochs)
    pub mw_arc: u32,

    /// Per-frequency cycle slip bits for the current epoch
    pub slip: [u8; NFREQ],

    /// Slip provenance: loss-of-lock indicator
    pub slip_lli: [bool; NFREQ],

    /// Slip provenance: geometry-free jump
    pub slip_gf: [bool; NFREQ],

    /// Slip provenance: Melbourne-Wübbena jump
    pub slip_mw: [bool; NFREQ],

    /// Accumulated phase windup (cycles)
    pub phase_windup_cycles: f64,

    /// Per-frequency outage counters (epochs)
    pub outage: [u32; NFREQ],

    /// Per-frequency lock counters (epochs)
    pub lock: [u32; NFREQ],

    /// Cumulative slip counters
    pub slip_count: [u32; NFREQ],

    /// Rejection counters, [0] carrier [1] code
    pub reject_count: [u32; 2],

    /// Last carrier phase residuals (m)
    pub phase_residual_m: [f64; NFREQ],

    /// Last pseudo range residuals (m)
    pub code_residual_m: [f64; NFREQ],

    /// Signal strength at last epoch (dB-Hz)
    pub snr_dbhz: [f64; NFREQ],

    /// Modeled slant ionospheric delay at last epoch (m)
    pub iono_delay_m: f64,

    /// Modeled slant ionospheric delay variance (m²)
    pub iono_variance_m2: f64,

    /// Ambiguity fix state per frequency: 0 none, 1 float, 2 fixed
    pub fix: [u8; NFREQ],

    /// Ambiguity pairing flags for fix-and-hold bookkeeping,
    /// one per possible peer satellite.
    pub pair_flags: Vec<bool>,
}

impl Default for SatelliteState {
    fn default() -> Self {
        Self {
            azimuth_rad: 0.0,
            elevation_rad: 0.0,
            vs: false,
            vsat: [false; NFREQ],
            gf: 0.0,
            mw: 0.0,
            mw_mean: 0.0,
            mw_var: 0.0,
            mw_arc: 0,
            slip: [0; NFREQ],
            slip_lli: [false; NFREQ],
            slip_gf: [false; NFREQ],
            slip_mw: [false; NFREQ],
            phase_windup_cycles: 0.0,
            outage: [0; NFREQ],
            lock: [0; NFREQ],
            slip_count: [0; NFREQ],
            reject_count: [0; 2],
            phase_residual_m: [0.0; NFREQ],
            code_residual_m: [0.0; NFREQ],
            snr_dbhz: [0.0; NFREQ],
            iono_delay_m: 0.0,
            iono_variance_m2: 0.0,
            fix: [0; NFREQ],
            pair_flags: vec![false; MAX_SAT],
        }
    }
}

impl SatelliteState {
    /// Clears the epoch slip bits and their provenance,
    /// ahead of a new detection round.
    pub(crate) fn clear_slips(&mut self, nf: usize) {
        for f in 0..nf.min(NFREQ) {
            self.slip[f] = 0;
            self.slip_lli[f] = false;
            self.slip_gf[f] = false;
            self.slip_mw[f] = false;
        }
    }

    /// Resets the Melbourne-Wübbena running statistics to a fresh
    /// single-sample arc.
    pub(crate) fn reset_mw_arc(&mut self, mw: f64, half_wide_lane_m: f64) {
        self.mw_mean = mw;
        self.mw_var = half_wide_lane_m;
        self.mw_arc = 1;
    }
}
