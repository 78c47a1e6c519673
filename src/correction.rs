//! Observable corrector: antenna, windup, code bias, multipath,
//! and the classic dual-frequency combinations.
use gnss::prelude::Constellation;

use crate::{
    cfg::Config,
    constants::NFREQ,
    navdata::NavData,
    observation::{Candidate, Code},
};

/// Antenna/windup/bias corrected measurements for one satellite,
/// in meters, plus their iono-free combinations. Signals failing
/// the SNR mask or missing either phase or code stay zeroed.
#[derive(Debug, Default, Clone)]
pub(crate) struct CorrectedMeasurement {
    /// Corrected carrier phases (m)
    pub phase_m: [f64; NFREQ],
    /// Corrected pseudo ranges (m)
    pub code_m: [f64; NFREQ],
    /// Iono-free phase combination (m), 0 if not formable
    pub iono_free_phase_m: f64,
    /// Iono-free code combination (m), 0 if not formable
    pub iono_free_code_m: f64,
}

/// Applies antenna phase center, phase windup and code bias
/// corrections to one satellite's raw observation.
///
/// ## Input
/// - cand: measurement proposal
/// - nav: [NavData] context (wavelengths, biases)
/// - cfg: [Config] preset
/// - dant_rec: receiver antenna corrections per frequency (m)
/// - dant_sat: satellite antenna corrections per frequency (m)
/// - windup_cycles: accumulated phase windup (cycles)
/// - code_mp_m: additive code multipath corrections (m)
pub(crate) fn corrected_measurements(
    cand: &Candidate,
    nav: &NavData,
    cfg: &Config,
    dant_rec: &[f64; NFREQ],
    dant_sat: &[f64; NFREQ],
    windup_cycles: f64,
    code_mp_m: &[f64; NFREQ],
) -> CorrectedMeasurement {
    let mut corrected = CorrectedMeasurement::default();

    let slot = match cand.slot() {
        Some(slot) => slot,
        None => return corrected,
    };

    let obs = &cand.observation;

    for f in 0..NFREQ {
        let lambda = nav.wavelength_m(slot, f);

        if lambda == 0.0 || obs.phase_cycles[f] == 0.0 || obs.pseudo_range_m[f] == 0.0 {
            continue;
        }
        if cfg.min_snr_dbhz > 0.0 && obs.snr_dbhz[f] < cfg.min_snr_dbhz {
            continue;
        }

        // antenna phase center and phase windup correction
        corrected.phase_m[f] =
            obs.phase_cycles[f] * lambda - dant_sat[f] - dant_rec[f] - windup_cycles * lambda;
        corrected.code_m[f] = obs.pseudo_range_m[f] - dant_sat[f] - dant_rec[f] + code_mp_m[f];

        if cfg.ssr_ephemerides {
            // SSR code bias: differential against the clock reference signal
            let reference = match (cand.sv.constellation, f) {
                (Constellation::Glonass, 0) => Code::C1P,
                (Constellation::Glonass, _) => Code::C2P,
                (_, 0) => Code::C1W,
                (_, _) => Code::C2W,
            };
            let ssr = &nav.ssr_code_bias_m[slot];
            corrected.code_m[f] += ssr[obs.code[f].index()] - ssr[reference.index()];
        } else {
            // P1-C1, P2-C2 DCB correction (C1->P1, C2->P2)
            if obs.code[f].is_l1_civil() {
                corrected.code_m[f] += nav.code_bias_m[slot][1];
            } else if obs.code[f].is_l2_civil() {
                corrected.code_m[f] += nav.code_bias_m[slot][2];
            }
        }
    }

    // iono-free combination, on the constellation's L1/L2 or L1/L5 pairing
    let k = cfg.second_frequency(cand.sv.constellation);

    let (lambda_1, lambda_k) = (nav.wavelength_m(slot, 0), nav.wavelength_m(slot, k));
    if lambda_1 == 0.0 || lambda_k == 0.0 {
        return corrected;
    }

    let c1 = lambda_k.powi(2) / (lambda_k.powi(2) - lambda_1.powi(2));
    let c2 = -lambda_1.powi(2) / (lambda_k.powi(2) - lambda_1.powi(2));

    if corrected.phase_m[0] != 0.0 && corrected.phase_m[k] != 0.0 {
        corrected.iono_free_phase_m = c1 * corrected.phase_m[0] + c2 * corrected.phase_m[k];
    }
    if corrected.code_m[0] != 0.0 && corrected.code_m[k] != 0.0 {
        corrected.iono_free_code_m = c1 * corrected.code_m[0] + c2 * corrected.code_m[k];
    }

    corrected
}

/// Geometry-free phase combination λ₁L₁ - λₖLₖ (m),
/// 0 when not formable.
pub(crate) fn geometry_free(cand: &Candidate, nav: &NavData, cfg: &Config) -> f64 {
    let slot = match cand.slot() {
        Some(slot) => slot,
        None => return 0.0,
    };

    let k = cfg.second_frequency(cand.sv.constellation);
    let (lambda_1, lambda_k) = (nav.wavelength_m(slot, 0), nav.wavelength_m(slot, k));

    let obs = &cand.observation;
    if lambda_1 == 0.0 || lambda_k == 0.0 || obs.phase_cycles[0] == 0.0 || obs.phase_cycles[k] == 0.0
    {
        return 0.0;
    }

    lambda_1 * obs.phase_cycles[0] - lambda_k * obs.phase_cycles[k]
}

/// Melbourne-Wübbena linear combination (m): wide-lane phase minus
/// narrow-lane code. 0 when not formable.
pub(crate) fn melbourne_wubbena(cand: &Candidate, nav: &NavData, cfg: &Config) -> f64 {
    let slot = match cand.slot() {
        Some(slot) => slot,
        None => return 0.0,
    };

    let k = cfg.second_frequency(cand.sv.constellation);
    let (lambda_1, lambda_k) = (nav.wavelength_m(slot, 0), nav.wavelength_m(slot, k));

    let obs = &cand.observation;
    if lambda_1 == 0.0
        || lambda_k == 0.0
        || obs.phase_cycles[0] == 0.0
        || obs.phase_cycles[k] == 0.0
        || obs.pseudo_range_m[0] == 0.0
        || obs.pseudo_range_m[k] == 0.0
    {
        return 0.0;
    }

    lambda_1 * lambda_k * (obs.phase_cycles[0] - obs.phase_cycles[k]) / (lambda_k - lambda_1)
        - (lambda_k * obs.pseudo_range_m[0] + lambda_1 * obs.pseudo_range_m[k])
            / (lambda_1 + lambda_k)
}

/// Wide-lane wavelength λ₁λₖ/(λₖ-λ₁) (m) of this satellite's pairing.
pub(crate) fn wide_lane_wavelength(cand: &Candidate, nav: &NavData, cfg: &Config) -> f64 {
    let slot = match cand.slot() {
        Some(slot) => slot,
        None => return 0.0,
    };

    let k = cfg.second_frequency(cand.sv.constellation);
    let (lambda_1, lambda_k) = (nav.wavelength_m(slot, 0), nav.wavelength_m(slot, k));
    if lambda_1 == 0.0 || lambda_k == 0.0 {
        return 0.0;
    }

    lambda_1 * lambda_k / (lambda_k - lambda_1)
}

/// BDS-2 satellite category, deciding the multipath column group.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bds2Type {
    Igso,
    MeoGeo,
}

/// BDS-2 fleet layout by PRN. BDS-3 satellites (PRN >= 19 here)
/// do not exhibit the systematic code bias.
fn bds2_type(prn: u8) -> Option<Bds2Type> {
    match prn {
        1..=5 | 18 => Some(Bds2Type::MeoGeo), // GEO
        6..=10 | 13 | 16 => Some(Bds2Type::Igso),
        11 | 12 | 14 => Some(Bds2Type::MeoGeo), // MEO
        _ => None,
    }
}

/// Elevation-dependent BDS-2 code multipath corrections (m) for
/// B1/B2/B3, linearly interpolated within 10° elevation bins.
/// Returns zeros for anything that is not a BDS-2 satellite.
pub(crate) fn bds2_multipath(cand: &Candidate, elevation_rad: f64) -> [f64; NFREQ] {
    // IGSO columns 0..3, MEO/GEO columns 3..6
    const COEF: [[f64; 6]; 10] = [
        [-0.55, -0.71, -0.27, -0.47, -0.40, -0.22],
        [-0.40, -0.36, -0.23, -0.38, -0.31, -0.15],
        [-0.34, -0.33, -0.21, -0.32, -0.26, -0.13],
        [-0.23, -0.19, -0.15, -0.23, -0.18, -0.10],
        [-0.15, -0.14, -0.11, -0.11, -0.06, -0.04],
        [-0.04, -0.03, -0.04, 0.06, 0.09, 0.05],
        [0.09, 0.08, 0.05, 0.34, 0.28, 0.14],
        [0.19, 0.17, 0.14, 0.69, 0.48, 0.27],
        [0.27, 0.24, 0.19, 0.97, 0.64, 0.36],
        [0.35, 0.33, 0.32, 1.05, 0.69, 0.47],
    ];

    let mut corrections = [0.0; NFREQ];

    if cand.sv.constellation != Constellation::BeiDou {
        return corrections;
    }
    let group = match bds2_type(cand.sv.prn) {
        Some(Bds2Type::Igso) => 0,
        Some(Bds2Type::MeoGeo) => 3,
        None => return corrections,
    };

    let elevation_deg = elevation_rad.to_degrees();

    for (f, correction) in corrections.iter_mut().enumerate() {
        *correction = if elevation_deg <= 0.0 {
            COEF[0][group + f]
        } else if elevation_deg >= 90.0 {
            COEF[9][group + f]
        } else {
            let bin = (elevation_deg / 10.0) as usize;
            let upper = (bin + 1).min(9);
            let alpha = (elevation_deg - bin as f64 * 10.0) / 10.0;
            COEF[bin][group + f] + alpha * (COEF[upper][group + f] - COEF[bin][group + f])
        };
    }

    corrections
}
