//! Cycle slip detection: loss-of-lock flags, geometry-free jumps,
//! Melbourne-Wübbena jumps with running statistics.
use log::{debug, warn};

use crate::{
    cfg::Config,
    constants::{MW_ARC_MAX, MW_CS_MIN, MW_GAP_MAX, NFREQ},
    correction::{geometry_free, melbourne_wubbena, wide_lane_wavelength},
    navdata::NavData,
    observation::Candidate,
    state::satellite::SatelliteState,
};

/// Runs the three independent detectors over this epoch's proposal,
/// OR-ing their verdicts into the per-satellite slip bits.
/// Melbourne-Wübbena runs before geometry-free.
pub(crate) fn detect_slips(
    ssat: &mut [SatelliteState],
    candidates: &[Candidate],
    nav: &NavData,
    cfg: &Config,
) {
    detect_lli(ssat, candidates, cfg);
    detect_mw(ssat, candidates, nav, cfg);
    detect_gf(ssat, candidates, nav, cfg);
}

/// Cycle slips flagged by the receiver's loss-of-lock indicator.
fn detect_lli(ssat: &mut [SatelliteState], candidates: &[Candidate], cfg: &Config) {
    for cand in candidates.iter() {
        let slot = match cand.slot() {
            Some(slot) => slot,
            None => continue,
        };

        for f in 0..cfg.nf.min(NFREQ) {
            if cand.observation.phase_cycles[f] == 0.0 || (cand.observation.lli[f] & 3) == 0 {
                continue;
            }

            warn!(
                "{} - {} slip detected on L{} (lli)",
                cand.t,
                cand.sv,
                f + 1
            );

            ssat[slot].slip[f] |= 1;
            ssat[slot].slip_lli[f] = true;
        }
    }
}

/// Cycle slips flagged by a geometry-free phase jump. The
/// combination is blind to which frequency slipped: all of them
/// are marked.
fn detect_gf(ssat: &mut [SatelliteState], candidates: &[Candidate], nav: &NavData, cfg: &Config) {
    for cand in candidates.iter() {
        let slot = match cand.slot() {
            Some(slot) => slot,
            None => continue,
        };

        let g1 = geometry_free(cand, nav, cfg);
        if g1 == 0.0 {
            continue;
        }

        let g0 = ssat[slot].gf;
        ssat[slot].gf = g1;

        debug!("{} - {} gf: {:.3} -> {:.3}", cand.t, cand.sv, g0, g1);

        if g0 != 0.0 && (g1 - g0).abs() > cfg.slip_threshold_m {
            warn!(
                "{} - {} slip detected (gf: {:.3} -> {:.3})",
                cand.t, cand.sv, g0, g1
            );

            for f in 0..cfg.nf.min(NFREQ) {
                ssat[slot].slip[f] |= 1;
                ssat[slot].slip_gf[f] = true;
            }
        }
    }
}

/// Cycle slips flagged by a Melbourne-Wübbena jump, screened
/// against per-satellite running mean and second moment.
fn detect_mw(ssat: &mut [SatelliteState], candidates: &[Candidate], nav: &NavData, cfg: &Config) {
    let nf = cfg.nf.min(NFREQ);

    for cand in candidates.iter() {
        let slot = match cand.slot() {
            Some(slot) => slot,
            None => continue,
        };

        let mw1 = melbourne_wubbena(cand, nav, cfg);
        if mw1 == 0.0 {
            continue;
        }

        let half_wide_lane = wide_lane_wavelength(cand, nav, cfg).abs() / 2.0;

        let mw0 = ssat[slot].mw;
        ssat[slot].mw = mw1;

        // first sample of an arc
        if ssat[slot].mw_arc == 0 || mw0 == 0.0 {
            ssat[slot].reset_mw_arc(mw1, half_wide_lane);
            continue;
        }

        // another detector already flagged this arc: restart statistics
        if (ssat[slot].slip[0] & 1) == 1 || (ssat[slot].slip[1] & 1) == 1 {
            for f in 0..nf {
                ssat[slot].slip[f] |= 1;
            }
            ssat[slot].reset_mw_arc(mw1, half_wide_lane);
            continue;
        }

        // epoch-to-epoch gap
        if (mw1 - mw0).abs() > MW_GAP_MAX {
            warn!(
                "{} - {} slip detected (mw gap: {:.3} -> {:.3})",
                cand.t, cand.sv, mw0, mw1
            );

            for f in 0..nf {
                ssat[slot].slip[f] |= 1;
                ssat[slot].slip_mw[f] = true;
            }
            ssat[slot].reset_mw_arc(mw1, half_wide_lane);
            continue;
        }

        let mean = ssat[slot].mw_mean;
        let second_moment = ssat[slot].mw_var;

        // jump against the arc statistics, once they are settled
        if ssat[slot].mw_arc >= 4 {
            let threshold = MW_GAP_MAX.min((4.0 * second_moment.sqrt()).max(MW_CS_MIN));

            if (mw1 - mean).abs() > threshold {
                warn!(
                    "{} - {} slip detected (mw: {:.3} mean: {:.3} thres: {:.3})",
                    cand.t, cand.sv, mw1, mean, threshold
                );

                for f in 0..nf {
                    ssat[slot].slip[f] |= 1;
                    ssat[slot].slip_mw[f] = true;
                }
                ssat[slot].reset_mw_arc(mw1, half_wide_lane);
                continue;
            }
        }

        // recursive mean and second moment update
        let n = (ssat[slot].mw_arc + 1).min(MW_ARC_MAX);

        ssat[slot].mw_mean = ((n - 1) as f64 * mean + mw1) / n as f64;
        ssat[slot].mw_var =
            ((n - 1) as f64 * second_moment + (mw1 - mean).powi(2)) / n as f64;
        ssat[slot].mw_arc = n;
    }
}

#[cfg(test)]
mod test {
    use super::detect_slips;
    use crate::{
        cfg::Config,
        constants::{MW_ARC_MAX, NFREQ},
        navdata::NavData,
        observation::{Candidate, Observation},
        prelude::Carrier,
        state::satellite::{slot, SatelliteState, MAX_SAT},
    };
    use gnss::prelude::{Constellation, SV};
    use hifitime::Epoch;

    fn dual_frequency_candidate(sv: SV, range_m: f64) -> Candidate {
        let mut obs = Observation::default();
        obs.phase_cycles[0] = range_m / Carrier::L1.wavelength();
        obs.phase_cycles[1] = range_m / Carrier::L2.wavelength();
        obs.pseudo_range_m[0] = range_m;
        obs.pseudo_range_m[1] = range_m;
        Candidate::new(sv, Epoch::from_gpst_seconds(0.0), obs)
    }

    #[test]
    fn test_lli_slip() {
        let nav = NavData::new();
        let cfg = Config::default();
        let mut ssat = vec![SatelliteState::default(); MAX_SAT];

        let sv = SV::new(Constellation::GPS, 3);
        let i = slot(sv).unwrap();

        let mut cand = dual_frequency_candidate(sv, 21.0E6);
        cand.observation.lli[1] = 1;

        detect_slips(&mut ssat, &[cand], &nav, &cfg);

        assert_eq!(ssat[i].slip[1] & 1, 1);
        assert!(ssat[i].slip_lli[1]);
        assert!(!ssat[i].slip_gf[1]);
        assert!(!ssat[i].slip_mw[1]);

        // the flagged arc resets the MW statistics
        assert_eq!(ssat[i].mw_arc, 1);
    }

    #[test]
    fn test_gf_jump_marks_all_frequencies() {
        let nav = NavData::new();
        let cfg = Config::default();
        let mut ssat = vec![SatelliteState::default(); MAX_SAT];

        let sv = SV::new(Constellation::GPS, 8);
        let i = slot(sv).unwrap();

        let cand = dual_frequency_candidate(sv, 21.0E6);
        detect_slips(&mut ssat, &[cand], &nav, &cfg);
        assert_eq!(ssat[i].slip, [0; NFREQ]);

        // 2 cycles on L1 moves GF way over the threshold
        for f in 0..cfg.nf {
            ssat[i].slip[f] = 0;
        }
        let mut slipped = dual_frequency_candidate(sv, 21.0E6);
        slipped.observation.phase_cycles[0] += 2.0;

        detect_slips(&mut ssat, &[slipped], &nav, &cfg);

        assert_eq!(ssat[i].slip[0] & 1, 1);
        assert_eq!(ssat[i].slip[1] & 1, 1);
        assert!(ssat[i].slip_gf[0] && ssat[i].slip_gf[1]);
    }

    #[test]
    fn test_mw_convergence_and_saturation() {
        let nav = NavData::new();
        let cfg = Config::default();
        let mut ssat = vec![SatelliteState::default(); MAX_SAT];

        let sv = SV::new(Constellation::GPS, 1);
        let i = slot(sv).unwrap();

        // constant observations, no slip: mean converges to the
        // measurement, arc saturates
        for _ in 0..150 {
            for f in 0..cfg.nf {
                ssat[i].slip[f] = 0;
            }
            let cand = dual_frequency_candidate(sv, 20.5E6);
            detect_slips(&mut ssat, &[cand.clone()], &nav, &cfg);

            assert_eq!(ssat[i].slip[0] & 1, 0, "spurious slip");
        }

        assert_eq!(ssat[i].mw_arc, MW_ARC_MAX);
        assert!((ssat[i].mw_mean - ssat[i].mw).abs() < 1E-9);
        assert!(ssat[i].mw_var < 1E-3);
    }

    #[test]
    fn test_mw_jump_detection() {
        let nav = NavData::new();
        let cfg = Config::default();
        let mut ssat = vec![SatelliteState::default(); MAX_SAT];

        let sv = SV::new(Constellation::GPS, 5);
        let i = slot(sv).unwrap();

        for _ in 0..10 {
            for f in 0..cfg.nf {
                ssat[i].slip[f] = 0;
            }
            detect_slips(
                &mut ssat,
                &[dual_frequency_candidate(sv, 20.5E6)],
                &nav,
                &cfg,
            );
        }

        // 2 wide-lane cycles: clearly over the settled threshold
        for f in 0..cfg.nf {
            ssat[i].slip[f] = 0;
        }
        let mut slipped = dual_frequency_candidate(sv, 20.5E6);
        slipped.observation.phase_cycles[0] += 2.0;

        detect_slips(&mut ssat, &[slipped], &nav, &cfg);

        assert_eq!(ssat[i].slip[0] & 1, 1);
        assert!(ssat[i].slip_mw[0]);
        assert_eq!(ssat[i].mw_arc, 1, "statistics restart after the slip");
    }
}
