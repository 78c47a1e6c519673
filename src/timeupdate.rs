//! Temporal update of the filter states
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::{
    bias::tropo::wide_area_correction,
    cfg::{ArMode, Config, IonoOpt, Mode, TropOpt},
    constants::{
        NSYS, SPEED_OF_LIGHT_M_S, VAR_ACC, VAR_BIAS, VAR_CLK, VAR_DCB, VAR_GRA, VAR_IONO, VAR_POS,
        VAR_VEL,
    },
    correction::corrected_measurements,
    geodesy::{enu_cov_to_ecef, Geodetic},
    navdata::NavData,
    observation::EpochInput,
    slip::detect_slips,
    state::{satellite::MAX_SAT, FilterState, SatelliteState, StateIndexer},
};

use std::f64::consts::FRAC_PI_2;

/// Propagates state and covariance from the previous epoch:
/// position dynamics, white-noise clocks, random-walk atmosphere,
/// constant DCB and carrier biases with slip-driven reinitialization.
pub(crate) fn time_update(
    cfg: &Config,
    ix: &StateIndexer,
    state: &mut FilterState,
    ssat: &mut [SatelliteState],
    input: &EpochInput,
    nav: &NavData,
    tt_s: f64,
) {
    update_position(cfg, state, input, tt_s);
    update_clocks(ix, state, input);

    if matches!(cfg.tropo, TropOpt::Estimate | TropOpt::EstimateWithGradients) {
        update_troposphere(cfg, ix, state, input, tt_s);
    }
    if cfg.iono == IonoOpt::Estimate {
        update_ionosphere(cfg, ix, state, ssat, input, nav, tt_s);
    }
    if cfg.nf >= 3 {
        update_receiver_dcb(ix, state);
    }

    update_carrier_biases(cfg, ix, state, ssat, input, nav, tt_s);
}

/// Position, velocity and acceleration states.
fn update_position(cfg: &Config, state: &mut FilterState, input: &EpochInput, tt_s: f64) {
    // receiver pinned to ground truth
    if cfg.mode == Mode::Fixed {
        let (x0, y0, z0) = cfg.fixed_position_ecef_m;
        for (i, value) in [x0, y0, z0].into_iter().enumerate() {
            state.init_param(i, value, 1E-8);
        }
        return;
    }

    // first epoch: seed from the single point solution
    if state.x.rows(0, 3).norm() <= 0.0 {
        for i in 0..3 {
            state.init_param(i, input.apriori_position_ecef_m[i], VAR_POS);
        }
        if cfg.dynamics {
            for i in 3..6 {
                state.init_param(i, input.apriori_velocity_ecef_m_s[i - 3], VAR_VEL);
            }
            for i in 6..9 {
                state.init_param(i, 1E-6, VAR_ACC);
            }
        }
    }

    if cfg.mode == Mode::Static {
        for i in 0..3 {
            state.add_variance(i, cfg.process_noise[5].powi(2) * tt_s.abs());
        }
        return;
    }

    // kinematic without dynamics: the position memory is the
    // single point solution, refreshed every epoch
    if !cfg.dynamics {
        for i in 0..3 {
            state.init_param(i, input.apriori_position_ecef_m[i], VAR_POS);
        }
        return;
    }

    // full dynamics: propagate the active states with the
    // position/velocity/acceleration transition
    let nx = state.nx();
    let active = (0..nx).filter(|i| state.is_active(*i)).collect::<Vec<_>>();
    let na = active.len();

    if na < 9 {
        return;
    }

    let mut f = DMatrix::<f64>::identity(na, na);
    for i in 0..6 {
        f[(i, i + 3)] = tt_s;
    }
    for i in 0..3 {
        f[(i, i + 6)] = tt_s.powi(2) / 2.0;
    }

    let mut x = DVector::<f64>::zeros(na);
    let mut p = DMatrix::<f64>::zeros(na, na);

    for (i, gi) in active.iter().enumerate() {
        x[i] = state.x[*gi];
        for (j, gj) in active.iter().enumerate() {
            p[(i, j)] = state.p[(*gi, *gj)];
        }
    }

    let x = &f * x;
    let p = &f * p * f.transpose();

    for (i, gi) in active.iter().enumerate() {
        state.x[*gi] = x[i];
        for (j, gj) in active.iter().enumerate() {
            state.p[(*gi, *gj)] = p[(i, j)];
        }
    }

    // process noise enters on the acceleration states, rotated
    // from local ENU into ECEF
    let q_enu = Matrix3::from_diagonal(&Vector3::new(
        cfg.process_noise[3].powi(2) * tt_s.abs(),
        cfg.process_noise[3].powi(2) * tt_s.abs(),
        cfg.process_noise[4].powi(2) * tt_s.abs(),
    ));

    let geo = Geodetic::from_ecef_m(&Vector3::new(state.x[0], state.x[1], state.x[2]));
    let q_ecef = enu_cov_to_ecef(&geo, &q_enu);

    for i in 0..3 {
        for j in 0..3 {
            state.p[(i + 6, j + 6)] += q_ecef[(i, j)];
        }
    }
}

/// Receiver clocks are white noise: reinitialized every epoch from
/// the single point solution.
fn update_clocks(ix: &StateIndexer, state: &mut FilterState, input: &EpochInput) {
    for sys in 0..NSYS {
        let dtr = if sys == 0 {
            input.apriori_clock_s[0]
        } else {
            input.apriori_clock_s[0] + input.apriori_clock_s[sys]
        };
        state.init_param(ix.clock(sys), SPEED_OF_LIGHT_M_S * dtr, VAR_CLK);
    }
}

/// Zenith wet delay and optional gradients.
fn update_troposphere(
    cfg: &Config,
    ix: &StateIndexer,
    state: &mut FilterState,
    input: &EpochInput,
    tt_s: f64,
) {
    let i = ix.tropo();

    if state.x[i] == 0.0 {
        let geo = Geodetic::from_ecef_m(&input.apriori_position_ecef_m);
        let (ztd, var) = wide_area_correction(input.time, &geo, FRAC_PI_2);
        state.init_param(i, ztd, var);

        if cfg.tropo == TropOpt::EstimateWithGradients {
            for j in i + 1..i + 3 {
                state.init_param(j, 1E-6, VAR_GRA);
            }
        }
    } else {
        state.add_variance(i, cfg.process_noise[2].powi(2) * tt_s.abs());

        if cfg.tropo == TropOpt::EstimateWithGradients {
            for j in i + 1..i + 3 {
                state.add_variance(j, (cfg.process_noise[2] * 0.1).powi(2) * tt_s.abs());
            }
        }
    }
}

/// Per-satellite slant ionospheric delays.
fn update_ionosphere(
    cfg: &Config,
    ix: &StateIndexer,
    state: &mut FilterState,
    ssat: &mut [SatelliteState],
    input: &EpochInput,
    nav: &NavData,
    tt_s: f64,
) {
    let gap_resion = cfg.gap_resion();

    // long outage: the delay is stale, drop it
    for slot in 0..MAX_SAT {
        let j = ix.iono(slot);
        if state.x[j] != 0.0 && ssat[slot].outage[0] > gap_resion {
            state.init_param(j, 0.0, 0.0);
        }
    }

    for cand in input.candidates.iter() {
        let slot = match cand.slot() {
            Some(slot) => slot,
            None => continue,
        };
        let j = ix.iono(slot);

        if state.x[j] == 0.0 {
            // seed from the raw dual-frequency code divergence
            let k = cfg.second_frequency(cand.sv.constellation);
            let (lambda_1, lambda_k) = (nav.wavelength_m(slot, 0), nav.wavelength_m(slot, k));
            let (p_1, p_k) = (
                cand.observation.pseudo_range_m[0],
                cand.observation.pseudo_range_m[k],
            );

            if p_1 == 0.0 || p_k == 0.0 || lambda_1 == 0.0 || lambda_k == 0.0 {
                continue;
            }

            let iono = (p_1 - p_k) / (1.0 - (lambda_k / lambda_1).powi(2));
            state.init_param(j, iono, VAR_IONO);
        } else {
            let sin_el = ssat[slot].elevation_rad.max(5.0_f64.to_radians()).sin();
            state.add_variance(j, (cfg.process_noise[1] / sin_el).powi(2) * tt_s.abs());
        }
    }
}

/// Third-frequency receiver DCB, constant once initialized.
fn update_receiver_dcb(ix: &StateIndexer, state: &mut FilterState) {
    let i = ix.dcb();
    if state.x[i] == 0.0 {
        state.init_param(i, 1E-6, VAR_DCB);
    }
}

/// True when the maximal absolute offset is explained by a single
/// outlying satellite rather than a common receiver event.
fn caused_by_one_satellite(offsets: &[f64]) -> bool {
    if offsets.is_empty() {
        return false;
    }

    let mut max = 0.0_f64;
    let mut sum = 0.0_f64;
    for offset in offsets.iter() {
        max = max.max(offset.abs());
        sum += offset.abs();
    }

    max > 2.0 * sum / offsets.len() as f64
}

/// Carrier phase biases: outage/slip-driven reinitialization,
/// random-walk inflation and the phase-code coherency watchdog.
fn update_carrier_biases(
    cfg: &Config,
    ix: &StateIndexer,
    state: &mut FilterState,
    ssat: &mut [SatelliteState],
    input: &EpochInput,
    nav: &NavData,
    tt_s: f64,
) {
    // precise clock products jump at day boundaries
    let clock_jump = if cfg.handle_day_boundary {
        let tow = input.time.to_gpst_seconds().rem_euclid(604800.0);
        ((tow * 10.0).round() as i64).rem_euclid(864000) == 0
    } else {
        false
    };

    if clock_jump {
        warn!("{} - day boundary clock jump", input.time);
    }

    for sat in ssat.iter_mut() {
        sat.clear_slips(cfg.nf);
    }

    detect_slips(ssat, &input.candidates, nav, cfg);

    let n = input.candidates.len();

    for f in 0..ix.nf() {
        // expire outage counters
        for slot in 0..MAX_SAT {
            ssat[slot].outage[f] += 1;
            if ssat[slot].outage[f] > cfg.max_outage
                || cfg.ar_mode == ArMode::Instantaneous
                || clock_jump
            {
                state.init_param(ix.bias(slot, f), 0.0, 0.0);
            }
        }

        let mut bias = vec![0.0; n];
        let mut slip = vec![false; n];
        let mut offsets = Vec::with_capacity(n);

        for (i, cand) in input.candidates.iter().enumerate() {
            let slot = match cand.slot() {
                Some(slot) => slot,
                None => continue,
            };
            let j = ix.bias(slot, f);

            let corrected = corrected_measurements(
                cand,
                nav,
                cfg,
                &[0.0; crate::constants::NFREQ],
                &[0.0; crate::constants::NFREQ],
                0.0,
                &[0.0; crate::constants::NFREQ],
            );

            if cfg.iono == IonoOpt::IonoFree {
                if corrected.iono_free_phase_m != 0.0 && corrected.iono_free_code_m != 0.0 {
                    bias[i] = corrected.iono_free_phase_m - corrected.iono_free_code_m;
                }
                slip[i] = (ssat[slot].slip[0] & 1) == 1 || (ssat[slot].slip[1] & 1) == 1;
            } else if corrected.phase_m[f] != 0.0 && corrected.code_m[f] != 0.0 {
                slip[i] = (ssat[slot].slip[f] & 1) == 1;

                let k = cfg.second_frequency(cand.sv.constellation);
                let (lambda_1, lambda_k) = (nav.wavelength_m(slot, 0), nav.wavelength_m(slot, k));
                let lambda_f = nav.wavelength_m(slot, f);
                let (p_1, p_k) = (
                    cand.observation.pseudo_range_m[0],
                    cand.observation.pseudo_range_m[k],
                );

                let iono = if p_1 == 0.0
                    || p_k == 0.0
                    || lambda_1 == 0.0
                    || lambda_k == 0.0
                    || lambda_f == 0.0
                {
                    0.0
                } else {
                    (p_1 - p_k) / (1.0 - (lambda_k / lambda_1).powi(2))
                };

                bias[i] = corrected.phase_m[f] - corrected.code_m[f]
                    + 2.0 * iono * (lambda_f / lambda_1).powi(2);
            }

            if state.x[j] != 0.0 && !slip[i] && bias[i] != 0.0 {
                offsets.push(bias[i] - state.x[j]);
            }
        }

        // phase-code jump: a common offset over all satellites is a
        // receiver clock event, absorbed into every active bias
        let count = offsets.len();
        if count >= 2 {
            let mean = offsets.iter().sum::<f64>() / count as f64;

            if mean.abs() > 0.0005 * SPEED_OF_LIGHT_M_S && !caused_by_one_satellite(&offsets) {
                for slot in 0..MAX_SAT {
                    let j = ix.bias(slot, f);
                    if state.x[j] != 0.0 {
                        state.x[j] += mean;
                    }
                }
                warn!(
                    "{} - phase-code jump corrected: n={} dt={:.9}s",
                    input.time,
                    count,
                    mean / SPEED_OF_LIGHT_M_S
                );
            }
        }

        for (i, cand) in input.candidates.iter().enumerate() {
            let slot = match cand.slot() {
                Some(slot) => slot,
                None => continue,
            };
            let j = ix.bias(slot, f);

            state.add_variance(j, cfg.process_noise[0].powi(2) * tt_s.abs());

            if bias[i] == 0.0 || (state.x[j] != 0.0 && !slip[i]) {
                continue;
            }

            // reinitialize on slip or fresh arc
            state.init_param(j, bias[i], VAR_BIAS);
            ssat[slot].pair_flags.fill(false);

            debug!("{} - {} L{} bias={:.3}", input.time, cand.sv, f + 1, bias[i]);
        }
    }
}
