//! Measurement model: phase and code residuals, design rows,
//! variances and outlier screening.
use gnss::prelude::Constellation;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::{
    attitude::phase_windup,
    bias::{
        iono::{klobuchar, StecCache},
        tropo::{precise_model, saastamoinen, wide_area_correction},
    },
    cfg::{Config, IonoOpt, TropOpt, WeightMode},
    constants::{
        EFACT_GLO, EFACT_GPS, EFACT_GPS_L5, EFACT_SBS, ERR_BRDCI, NFREQ, REL_HUMI,
        SPEED_OF_LIGHT_M_S, THRES_REJECT, VAR_GLO_IFB,
    },
    correction::{bds2_multipath, corrected_measurements},
    geodesy::{azimuth_elevation, geometric_range, Geodetic},
    navdata::NavData,
    observation::{Candidate, EpochInput},
    state::{FilterState, SatelliteState, StateIndexer},
};

/// Residual computation stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Stage {
    /// Before the measurement update, on the predicted state.
    Prefit,
    /// After the measurement update (iteration number, for logs).
    Postfit(usize),
    /// Validation of an ambiguity-fixed state.
    FixValidation,
}

impl Stage {
    fn is_postfit(&self) -> bool {
        !matches!(self, Self::Prefit)
    }
}

/// Stacked residuals, design matrix and measurement covariance
/// for one evaluation point.
pub(crate) struct ResidualOutput {
    /// Innovations (m), one per accepted measurement
    pub v: DVector<f64>,
    /// Design matrix, one row per measurement
    pub h: DMatrix<f64>,
    /// Measurement covariance (diagonal)
    pub r: DMatrix<f64>,
    /// Number of stacked measurements
    pub nv: usize,
    /// Post-fit only: no residual exceeded the rejection threshold
    pub accepted: bool,
}

/// Per-measurement variance: elevation or SNR weighted, scaled for
/// code observations, constellation and the iono-free combination.
pub(crate) fn variance(
    cfg: &Config,
    constellation: Constellation,
    elevation_rad: f64,
    snr_dbhz: f64,
    freq: usize,
    is_code: bool,
) -> f64 {
    let mut fact = if is_code {
        cfg.eratio[if freq == 0 { 0 } else { 1 }]
    } else {
        1.0
    };

    fact *= match constellation {
        Constellation::Glonass => EFACT_GLO,
        c if c.is_sbas() => EFACT_SBS,
        _ => EFACT_GPS,
    };

    if matches!(constellation, Constellation::GPS | Constellation::QZSS) && freq == 2 {
        fact *= EFACT_GPS_L5;
    }

    let a = fact * cfg.error_model[1];
    let b = fact * cfg.error_model[2];
    let snr_max = cfg.error_model[5];

    // the iono-free combination amplifies noise roughly 3x
    let combination = if cfg.iono == IonoOpt::IonoFree {
        9.0
    } else {
        1.0
    };

    match cfg.weight {
        WeightMode::Elevation => {
            combination * (a.powi(2) + (b / elevation_rad.sin()).powi(2))
        },
        WeightMode::Snr => {
            combination * a.powi(2) * 10.0_f64.powf(0.1 * (snr_max - snr_dbhz).max(0.0))
        },
    }
}

/// Tropospheric slant delay (m), variance and design partials for
/// the configured model. None excludes the satellite.
fn tropo_delay(
    cfg: &Config,
    ix: &StateIndexer,
    x: &DVector<f64>,
    input: &EpochInput,
    position: &Geodetic,
    azimuth_rad: f64,
    elevation_rad: f64,
    nav: &NavData,
    dtdx: &mut [f64; 3],
) -> Option<(f64, f64)> {
    *dtdx = [0.0; 3];

    match cfg.tropo {
        TropOpt::Off => Some((0.0, 0.0)),
        TropOpt::Saastamoinen => Some((
            saastamoinen(position, elevation_rad, REL_HUMI),
            crate::constants::ERR_SAAS.powi(2),
        )),
        TropOpt::Sbas => Some(wide_area_correction(input.time, position, elevation_rad)),
        TropOpt::Estimate | TropOpt::EstimateWithGradients => {
            let n = if cfg.tropo == TropOpt::EstimateWithGradients {
                3
            } else {
                1
            };
            let mut tropo_states = [0.0; 3];
            for (i, state) in tropo_states.iter_mut().take(n).enumerate() {
                *state = x[ix.tropo() + i];
            }
            Some(precise_model(
                input.time,
                position,
                azimuth_rad,
                elevation_rad,
                &tropo_states[..n],
                dtdx,
            ))
        },
        TropOpt::Ztd => {
            let corrections = nav.corrections.as_ref()?;
            let (values, stds) = corrections.tropo_at(input.time)?;
            if values[0] == 0.0 {
                return None;
            }
            let (delay, _) = precise_model(
                input.time,
                position,
                azimuth_rad,
                elevation_rad,
                values,
                dtdx,
            );
            Some((delay, (dtdx[0] * stds[0]).powi(2)))
        },
    }
}

/// First-frequency ionospheric slant delay (m) and variance for the
/// configured model. None excludes the satellite.
#[allow(clippy::too_many_arguments)]
fn iono_delay(
    cfg: &Config,
    ix: &StateIndexer,
    x: &DVector<f64>,
    input: &EpochInput,
    position: &Geodetic,
    azimuth_rad: f64,
    elevation_rad: f64,
    slot: usize,
    nav: &NavData,
    stec_cache: &mut StecCache,
) -> Option<(f64, f64)> {
    match cfg.iono {
        IonoOpt::Off | IonoOpt::IonoFree => Some((0.0, 0.0)),
        IonoOpt::Broadcast => {
            let delay = klobuchar(
                input.time,
                nav.klobuchar,
                position,
                azimuth_rad,
                elevation_rad,
            );
            Some((delay, (delay * ERR_BRDCI).powi(2)))
        },
        IonoOpt::Estimate => Some((x[ix.iono(slot)], 0.0)),
        IonoOpt::TecMap => {
            nav.tec_model
                .as_ref()?
                .delay(input.time, position, azimuth_rad, elevation_rad)
        },
        IonoOpt::Sbas => {
            nav.sbas_iono
                .as_ref()?
                .delay(input.time, position, azimuth_rad, elevation_rad)
        },
        IonoOpt::Stec => stec_cache.lookup(input.time, nav, slot),
    }
}

/// Assembles phase and code residuals for every usable satellite
/// and frequency, stacked {L1, P1, L2, P2, ...} per satellite.
///
/// Pre-fit stage: innovation screening drops whole satellites.
/// Post-fit stages: the single worst residual beyond 4 sigma is
/// excluded and `accepted` turns false, asking for re-iteration.
#[allow(clippy::too_many_arguments)]
pub(crate) fn residuals(
    stage: Stage,
    cfg: &Config,
    ix: &StateIndexer,
    filter: &FilterState,
    x: &DVector<f64>,
    nav: &NavData,
    input: &EpochInput,
    candidates: &[Candidate],
    tide_displacement_m: &Vector3<f64>,
    excluded: &mut [bool],
    ssat: &mut [SatelliteState],
    stec_cache: &mut StecCache,
) -> ResidualOutput {
    let nx = ix.nx();
    let nf = ix.nf();

    for sat in ssat.iter_mut() {
        sat.vsat = [false; NFREQ];
    }

    let receiver_m = Vector3::new(x[0], x[1], x[2]) + tide_displacement_m;
    let position = Geodetic::from_ecef_m(&receiver_m);

    let mut v = Vec::<f64>::new();
    let mut h = Vec::<f64>::new();
    let mut var = Vec::<f64>::new();

    // worst post-fit offenders: (candidate, j, residual)
    let mut outliers = Vec::<(usize, usize, f64)>::new();
    let mut accepted = true;

    for (i, cand) in candidates.iter().enumerate() {
        let slot = match cand.slot() {
            Some(slot) => slot,
            None => continue,
        };

        let (range_m, e) = match geometric_range(&cand.position_ecef_m, &receiver_m) {
            Some(geometry) => geometry,
            None => {
                excluded[i] = true;
                continue;
            },
        };

        let (azimuth_rad, elevation_rad) = azimuth_elevation(&position, &e);
        ssat[slot].azimuth_rad = azimuth_rad;
        ssat[slot].elevation_rad = elevation_rad;

        if elevation_rad < cfg.min_elevation_rad {
            excluded[i] = true;
            continue;
        }

        if cand.health != 0 || cfg.excluded_sv.contains(&cand.sv) || excluded[i] {
            excluded[i] = true;
            continue;
        }

        // atmosphere along this line of sight
        let mut dtdx = [0.0; 3];
        let (tropo_m, _tropo_var) = match tropo_delay(
            cfg,
            ix,
            x,
            input,
            &position,
            azimuth_rad,
            elevation_rad,
            nav,
            &mut dtdx,
        ) {
            Some(model) => model,
            None => continue,
        };

        let (iono_m, iono_var) = match iono_delay(
            cfg,
            ix,
            x,
            input,
            &position,
            azimuth_rad,
            elevation_rad,
            slot,
            nav,
            stec_cache,
        ) {
            Some(model) => model,
            None => continue,
        };

        ssat[slot].iono_delay_m = iono_m;
        ssat[slot].iono_variance_m2 = iono_var;

        // antenna models
        let dant_sat = if cfg.sat_antenna_pcv {
            let nadir = nadir_angle(&cand.position_ecef_m, &receiver_m);
            nav.satellite_antenna[slot].nadir_corrections(nadir)
        } else {
            [0.0; NFREQ]
        };

        let dant_rec = nav.receiver_antenna.receiver_corrections(
            &nav.receiver_arp_enu_m,
            azimuth_rad,
            elevation_rad,
            cfg.rec_antenna_pcv,
        );

        // phase windup
        if cfg.phase_windup {
            let mut windup = ssat[slot].phase_windup_cycles;
            if !phase_windup(
                &cand.position_ecef_m,
                &cand.velocity_ecef_m_s,
                &receiver_m,
                &input.sun_position_ecef_m,
                &mut windup,
            ) {
                continue;
            }
            ssat[slot].phase_windup_cycles = windup;
        }

        let multipath = bds2_multipath(cand, elevation_rad);

        let corrected = corrected_measurements(
            cand,
            nav,
            cfg,
            &dant_rec,
            &dant_sat,
            ssat[slot].phase_windup_cycles,
            &multipath,
        );

        let lambda_1 = nav.wavelength_m(slot, 0);
        if lambda_1 == 0.0 {
            continue;
        }

        // stack phase and code residuals {L1, P1, L2, P2, ...}
        for j in 0..2 * nf {
            let freq = j / 2;
            let is_code = j % 2 == 1;

            let lambda = nav.wavelength_m(slot, freq);
            if lambda == 0.0 {
                continue;
            }

            let y = if cfg.iono == IonoOpt::IonoFree {
                if is_code {
                    corrected.iono_free_code_m
                } else {
                    corrected.iono_free_phase_m
                }
            } else if is_code {
                corrected.code_m[freq]
            } else {
                corrected.phase_m[freq]
            };
            if y == 0.0 {
                continue;
            }

            let mut dcb = 0.0;
            if cfg.iono != IonoOpt::IonoFree && freq == 1 {
                // receiver P2 DCB
                let rcv = if cand.sv.constellation == Constellation::Glonass {
                    1
                } else {
                    0
                };
                dcb = -nav.receiver_dcb_m[rcv];
            }

            let iono_coef =
                (lambda / lambda_1).powi(2) * if is_code { 1.0 } else { -1.0 };

            let mut row = vec![0.0; nx];
            for (axis, e_axis) in e.iter().enumerate() {
                row[axis] = -e_axis;
            }

            // receiver clock
            let sys = Config::clock_state(cand.sv.constellation);
            let cdtr = x[ix.clock(sys)];
            row[ix.clock(sys)] = 1.0;

            if matches!(cfg.tropo, TropOpt::Estimate | TropOpt::EstimateWithGradients) {
                let n = if cfg.tropo == TropOpt::EstimateWithGradients {
                    3
                } else {
                    1
                };
                for (k, partial) in dtdx.iter().take(n).enumerate() {
                    row[ix.tropo() + k] = *partial;
                }
            }

            if cfg.iono == IonoOpt::Estimate {
                if filter.x[ix.iono(slot)] == 0.0 {
                    continue;
                }
                row[ix.iono(slot)] = iono_coef;
            }

            // third-frequency receiver DCB rides on its code observation
            let mut dcb_state = 0.0;
            if ix.nd() > 0 && freq == 2 && is_code {
                dcb_state = x[ix.dcb()];
                row[ix.dcb()] = 1.0;
            }

            // carrier bias
            let mut bias = 0.0;
            if !is_code {
                bias = x[ix.bias(slot, freq)];
                if bias == 0.0 {
                    continue;
                }
                row[ix.bias(slot, freq)] = 1.0;
            }

            let residual = y
                - (range_m + cdtr - SPEED_OF_LIGHT_M_S * cand.clock_bias_s
                    + tropo_m
                    + iono_coef * iono_m
                    + dcb
                    + dcb_state
                    + bias);

            if is_code {
                ssat[slot].code_residual_m[freq] = residual;
            } else {
                ssat[slot].phase_residual_m[freq] = residual;
            }

            let mut variance_m2 = variance(
                cfg,
                cand.sv.constellation,
                elevation_rad,
                cand.observation.snr_dbhz[freq],
                freq,
                is_code,
            );
            if cand.sv.constellation == Constellation::Glonass && is_code {
                variance_m2 += VAR_GLO_IFB;
            }

            // reject satellite by pre-fit innovation
            if !stage.is_postfit() && cfg.max_innovation_m > 0.0 && residual.abs() > cfg.max_innovation_m
            {
                warn!(
                    "{} - {} {}{} outlier rejected, prefit res: {:.3}",
                    input.time,
                    cand.sv,
                    if is_code { "P" } else { "L" },
                    freq + 1,
                    residual,
                );
                excluded[i] = true;
                ssat[slot].reject_count[j % 2] += 1;
                continue;
            }

            // record large post-fit residuals
            if stage.is_postfit() && residual.abs() > variance_m2.sqrt() * THRES_REJECT {
                outliers.push((i, j, residual));
            }

            if !is_code {
                ssat[slot].vsat[freq] = true;
            }

            debug!(
                "{} - {} {}{} res: {:.4} sig: {:.4} el: {:.1}",
                input.time,
                cand.sv,
                if is_code { "P" } else { "L" },
                freq + 1,
                residual,
                variance_m2.sqrt(),
                elevation_rad.to_degrees(),
            );

            v.push(residual);
            h.extend_from_slice(&row);
            var.push(variance_m2);
        }
    }

    // exclude the single worst post-fit offender and re-iterate
    if stage.is_postfit() && !outliers.is_empty() {
        let mut worst = 0;
        for (k, outlier) in outliers.iter().enumerate() {
            if outlier.2.abs() > outliers[worst].2.abs() {
                worst = k;
            }
        }

        let (i, j, residual) = outliers[worst];
        let cand = &candidates[i];

        warn!(
            "{} - {} {}{} outlier rejected, postfit res: {:.3}",
            input.time,
            cand.sv,
            if j % 2 == 1 { "P" } else { "L" },
            j / 2 + 1,
            residual,
        );

        excluded[i] = true;
        if let Some(slot) = cand.slot() {
            ssat[slot].reject_count[j % 2] += 1;
        }
        accepted = false;
    }

    // constrain estimated states to external correction products
    constrain_to_corrections(
        cfg,
        ix,
        x,
        nav,
        input,
        candidates,
        excluded,
        &mut v,
        &mut h,
        &mut var,
    );

    let nv = v.len();

    let h = DMatrix::from_row_slice(nv, nx, &h);
    let r = DMatrix::from_diagonal(&DVector::from_vec(var));
    let v = DVector::from_vec(v);

    ResidualOutput {
        v,
        h,
        r,
        nv,
        accepted,
    }
}

/// Nadir angle at the satellite, receiver direction vs geocenter.
fn nadir_angle(satellite_m: &Vector3<f64>, receiver_m: &Vector3<f64>) -> f64 {
    let to_receiver = receiver_m - satellite_m;
    let to_geocenter = -satellite_m;

    let cos_nadir = to_receiver.dot(&to_geocenter)
        / (to_receiver.norm() * to_geocenter.norm());

    cos_nadir.clamp(-1.0, 1.0).acos()
}

/// Pseudo measurements pinning estimated troposphere/ionosphere
/// states to external correction products, when available.
#[allow(clippy::too_many_arguments)]
fn constrain_to_corrections(
    cfg: &Config,
    ix: &StateIndexer,
    x: &DVector<f64>,
    nav: &NavData,
    input: &EpochInput,
    candidates: &[Candidate],
    excluded: &[bool],
    v: &mut Vec<f64>,
    h: &mut Vec<f64>,
    var: &mut Vec<f64>,
) {
    let nx = ix.nx();

    let corrections = match nav.corrections.as_ref() {
        Some(corrections) => corrections,
        None => return,
    };

    if matches!(cfg.tropo, TropOpt::Estimate | TropOpt::EstimateWithGradients) {
        if let Some((values, stds)) = corrections.tropo_at(input.time) {
            let n = if cfg.tropo == TropOpt::EstimateWithGradients {
                3
            } else {
                1
            };
            for i in 0..n {
                if stds[i] == 0.0 {
                    continue;
                }
                let j = ix.tropo() + i;

                let mut row = vec![0.0; nx];
                row[j] = 1.0;

                v.push(values[i] - x[j]);
                h.extend_from_slice(&row);
                var.push(stds[i].powi(2));
            }
        }
    }

    if cfg.iono == IonoOpt::Estimate {
        if let Some(record) = corrections.stec_at(input.time) {
            for (i, cand) in candidates.iter().enumerate() {
                let slot = match cand.slot() {
                    Some(slot) => slot,
                    None => continue,
                };
                if excluded[i]
                    || slot >= record.iono_m.len()
                    || record.iono_m[slot] == 0.0
                    || record.std_m[slot] > 0.5
                {
                    continue;
                }
                let j = ix.iono(slot);

                let mut row = vec![0.0; nx];
                row[j] = 1.0;

                v.push(record.iono_m[slot] - x[j]);
                h.extend_from_slice(&row);
                var.push(record.std_m[slot].powi(2));
            }
        }
    }
}
