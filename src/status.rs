//! Line-oriented solution status stream
use std::fmt::Write;

use crate::{
    ambiguity::AmbiguityResolver,
    cfg::{IonoOpt, TropOpt},
    constants::SPEED_OF_LIGHT_M_S,
    geodesy::{ecef_to_enu, Geodetic},
    solution::SolutionStatus,
    solver::Estimator,
    state::satellite::{sv_from_slot, MAX_SAT},
};

use nalgebra::Vector3;

/// Numeric status codes of the record format.
fn status_code(status: SolutionStatus) -> u8 {
    match status {
        SolutionStatus::None => 0,
        SolutionStatus::Fixed => 1,
        SolutionStatus::Single => 5,
        SolutionStatus::Float => 6,
    }
}

/// Renders the solution status records for the last processed
/// epoch: `$POS`, `$VELACC`, `$CLK`, `$TROP`, `$TRPG`, `$ION`,
/// `$DCB` and `$AMB` lines, week and time-of-week stamped.
/// Writes nothing when the last epoch produced no solution.
pub fn write_status<AR: AmbiguityResolver>(
    estimator: &Estimator<AR>,
    buffer: &mut String,
) -> std::fmt::Result {
    let solution = estimator.solution();
    if solution.status == SolutionStatus::None {
        return Ok(());
    }

    let stat = status_code(solution.status);
    let fixed = solution.status == SolutionStatus::Fixed;

    let gpst_s = solution.time.to_gpst_seconds();
    let week = (gpst_s / 604800.0).floor() as i64;
    let tow = gpst_s - week as f64 * 604800.0;

    let cfg = &estimator.cfg;
    let ix = estimator.indexer();
    let state = estimator.filter_state();

    let x = if fixed { &state.xa } else { &state.x };
    let std = |i: usize| -> f64 {
        let p = if fixed { &state.pa } else { &state.p };
        let var = p[(i, i)];
        if var > 0.0 {
            var.sqrt()
        } else {
            0.0
        }
    };

    // receiver position
    writeln!(
        buffer,
        "$POS,{},{:.3},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
        week,
        tow,
        stat,
        x[0],
        x[1],
        x[2],
        std(0),
        std(1),
        std(2),
    )?;

    // receiver velocity and acceleration
    if cfg.dynamics {
        let geo = Geodetic::from_ecef_m(&Vector3::new(x[0], x[1], x[2]));
        let vel = ecef_to_enu(&geo, &Vector3::new(state.x[3], state.x[4], state.x[5]));
        let acc = ecef_to_enu(&geo, &Vector3::new(state.x[6], state.x[7], state.x[8]));

        writeln!(
            buffer,
            "$VELACC,{},{:.3},{},{:.4},{:.4},{:.4},{:.5},{:.5},{:.5},{:.4},{:.4},{:.4},{:.5},{:.5},{:.5}",
            week, tow, stat,
            vel[0], vel[1], vel[2],
            acc[0], acc[1], acc[2],
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        )?;
    }

    // receiver clocks (ns)
    let i = ix.clock(0);
    writeln!(
        buffer,
        "$CLK,{},{:.3},{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3}",
        week,
        tow,
        stat,
        1,
        x[i] * 1E9 / SPEED_OF_LIGHT_M_S,
        x[i + 1] * 1E9 / SPEED_OF_LIGHT_M_S,
        x[i + 2] * 1E9 / SPEED_OF_LIGHT_M_S,
        x[i + 3] * 1E9 / SPEED_OF_LIGHT_M_S,
        std(i) * 1E9 / SPEED_OF_LIGHT_M_S,
        std(i + 1) * 1E9 / SPEED_OF_LIGHT_M_S,
        std(i + 2) * 1E9 / SPEED_OF_LIGHT_M_S,
        std(i + 3) * 1E9 / SPEED_OF_LIGHT_M_S,
    )?;

    // tropospheric parameters
    if matches!(cfg.tropo, TropOpt::Estimate | TropOpt::EstimateWithGradients) {
        let i = ix.tropo();
        writeln!(
            buffer,
            "$TROP,{},{:.3},{},{},{:.4},{:.4}",
            week,
            tow,
            stat,
            1,
            x[i],
            std(i),
        )?;
    }
    if cfg.tropo == TropOpt::EstimateWithGradients {
        let i = ix.tropo();
        writeln!(
            buffer,
            "$TRPG,{},{:.3},{},{},{:.5},{:.5},{:.5},{:.5}",
            week,
            tow,
            stat,
            1,
            x[i + 1],
            x[i + 2],
            std(i + 1),
            std(i + 2),
        )?;
    }

    // ionosphere parameters
    if cfg.iono == IonoOpt::Estimate {
        for slot in 0..MAX_SAT {
            let sat = &estimator.ssat[slot];
            if !sat.vsat[0] || !sat.vs {
                continue;
            }
            let j = ix.iono(slot);
            if state.x[j] == 0.0 {
                continue;
            }
            let sv = match sv_from_slot(slot) {
                Some(sv) => sv,
                None => continue,
            };
            writeln!(
                buffer,
                "$ION,{},{:.3},{},{},{:.1},{:.1},{:.4},{:.4}",
                week,
                tow,
                stat,
                sv,
                sat.azimuth_rad.to_degrees(),
                sat.elevation_rad.to_degrees(),
                x[j],
                std(j),
            )?;
        }
    }

    // third-frequency receiver DCB
    if ix.nd() > 0 {
        let j = ix.dcb();
        writeln!(
            buffer,
            "$DCB,{},{:.3},{},{},{:.4},{:.4}",
            week,
            tow,
            stat,
            1,
            x[j],
            std(j),
        )?;
    }

    // ambiguity parameters
    for slot in 0..MAX_SAT {
        let sat = &estimator.ssat[slot];
        if !sat.vsat[0] || !sat.vs {
            continue;
        }
        let sv = match sv_from_slot(slot) {
            Some(sv) => sv,
            None => continue,
        };
        for f in 0..ix.nf() {
            let k = ix.bias(slot, f);
            writeln!(
                buffer,
                "$AMB,{},{:.3},{},{},{},{:.4},{:.4}",
                week,
                tow,
                stat,
                sv,
                f + 1,
                x[k],
                std(k),
            )?;
        }
    }

    Ok(())
}
