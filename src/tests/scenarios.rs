//! End-to-end estimation scenarios
use gnss::prelude::{Constellation, SV};
use hifitime::Epoch;
use rstest::*;

use crate::{
    constants::{NFREQ, SPEED_OF_LIGHT_M_S},
    correction::bds2_multipath,
    observation::{Candidate, Observation},
    prelude::{Estimator, SolutionStatus},
    state::satellite::slot,
    tests::TestScenario,
};

use nalgebra::Vector3;

#[fixture]
fn scenario() -> TestScenario {
    TestScenario::gps_dual_frequency()
}

/// Single epoch, six GPS satellites, dual frequency, iono-free,
/// no noise: float solution within a millimeter of the truth,
/// all Melbourne-Wübbena arcs fresh.
#[rstest]
fn single_epoch_float(scenario: TestScenario) {
    let mut estimator = Estimator::new(scenario.cfg.clone());

    let t = Epoch::from_gpst_seconds(3600.0);
    let solution = estimator
        .process(&scenario.epoch_input(t), &scenario.nav)
        .unwrap_or_else(|e| panic!("estimation failed: {}", e));

    assert_eq!(solution.status, SolutionStatus::Float);
    assert_eq!(solution.satellites, 6);

    let error_m = (solution.position_ecef_m - scenario.truth_ecef_m).norm();
    assert!(error_m < 1.0E-3, "position error {:.6} m", error_m);

    for sat in scenario.satellites.iter() {
        let diag = estimator.satellite(sat.sv).unwrap();
        assert_eq!(diag.mw_arc, 1, "{} arc should be fresh", sat.sv);
        assert_eq!(diag.outage[0], 0, "{} outage reset on commit", sat.sv);
        assert_eq!(diag.lock[0], 1);
    }
}

/// 100 static epochs with an abrupt 2-cycle slip on G05/L1 at
/// epoch 50: the Melbourne-Wübbena detector flags it, the
/// ambiguity restarts, the position barely moves.
#[rstest]
fn static_run_with_mid_arc_slip(mut scenario: TestScenario) {
    scenario.cfg.mode = crate::cfg::Mode::Static;

    let sv = SV::new(Constellation::GPS, 5);
    let sat_index = scenario
        .satellites
        .iter()
        .position(|sat| sat.sv == sv)
        .unwrap();
    let arena = slot(sv).unwrap();

    let mut estimator = Estimator::new(scenario.cfg.clone());
    let bias_index = estimator.indexer().bias(arena, 0);

    let mut position_before_slip = Vector3::zeros();
    let mut bias_before_slip = 0.0;

    for epoch in 0..100 {
        if epoch == 50 {
            // tracking loses 2 cycles on L1, permanently
            scenario.satellites[sat_index].extra_phase_cycles[0] = 2.0;

            position_before_slip = estimator.solution().position_ecef_m;
            bias_before_slip = estimator.filter_state().x[bias_index];
        }

        let t = Epoch::from_gpst_seconds(3600.0 + 30.0 * epoch as f64);
        let solution = estimator
            .process(&scenario.epoch_input(t), &scenario.nav)
            .unwrap_or_else(|e| panic!("epoch {} failed: {}", epoch, e));

        assert_eq!(
            solution.status,
            SolutionStatus::Float,
            "epoch {} lost the solution",
            epoch
        );

        let diag = estimator.satellite(sv).unwrap();

        if epoch == 50 {
            assert!(diag.slip_mw[0], "MW detector missed the slip");
            assert_eq!(diag.mw_arc, 1, "MW statistics should restart");

            // ambiguity re-seeded from the slipped phase
            let bias = estimator.filter_state().x[bias_index];
            assert!(
                (bias - bias_before_slip).abs() > 0.5,
                "ambiguity not reinitialized: {} -> {}",
                bias_before_slip,
                bias
            );

            let jump_m = (solution.position_ecef_m - position_before_slip).norm();
            assert!(jump_m < 5.0E-3, "position jumped {:.4} m", jump_m);
        } else {
            assert!(!diag.slip_mw[0], "spurious MW slip at epoch {}", epoch);
        }
    }

    assert_eq!(estimator.satellite(sv).unwrap().slip_count[0], 1);
}

/// Loss-of-lock flag on G03/L2 at epoch 7: LLI provenance only,
/// the Melbourne-Wübbena arc restarts, no GF/MW verdicts.
#[rstest]
fn lli_flag_mid_run(mut scenario: TestScenario) {
    let sv = SV::new(Constellation::GPS, 3);
    let sat_index = scenario
        .satellites
        .iter()
        .position(|sat| sat.sv == sv)
        .unwrap();

    let mut estimator = Estimator::new(scenario.cfg.clone());

    for epoch in 0..10 {
        scenario.satellites[sat_index].lli[1] = if epoch == 7 { 1 } else { 0 };

        let t = Epoch::from_gpst_seconds(3600.0 + 30.0 * epoch as f64);
        estimator
            .process(&scenario.epoch_input(t), &scenario.nav)
            .unwrap_or_else(|e| panic!("epoch {} failed: {}", epoch, e));

        let diag = estimator.satellite(sv).unwrap();

        if epoch == 7 {
            assert!(diag.slip_lli[1], "LLI slip missed");
            assert!(!diag.slip_gf[1], "GF verdict must stay clear");
            assert!(!diag.slip_mw[1], "MW verdict must stay clear");
            assert_eq!(diag.mw_arc, 1, "MW arc restarts on the LLI slip");
        } else if epoch > 0 {
            assert!(!diag.slip_lli[1], "spurious LLI at epoch {}", epoch);
        }
    }
}

/// BDS-2 IGSO at 45° elevation: code observables receive the
/// interpolated multipath corrections of the 40°..50° rows.
#[test]
fn bds2_igso_multipath_rows() {
    let mut obs = Observation::default();
    obs.pseudo_range_m = [24.0E6; NFREQ];

    let igso = Candidate::new(
        SV::new(Constellation::BeiDou, 6),
        Epoch::from_gpst_seconds(0.0),
        obs,
    );

    let mp = bds2_multipath(&igso, 45.0_f64.to_radians());

    // midway between the published rows: (-0.15, -0.14, -0.11)
    // and (-0.04, -0.03, -0.04)
    let expected = [-0.095, -0.085, -0.075];
    for f in 0..NFREQ {
        assert!(
            (mp[f] - expected[f]).abs() < 0.01,
            "B{} correction {:.3} vs {:.3}",
            f + 1,
            mp[f],
            expected[f]
        );
    }
}

/// Day-boundary crossing resets every active ambiguity; the
/// phase-code jump watchdog stays quiet when a single satellite
/// carries the offset, and undoes a common offset exactly.
#[rstest]
fn day_boundary_and_clock_jump_watchdog(mut scenario: TestScenario) {
    scenario.cfg.handle_day_boundary = true;

    let mut estimator = Estimator::new(scenario.cfg.clone());

    // converge over a few epochs just before the boundary
    for epoch in 0..3 {
        let t = Epoch::from_gpst_seconds(86310.0 + 30.0 * epoch as f64);
        estimator
            .process(&scenario.epoch_input(t), &scenario.nav)
            .unwrap_or_else(|e| panic!("epoch {} failed: {}", epoch, e));
    }

    let bias_indices = scenario
        .satellites
        .iter()
        .map(|sat| estimator.indexer().bias(slot(sat.sv).unwrap(), 0))
        .collect::<Vec<_>>();

    // single-satellite offset: the watchdog must not shift the others
    let corrupted = bias_indices[0];
    estimator.state.x[corrupted] += 1.2E6;

    let reference = bias_indices[1..]
        .iter()
        .map(|i| estimator.state.x[*i])
        .collect::<Vec<_>>();

    let t = Epoch::from_gpst_seconds(86390.0);
    let solution = estimator
        .process(&scenario.epoch_input(t), &scenario.nav)
        .unwrap();

    assert_eq!(
        solution.status,
        SolutionStatus::Float,
        "remaining satellites must carry the epoch"
    );
    for (k, i) in bias_indices[1..].iter().enumerate() {
        assert!(
            (estimator.state.x[*i] - reference[k]).abs() < 1.0E-6,
            "bias {} shifted by the watchdog",
            k + 1
        );
    }

    // put the corrupted carrier back, then apply a common offset
    // across the fleet: absorbed back exactly
    estimator.state.x[corrupted] -= 1.2E6;

    let reference = bias_indices
        .iter()
        .map(|i| estimator.state.x[*i])
        .collect::<Vec<_>>();
    for i in bias_indices.iter() {
        estimator.state.x[*i] += 0.0008 * SPEED_OF_LIGHT_M_S;
    }

    let t = Epoch::from_gpst_seconds(86395.0);
    estimator
        .process(&scenario.epoch_input(t), &scenario.nav)
        .unwrap();

    for (k, i) in bias_indices.iter().enumerate() {
        assert!(
            (estimator.state.x[*i] - reference[k]).abs() < 1.0E-3,
            "common jump not absorbed on bias {}",
            k,
        );
    }

    // day boundary: every ambiguity restarts from VAR_BIAS, so the
    // post-epoch variance steps back up from its converged value
    let converged = bias_indices
        .iter()
        .map(|i| estimator.state.p[(*i, *i)])
        .collect::<Vec<_>>();

    let t = Epoch::from_gpst_seconds(86400.0);
    let solution = estimator
        .process(&scenario.epoch_input(t), &scenario.nav)
        .unwrap();

    assert_eq!(solution.status, SolutionStatus::Float);

    for (k, i) in bias_indices.iter().enumerate() {
        assert!(
            estimator.state.p[(*i, *i)] > converged[k],
            "ambiguity {} variance did not restart",
            k,
        );
    }
}

/// Eclipsed Block IIA satellite: zeroed position, no residual
/// contribution, the others are untouched.
#[rstest]
fn eclipse_excludes_block_iia(mut scenario: TestScenario) {
    scenario.cfg.reject_eclipse = true;

    let sv = SV::new(Constellation::GPS, 10);
    let arena = slot(sv).unwrap();
    scenario.nav.satellite_antenna[arena].type_name = "BLOCK IIA".to_string();

    let mut estimator = Estimator::new(scenario.cfg.clone());

    let t = Epoch::from_gpst_seconds(3600.0);
    let mut input = scenario.epoch_input(t);

    // sun exactly behind the earth, seen from G10
    let sat_index = scenario
        .satellites
        .iter()
        .position(|sat| sat.sv == sv)
        .unwrap();
    let direction = input.candidates[sat_index].position_ecef_m.normalize();
    input.sun_position_ecef_m = -direction * 1.496E11;

    let solution = estimator.process(&input, &scenario.nav).unwrap();

    assert_eq!(solution.status, SolutionStatus::Float);
    assert_eq!(solution.satellites, 5, "G10 must not contribute");

    let diag = estimator.satellite(sv).unwrap();
    assert!(!diag.vsat[0]);

    for sat in scenario.satellites.iter() {
        if sat.sv == sv {
            continue;
        }
        assert!(
            estimator.satellite(sat.sv).unwrap().vsat[0],
            "{} wrongly excluded",
            sat.sv
        );
    }

    let error_m = (solution.position_ecef_m - scenario.truth_ecef_m).norm();
    assert!(error_m < 1.0E-3, "position error {:.6} m", error_m);
}

/// The status stream renders the expected records.
#[rstest]
fn status_stream(mut scenario: TestScenario) {
    scenario.cfg.tropo = crate::cfg::TropOpt::EstimateWithGradients;

    let mut estimator = Estimator::new(scenario.cfg.clone());

    for epoch in 0..3 {
        let t = Epoch::from_gpst_seconds(3600.0 + 30.0 * epoch as f64);
        estimator
            .process(&scenario.epoch_input(t), &scenario.nav)
            .unwrap();
    }

    let mut buffer = String::new();
    crate::status::write_status(&estimator, &mut buffer).unwrap();

    assert!(buffer.contains("$POS,"), "missing $POS: {}", buffer);
    assert!(buffer.contains("$CLK,"), "missing $CLK");
    assert!(buffer.contains("$TROP,"), "missing $TROP");
    assert!(buffer.contains("$TRPG,"), "missing $TRPG");
    assert!(buffer.contains("$AMB,"), "missing $AMB");
    assert!(!buffer.contains("$VELACC"), "no dynamics configured");

    // position fields carry the estimate
    let pos_line = buffer.lines().find(|l| l.starts_with("$POS")).unwrap();
    let fields = pos_line.split(',').collect::<Vec<_>>();
    assert_eq!(fields.len(), 10);
    assert_eq!(fields[3], "6", "float PPP status code");
}
