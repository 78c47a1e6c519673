//! End-to-end scenarios over deterministic synthetic constellations.
//! Observations are generated through the same physical models the
//! estimator applies, so zero-noise residuals vanish at the truth.
use nalgebra::Vector3;

use gnss::prelude::{Constellation, SV};
use hifitime::Epoch;

use crate::{
    bias::tropo::saastamoinen,
    cfg::{Config, IonoOpt, Mode, TropOpt},
    constants::{NFREQ, NSYS, REL_HUMI, SPEED_OF_LIGHT_M_S},
    geodesy::{azimuth_elevation, enu_rotation, geometric_range, Geodetic},
    navdata::NavData,
    observation::{Candidate, Code, EpochInput, Observation},
    prelude::Carrier,
};

mod properties;
mod scenarios;

/// Survey marker used by every scenario.
pub(crate) fn reference_site() -> Geodetic {
    Geodetic {
        lat_rad: 45.0_f64.to_radians(),
        lon_rad: 3.0_f64.to_radians(),
        height_m: 200.0,
    }
}

/// One synthetic satellite of a [TestScenario].
#[derive(Debug, Clone)]
pub(crate) struct TestSatellite {
    pub sv: SV,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub range_m: f64,
    pub clock_bias_s: f64,
    /// Carried integer ambiguities per frequency (cycles)
    pub ambiguity_cycles: [f64; 2],
    /// Injected slip (cycles), added to the generated phase
    pub extra_phase_cycles: [f64; 2],
    /// Injected loss-of-lock flags
    pub lli: [u8; NFREQ],
}

/// Deterministic synthetic constellation and processing preset.
pub(crate) struct TestScenario {
    pub cfg: Config,
    pub nav: NavData,
    pub truth_ecef_m: Vector3<f64>,
    pub apriori_ecef_m: Vector3<f64>,
    pub clock_s: [f64; NSYS],
    pub satellites: Vec<TestSatellite>,
}

impl TestScenario {
    /// Six GPS satellites, dual frequency, iono-free processing,
    /// Saastamoinen troposphere, zero process noise and zero
    /// measurement noise. The position apriori is offset from the
    /// truth by about a meter.
    pub fn gps_dual_frequency() -> Self {
        let mut cfg = Config::default();
        cfg.mode = Mode::Kinematic;
        cfg.iono = IonoOpt::IonoFree;
        cfg.tropo = TropOpt::Saastamoinen;
        cfg.process_noise = [0.0; 6];

        let truth = reference_site().to_ecef_m();

        let satellites = [
            (1, 0.0, 75.0),
            (5, 60.0, 45.0),
            (3, 120.0, 35.0),
            (10, 180.0, 60.0),
            (17, 240.0, 30.0),
            (23, 300.0, 50.0),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (prn, azimuth_deg, elevation_deg))| TestSatellite {
            sv: SV::new(Constellation::GPS, prn),
            azimuth_deg,
            elevation_deg,
            range_m: 22.0E6 + 1.0E5 * i as f64,
            clock_bias_s: 50.0E-6 + 1.0E-6 * i as f64,
            ambiguity_cycles: [10.0 + 3.0 * i as f64, -7.0 + 2.0 * i as f64],
            extra_phase_cycles: [0.0; 2],
            lli: [0; NFREQ],
        })
        .collect();

        let mut nav = NavData::new();
        for antenna in nav.satellite_antenna.iter_mut() {
            antenna.type_name = "BLOCK IIR-M".to_string();
        }

        Self {
            cfg,
            nav,
            truth_ecef_m: truth,
            apriori_ecef_m: truth + Vector3::new(0.3, -0.25, 0.2),
            clock_s: [1.0E-7, 2.0E-8, 0.0, 0.0],
            satellites,
        }
    }

    /// Satellite position placing this [TestSatellite] at its
    /// azimuth/elevation seen from the truth position.
    fn satellite_position(&self, sat: &TestSatellite) -> Vector3<f64> {
        let geo = Geodetic::from_ecef_m(&self.truth_ecef_m);

        let (sin_az, cos_az) = sat.azimuth_deg.to_radians().sin_cos();
        let (sin_el, cos_el) = sat.elevation_deg.to_radians().sin_cos();

        let enu = Vector3::new(sin_az * cos_el, cos_az * cos_el, sin_el);

        self.truth_ecef_m + enu_rotation(&geo).transpose() * (enu * sat.range_m)
    }

    /// Synthesizes one epoch of observations, physically consistent
    /// with the scenario's truth.
    pub fn epoch_input(&self, t: Epoch) -> EpochInput {
        let geo = Geodetic::from_ecef_m(&self.truth_ecef_m);

        let candidates = self
            .satellites
            .iter()
            .map(|sat| {
                let position = self.satellite_position(sat);

                let (range_m, e) = geometric_range(&position, &self.truth_ecef_m)
                    .unwrap_or_else(|| panic!("degenerate geometry for {}", sat.sv));

                let (_, elevation_rad) = azimuth_elevation(&geo, &e);

                let tropo_m = match self.cfg.tropo {
                    TropOpt::Saastamoinen => saastamoinen(&geo, elevation_rad, REL_HUMI),
                    _ => 0.0,
                };

                let model_m = range_m + SPEED_OF_LIGHT_M_S * self.clock_s[0]
                    - SPEED_OF_LIGHT_M_S * sat.clock_bias_s
                    + tropo_m;

                let mut obs = Observation::default();
                obs.code[0] = Code::C1C;
                obs.code[1] = Code::C2W;

                for f in 0..2 {
                    let lambda = Carrier::from_band(sat.sv.constellation, f)
                        .unwrap_or_default()
                        .wavelength();

                    obs.pseudo_range_m[f] = model_m;
                    obs.phase_cycles[f] = model_m / lambda
                        + sat.ambiguity_cycles[f]
                        + sat.extra_phase_cycles[f];
                    obs.snr_dbhz[f] = 45.0;
                    obs.lli[f] = sat.lli[f];
                }

                let mut cand = Candidate::new(sat.sv, t, obs);
                cand.position_ecef_m = position;
                cand.velocity_ecef_m_s = Vector3::new(0.0, 3.0E3, 0.0);
                cand.clock_bias_s = sat.clock_bias_s;
                cand
            })
            .collect();

        let mut input = EpochInput::new(t, candidates, self.apriori_ecef_m, self.clock_s);

        // sun high above the site: nobody eclipses by accident
        input.sun_position_ecef_m = self.truth_ecef_m.normalize() * 1.496E11;

        input
    }
}
