//! Ionospheric delay models
use hifitime::Epoch;

use crate::{
    constants::SPEED_OF_LIGHT_M_S,
    geodesy::Geodetic,
    navdata::NavData,
    state::satellite::MAX_SAT,
};

use std::f64::consts::PI;

/// Default Klobuchar coefficients (2004/1/1), used when no
/// broadcast set is available.
const DEFAULT_KLOBUCHAR: [f64; 8] = [
    0.1118E-7, -0.7451E-8, -0.5961E-7, 0.1192E-6, 0.1167E6, -0.2294E6, -0.1311E6, 0.1049E7,
];

/// Broadcast (Klobuchar) ionospheric delay (m) on L1, for given
/// receiver position and line of sight.
pub(crate) fn klobuchar(
    t: Epoch,
    coefficients: Option<[f64; 8]>,
    position: &Geodetic,
    azimuth_rad: f64,
    elevation_rad: f64,
) -> f64 {
    if position.height_m < -1.0E3 || elevation_rad <= 0.0 {
        return 0.0;
    }

    let ion = match coefficients {
        Some(coefficients) if coefficients.iter().any(|c| *c != 0.0) => coefficients,
        _ => DEFAULT_KLOBUCHAR,
    };

    // earth-centered angle (semi-circle)
    let psi = 0.0137 / (elevation_rad / PI + 0.11) - 0.022;

    // subionospheric latitude/longitude (semi-circle)
    let mut phi = position.lat_rad / PI + psi * azimuth_rad.cos();
    phi = phi.clamp(-0.416, 0.416);

    let lam = position.lon_rad / PI + psi * azimuth_rad.sin() / (phi * PI).cos();

    // geomagnetic latitude (semi-circle)
    let phi = phi + 0.064 * ((lam - 1.617) * PI).cos();

    // local time (s)
    let week_seconds = t.to_gpst_seconds().rem_euclid(604800.0);
    let mut local_s = 43200.0 * lam + week_seconds.rem_euclid(86400.0);
    local_s -= (local_s / 86400.0).floor() * 86400.0;

    // slant factor
    let slant = 1.0 + 16.0 * (0.53 - elevation_rad / PI).powi(3);

    let amplitude = ion[0] + phi * (ion[1] + phi * (ion[2] + phi * ion[3]));
    let period = ion[4] + phi * (ion[5] + phi * (ion[6] + phi * ion[7]));

    let amplitude = amplitude.max(0.0);
    let period = period.max(72000.0);

    let x = 2.0 * PI * (local_s - 50400.0) / period;

    SPEED_OF_LIGHT_M_S
        * slant
        * if x.abs() < 1.57 {
            5.0E-9 + amplitude * (1.0 + x * x * (-0.5 + x * x / 24.0))
        } else {
            5.0E-9
        }
}

/// Per-session slant TEC cache: one product lookup per epoch is
/// shared by every satellite. Owned by the estimator so concurrent
/// receivers never interfere.
#[derive(Debug, Clone)]
pub(crate) struct StecCache {
    time: Option<Epoch>,
    iono_m: Vec<f64>,
    std_m: Vec<f64>,
}

impl Default for StecCache {
    fn default() -> Self {
        Self {
            time: None,
            iono_m: vec![0.0; MAX_SAT],
            std_m: vec![0.0; MAX_SAT],
        }
    }
}

impl StecCache {
    /// Slant delay (m) and variance for this satellite slot, from
    /// the external product, refreshing the per-epoch cache when
    /// the epoch moves. None when the product does not resolve.
    pub(crate) fn lookup(
        &mut self,
        t: Epoch,
        nav: &NavData,
        slot: usize,
    ) -> Option<(f64, f64)> {
        if self.time != Some(t) {
            let corrections = nav.corrections.as_ref()?;
            let record = corrections.stec_at(t)?;

            let n = record.iono_m.len().min(MAX_SAT);
            self.iono_m[..n].copy_from_slice(&record.iono_m[..n]);
            self.std_m[..n].copy_from_slice(&record.std_m[..n]);
            self.time = Some(t);
        }

        if self.iono_m[slot] == 0.0 || self.std_m[slot] > 0.1 {
            return None;
        }

        Some((self.iono_m[slot], self.std_m[slot].powi(2)))
    }
}
