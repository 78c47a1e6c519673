//! Satellite attitude, eclipse filtering and phase windup
use log::debug;
use nalgebra::Vector3;

use crate::{
    constants::{EARTH_ANGULAR_VEL_RAD_S, EARTH_SEMI_MAJOR_AXIS_M},
    geodesy::{enu_rotation, Geodetic},
    navdata::NavData,
    observation::Candidate,
};

use std::f64::consts::PI;

/// Nominal yaw angle from the sun-orbit angle β and the orbit
/// angle μ counted from orbit midnight.
pub(crate) fn nominal_yaw(beta: f64, mu: f64) -> f64 {
    if beta.abs() < 1E-12 && mu.abs() < 1E-12 {
        return PI;
    }
    (-beta.tan()).atan2(mu.sin()) + PI
}

/// Satellite-fixed x/y unit vectors under the nominal yaw model.
/// Returns None on degenerate geometry (zero vectors).
pub(crate) fn satellite_axes(
    position_ecef_m: &Vector3<f64>,
    velocity_ecef_m_s: &Vector3<f64>,
    sun_ecef_m: &Vector3<f64>,
) -> Option<(Vector3<f64>, Vector3<f64>)> {
    // inertial velocity
    let velocity_inertial = Vector3::new(
        velocity_ecef_m_s[0] - EARTH_ANGULAR_VEL_RAD_S * position_ecef_m[1],
        velocity_ecef_m_s[1] + EARTH_ANGULAR_VEL_RAD_S * position_ecef_m[0],
        velocity_ecef_m_s[2],
    );

    let orbit_normal = position_ecef_m.cross(&velocity_inertial);
    let node = sun_ecef_m.cross(&orbit_normal);

    let es = position_ecef_m.try_normalize(0.0)?;
    let esun = sun_ecef_m.try_normalize(0.0)?;
    let en = orbit_normal.try_normalize(0.0)?;
    let ep = node.try_normalize(0.0)?;

    // beta: sun elevation above the orbital plane
    let beta = PI / 2.0 - esun.dot(&en).clamp(-1.0, 1.0).acos();

    // mu: orbit angle from midnight
    let e = es.dot(&ep).clamp(-1.0, 1.0).acos();
    let mut mu = PI / 2.0 + if es.dot(&esun) <= 0.0 { -e } else { e };
    if mu < -PI / 2.0 {
        mu += 2.0 * PI;
    } else if mu >= PI / 2.0 {
        mu -= 2.0 * PI;
    }

    let yaw = nominal_yaw(beta, mu);
    let (sin_yaw, cos_yaw) = yaw.sin_cos();

    let ex = en.cross(&es);

    Some((
        -sin_yaw * en + cos_yaw * ex,
        -cos_yaw * en - sin_yaw * ex,
    ))
}

/// True when the satellite sits in earth's shadow.
/// Only meaningful for vehicles with degraded attitude control.
fn in_shadow(position_ecef_m: &Vector3<f64>, sun_ecef_m: &Vector3<f64>) -> bool {
    let r = position_ecef_m.norm();
    if r <= 0.0 {
        return false;
    }

    let esun = match sun_ecef_m.try_normalize(0.0) {
        Some(esun) => esun,
        None => return false,
    };

    // sun-earth-satellite angle
    let cos_angle = (position_ecef_m.dot(&esun) / r).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();

    !(angle < PI / 2.0 || r * angle.sin() > EARTH_SEMI_MAJOR_AXIS_M)
}

/// Excludes measurements of eclipsing Block IIA satellites by
/// zeroing their position vector: downstream geometry then skips
/// them for the whole epoch.
pub(crate) fn filter_eclipsed(
    candidates: &mut [Candidate],
    nav: &NavData,
    sun_ecef_m: &Vector3<f64>,
) {
    for cand in candidates.iter_mut() {
        let slot = match cand.slot() {
            Some(slot) => slot,
            None => continue,
        };

        let type_name = &nav.satellite_antenna[slot].type_name;
        if !type_name.is_empty() && !type_name.contains("BLOCK IIA") {
            continue;
        }
        if cand.position_ecef_m.norm() <= 0.0 {
            continue;
        }

        if in_shadow(&cand.position_ecef_m, sun_ecef_m) {
            debug!("{} - eclipsing {} excluded", cand.t, cand.sv);
            cand.position_ecef_m = Vector3::zeros();
        }
    }
}

/// Carrier phase windup from the mutual rotation of the satellite
/// and receiver antennas. Updates the accumulated value in cycles,
/// unwrapped so consecutive epochs never jump by half a cycle or
/// more. Returns false on degenerate geometry.
pub(crate) fn phase_windup(
    position_ecef_m: &Vector3<f64>,
    velocity_ecef_m_s: &Vector3<f64>,
    receiver_ecef_m: &Vector3<f64>,
    sun_ecef_m: &Vector3<f64>,
    windup_cycles: &mut f64,
) -> bool {
    let (exs, eys) = match satellite_axes(position_ecef_m, velocity_ecef_m_s, sun_ecef_m) {
        Some(axes) => axes,
        None => return false,
    };

    // unit vector satellite to receiver
    let ek = match (receiver_ecef_m - position_ecef_m).try_normalize(0.0) {
        Some(ek) => ek,
        None => return false,
    };

    // receiver antenna x = north, y = west
    let geo = Geodetic::from_ecef_m(receiver_ecef_m);
    let enu = enu_rotation(&geo);
    let exr = Vector3::new(enu[(1, 0)], enu[(1, 1)], enu[(1, 2)]);
    let eyr = -Vector3::new(enu[(0, 0)], enu[(0, 1)], enu[(0, 2)]);

    // effective dipoles
    let ds = exs - ek * ek.dot(&exs) - ek.cross(&eys);
    let dr = exr - ek * ek.dot(&exr) + ek.cross(&eyr);

    let cos_phi = (ds.dot(&dr) / ds.norm() / dr.norm()).clamp(-1.0, 1.0);
    let mut phi_cycles = cos_phi.acos() / 2.0 / PI;

    if ek.dot(&ds.cross(&dr)) < 0.0 {
        phi_cycles = -phi_cycles;
    }

    // half-cycle unwrapping keeps the accumulator continuous
    *windup_cycles = phi_cycles + (*windup_cycles - phi_cycles + 0.5).floor();

    true
}
