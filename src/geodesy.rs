use map_3d::{ecef2geodetic, geodetic2ecef, Ellipsoid};
use nalgebra::{Matrix3, Vector3};

use crate::constants::{EARTH_ANGULAR_VEL_RAD_S, SPEED_OF_LIGHT_M_S};

/// Geodetic coordinates on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Geodetic {
    /// Latitude (radians)
    pub lat_rad: f64,
    /// Longitude (radians)
    pub lon_rad: f64,
    /// Height above ellipsoid (m)
    pub height_m: f64,
}

impl Geodetic {
    /// Build [Geodetic] coordinates from an ECEF position in meters.
    pub fn from_ecef_m(ecef_m: &Vector3<f64>) -> Self {
        let (lat_rad, lon_rad, height_m) =
            ecef2geodetic(ecef_m[0], ecef_m[1], ecef_m[2], Ellipsoid::WGS84);
        Self {
            lat_rad,
            lon_rad,
            height_m,
        }
    }

    /// Converts to ECEF meters.
    pub fn to_ecef_m(&self) -> Vector3<f64> {
        let (x, y, z) = geodetic2ecef(self.lat_rad, self.lon_rad, self.height_m, Ellipsoid::WGS84);
        Vector3::new(x, y, z)
    }
}

/// ECEF to local East/North/Up rotation at given [Geodetic] point.
/// Row 0 is East, row 1 North, row 2 Up.
pub(crate) fn enu_rotation(geo: &Geodetic) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = geo.lat_rad.sin_cos();
    let (sin_lon, cos_lon) = geo.lon_rad.sin_cos();

    Matrix3::new(
        -sin_lon,
        cos_lon,
        0.0,
        -sin_lat * cos_lon,
        -sin_lat * sin_lon,
        cos_lat,
        cos_lat * cos_lon,
        cos_lat * sin_lon,
        sin_lat,
    )
}

/// Rotates an ECEF vector into local ENU coordinates.
pub(crate) fn ecef_to_enu(geo: &Geodetic, v_ecef: &Vector3<f64>) -> Vector3<f64> {
    enu_rotation(geo) * v_ecef
}

/// Rotates an ENU covariance into the ECEF frame (EᵀQE).
pub(crate) fn enu_cov_to_ecef(geo: &Geodetic, q_enu: &Matrix3<f64>) -> Matrix3<f64> {
    let e = enu_rotation(geo);
    e.transpose() * q_enu * e
}

/// Geometric range between satellite and receiver positions (ECEF m),
/// corrected for the Sagnac effect, along with the receiver-to-satellite
/// unit line of sight. Returns None when the satellite position is unset.
pub(crate) fn geometric_range(
    rs_m: &Vector3<f64>,
    rr_m: &Vector3<f64>,
) -> Option<(f64, Vector3<f64>)> {
    if rs_m.norm() < crate::constants::EARTH_SEMI_MAJOR_AXIS_M {
        // unset or sub-orbital: cannot contribute
        return None;
    }

    let los = rs_m - rr_m;
    let range_m = los.norm();
    let e = los / range_m;

    let sagnac_m =
        EARTH_ANGULAR_VEL_RAD_S * (rs_m[0] * rr_m[1] - rs_m[1] * rr_m[0]) / SPEED_OF_LIGHT_M_S;

    Some((range_m + sagnac_m, e))
}

/// Azimuth and elevation (radians) of a receiver-to-satellite
/// line of sight, at the given receiver [Geodetic] point.
pub(crate) fn azimuth_elevation(geo: &Geodetic, e: &Vector3<f64>) -> (f64, f64) {
    let enu = ecef_to_enu(geo, e);

    let azimuth_rad = if enu[0] * enu[0] + enu[1] * enu[1] < 1E-12 {
        0.0
    } else {
        let az = enu[0].atan2(enu[1]);
        if az < 0.0 {
            az + 2.0 * std::f64::consts::PI
        } else {
            az
        }
    };

    (azimuth_rad, enu[2].clamp(-1.0, 1.0).asin())
}

#[cfg(test)]
mod test {
    use super::{azimuth_elevation, ecef_to_enu, geometric_range, Geodetic};
    use nalgebra::Vector3;

    #[test]
    fn test_geodetic_roundtrip() {
        for (lat_deg, lon_deg, h) in [(45.0, 3.0, 100.0), (-33.9, 18.4, 20.0)] {
            let geo = Geodetic {
                lat_rad: (lat_deg as f64).to_radians(),
                lon_rad: (lon_deg as f64).to_radians(),
                height_m: h,
            };

            let back = Geodetic::from_ecef_m(&geo.to_ecef_m());

            assert!((back.lat_rad - geo.lat_rad).abs() < 1E-9);
            assert!((back.lon_rad - geo.lon_rad).abs() < 1E-9);
            assert!((back.height_m - geo.height_m).abs() < 1E-3);
        }
    }

    #[test]
    fn test_enu_zenith() {
        let geo = Geodetic {
            lat_rad: 0.0_f64.to_radians(),
            lon_rad: 0.0,
            height_m: 0.0,
        };

        // straight up on the equator/prime meridian is +X
        let enu = ecef_to_enu(&geo, &Vector3::new(1.0, 0.0, 0.0));
        assert!((enu[2] - 1.0).abs() < 1E-12);

        let (_, el) = azimuth_elevation(&geo, &Vector3::new(1.0, 0.0, 0.0));
        assert!((el - std::f64::consts::FRAC_PI_2).abs() < 1E-9);
    }

    #[test]
    fn test_geometric_range() {
        let rr = Vector3::new(6378137.0, 0.0, 0.0);
        let rs = Vector3::new(26378137.0, 0.0, 0.0);

        let (r, e) = geometric_range(&rs, &rr).unwrap();

        assert!((r - 20.0E6).abs() < 1.0E-6);
        assert!((e - Vector3::new(1.0, 0.0, 0.0)).norm() < 1E-12);

        assert!(geometric_range(&Vector3::zeros(), &rr).is_none());
    }
}
