//! Tropospheric delay models
use hifitime::Epoch;

use crate::geodesy::Geodetic;

use std::f64::consts::PI;

/// Standard-atmosphere Saastamoinen delay (m) along the slant path,
/// for given relative humidity. Returns 0 outside the model's
/// height and elevation domain.
pub(crate) fn saastamoinen(position: &Geodetic, elevation_rad: f64, humidity: f64) -> f64 {
    let h = position.height_m;

    if h < -100.0 || h > 1.0E4 || elevation_rad <= 0.0 {
        return 0.0;
    }

    // standard atmosphere at site height
    let hgt = h.max(0.0);
    let pressure_mbar = 1013.25 * (1.0 - 2.2557E-5 * hgt).powf(5.2568);
    let temperature_k = 15.0 - 6.5E-3 * hgt + 273.16;
    let water_vapour_mbar = 6.108
        * humidity
        * ((17.15 * temperature_k - 4684.0) / (temperature_k - 38.45)).exp();

    let zenith = PI / 2.0 - elevation_rad;

    let hydrostatic = 0.0022768 * pressure_mbar
        / (1.0 - 0.00266 * (2.0 * position.lat_rad).cos() - 0.00028 * hgt / 1.0E3)
        / zenith.cos();
    let wet = 0.002277 * (1255.0 / temperature_k + 0.05) * water_vapour_mbar / zenith.cos();

    hydrostatic + wet
}

/// Zenith hydrostatic delay (m) at this site.
pub(crate) fn zenith_hydrostatic_delay(position: &Geodetic) -> f64 {
    saastamoinen(position, PI / 2.0, 0.0)
}

/// Day-of-year and latitude interpolated meteorological parameter
/// table of the wide-area model: annual averages and seasonal
/// amplitudes of pressure, temperature, water vapour pressure,
/// temperature lapse rate and water vapour height factor, every
/// 15° of latitude.
const WIDE_AREA_AVERAGES: [(f64, [f64; 5]); 5] = [
    (15.0, [1013.25, 299.65, 26.31, 6.30E-3, 2.77]),
    (30.0, [1017.25, 294.15, 21.79, 6.05E-3, 3.15]),
    (45.0, [1015.75, 283.15, 11.66, 5.58E-3, 2.57]),
    (60.0, [1011.75, 272.15, 6.78, 5.39E-3, 1.81]),
    (75.0, [1013.00, 263.65, 4.11, 4.53E-3, 1.55]),
];

const WIDE_AREA_AMPLITUDES: [(f64, [f64; 5]); 5] = [
    (15.0, [0.0, 0.0, 0.0, 0.0, 0.0]),
    (30.0, [-3.75, 7.0, 8.85, 0.25E-3, 0.33]),
    (45.0, [-2.25, 11.0, 7.24, 0.32E-3, 0.46]),
    (60.0, [-1.75, 15.0, 5.36, 0.81E-3, 0.74]),
    (75.0, [-0.50, 14.5, 3.39, 0.62E-3, 0.30]),
];

fn wide_area_table(table: &[(f64, [f64; 5]); 5], parameter: usize, lat_deg: f64) -> f64 {
    let lat = lat_deg.abs();
    if lat <= 15.0 {
        table[0].1[parameter]
    } else if lat >= 75.0 {
        table[4].1[parameter]
    } else {
        let i = ((lat - 15.0) / 15.0) as usize;
        let (lat_0, lower) = table[i];
        let (_, upper) = table[i + 1];
        lower[parameter] + (upper[parameter] - lower[parameter]) / 15.0 * (lat - lat_0)
    }
}

fn wide_area_parameter(parameter: usize, lat_deg: f64, day_of_year: f64) -> f64 {
    let d_min = if lat_deg >= 0.0 { 28.0 } else { 211.0 };

    let annual = wide_area_table(&WIDE_AREA_AVERAGES, parameter, lat_deg);
    let amplitude = wide_area_table(&WIDE_AREA_AMPLITUDES, parameter, lat_deg);

    annual - amplitude * ((day_of_year - d_min) * 2.0 * PI / 365.25).cos()
}

/// Wide-area (SBAS) tropospheric correction: zenith delays from the
/// interpolated meteorological table, mapped with the simplified
/// obliquity factor. Returns the slant delay (m) and its variance.
pub(crate) fn wide_area_correction(t: Epoch, position: &Geodetic, elevation_rad: f64) -> (f64, f64) {
    const K_1: f64 = 77.604;
    const K_2: f64 = 382000.0;
    const R_D: f64 = 287.054;
    const G: f64 = 9.80665;
    const G_M: f64 = 9.784;

    let lat_deg = position.lat_rad.to_degrees();
    let day_of_year = t.day_of_year();
    let h = position.height_m;

    let pressure = wide_area_parameter(0, lat_deg, day_of_year);
    let temperature = wide_area_parameter(1, lat_deg, day_of_year);
    let vapour = wide_area_parameter(2, lat_deg, day_of_year);
    let beta = wide_area_parameter(3, lat_deg, day_of_year);
    let lambda = wide_area_parameter(4, lat_deg, day_of_year);

    let z0_dry = 1.0E-6 * K_1 * R_D * pressure / G_M;
    let denom = (lambda + 1.0) * G_M - beta * R_D;
    let z0_wet = 1.0E-6 * K_2 * R_D * vapour / temperature / denom;

    let reduction = 1.0 - beta * h / temperature;
    let dry = reduction.powf(G / R_D / beta) * z0_dry;
    let wet = reduction.powf((lambda + 1.0) * G / R_D / beta - 1.0) * z0_wet;

    let mapping = 1.001 / (0.002001 + elevation_rad.sin().powi(2)).sqrt();

    ((dry + wet) * mapping, (0.12 * mapping).powi(2))
}

/// Niell mapping function coefficient tables, every 15° of latitude.
const NMF_HYDRO_AVG: [[f64; 5]; 3] = [
    [1.2769934E-3, 1.2683230E-3, 1.2465397E-3, 1.2196049E-3, 1.2045996E-3],
    [2.9153695E-3, 2.9152299E-3, 2.9288445E-3, 2.9022565E-3, 2.9024912E-3],
    [62.610505E-3, 62.837393E-3, 63.721774E-3, 63.824265E-3, 64.258455E-3],
];

const NMF_HYDRO_AMP: [[f64; 5]; 3] = [
    [0.0, 1.2709626E-5, 2.6523662E-5, 3.4000452E-5, 4.1202191E-5],
    [0.0, 2.1414979E-5, 3.0160779E-5, 7.2562722E-5, 11.723375E-5],
    [0.0, 9.0128400E-5, 4.3497037E-5, 84.795348E-5, 170.37206E-5],
];

const NMF_WET: [[f64; 5]; 3] = [
    [5.8021897E-4, 5.6794847E-4, 5.8118019E-4, 5.9727542E-4, 6.1641693E-4],
    [1.4275268E-3, 1.5138625E-3, 1.4572752E-3, 1.5007428E-3, 1.7599082E-3],
    [4.3472961E-2, 4.6729510E-2, 4.3908931E-2, 4.4626982E-2, 5.4736038E-2],
];

/// Height correction coefficients (a, b, c).
const NMF_HEIGHT: [f64; 3] = [2.53E-5, 5.49E-3, 1.14E-3];

fn nmf_interpolate(table: &[f64; 5], lat_deg: f64) -> f64 {
    let lat = lat_deg.abs();
    if lat <= 15.0 {
        table[0]
    } else if lat >= 75.0 {
        table[4]
    } else {
        let i = ((lat - 15.0) / 15.0) as usize;
        let lat_0 = 15.0 * (i + 1) as f64;
        table[i] + (table[i + 1] - table[i]) / 15.0 * (lat - lat_0)
    }
}

/// Marini continued-fraction form.
fn mapping(elevation_rad: f64, a: f64, b: f64, c: f64) -> f64 {
    let sin_el = elevation_rad.sin();
    (1.0 + a / (1.0 + b / (1.0 + c))) / (sin_el + a / (sin_el + b / (sin_el + c)))
}

/// Niell hydrostatic and wet mapping functions at this site,
/// epoch and elevation.
pub(crate) fn niell_mapping(t: Epoch, position: &Geodetic, elevation_rad: f64) -> (f64, f64) {
    let lat_deg = position.lat_rad.to_degrees();

    // southern hemisphere is half a year out of phase
    let mut day_of_year = t.day_of_year();
    if lat_deg < 0.0 {
        day_of_year += 182.625;
    }

    let seasonal = ((day_of_year - 28.0) * 2.0 * PI / 365.25).cos();

    let a_h = nmf_interpolate(&NMF_HYDRO_AVG[0], lat_deg)
        - nmf_interpolate(&NMF_HYDRO_AMP[0], lat_deg) * seasonal;
    let b_h = nmf_interpolate(&NMF_HYDRO_AVG[1], lat_deg)
        - nmf_interpolate(&NMF_HYDRO_AMP[1], lat_deg) * seasonal;
    let c_h = nmf_interpolate(&NMF_HYDRO_AVG[2], lat_deg)
        - nmf_interpolate(&NMF_HYDRO_AMP[2], lat_deg) * seasonal;

    let a_w = nmf_interpolate(&NMF_WET[0], lat_deg);
    let b_w = nmf_interpolate(&NMF_WET[1], lat_deg);
    let c_w = nmf_interpolate(&NMF_WET[2], lat_deg);

    let height_km = position.height_m.max(0.0) / 1.0E3;
    let height_correction = (1.0 / elevation_rad.sin()
        - mapping(elevation_rad, NMF_HEIGHT[0], NMF_HEIGHT[1], NMF_HEIGHT[2]))
        * height_km;

    (
        mapping(elevation_rad, a_h, b_h, c_h) + height_correction,
        mapping(elevation_rad, a_w, b_w, c_w),
    )
}

/// Precise slant delay from estimated states: hydrostatic part from
/// the a-priori zenith model, wet part from the filter's zenith wet
/// delay and horizontal gradients. Fills the design partials with
/// respect to (zwd, grad_n, grad_e).
pub(crate) fn precise_model(
    t: Epoch,
    position: &Geodetic,
    azimuth_rad: f64,
    elevation_rad: f64,
    x_tropo: &[f64],
    dtdx: &mut [f64; 3],
) -> (f64, f64) {
    let zhd = zenith_hydrostatic_delay(position);
    let (m_h, mut m_w) = niell_mapping(t, position, elevation_rad);

    dtdx[1] = 0.0;
    dtdx[2] = 0.0;

    if elevation_rad > 0.0 && x_tropo.len() >= 3 {
        // m_w + m_w cot(el) (Gn cos(az) + Ge sin(az))
        let cot_el = 1.0 / elevation_rad.tan();
        let grad_n = m_w * cot_el * azimuth_rad.cos();
        let grad_e = m_w * cot_el * azimuth_rad.sin();

        m_w += grad_n * x_tropo[1] + grad_e * x_tropo[2];
        dtdx[1] = grad_n * (x_tropo[0] - zhd);
        dtdx[2] = grad_e * (x_tropo[0] - zhd);
    }

    dtdx[0] = m_w;

    (m_h * zhd + m_w * (x_tropo[0] - zhd), 0.01_f64.powi(2))
}
