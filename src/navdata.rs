//! Navigation context: wavelengths, biases, antennas, correction products
use gnss::prelude::{Constellation, SV};
use hifitime::Epoch;
use nalgebra::Vector3;

use crate::{
    carrier::Carrier,
    constants::NFREQ,
    geodesy::Geodetic,
    observation::Code,
    state::satellite::{slot, sv_from_slot, MAX_SAT},
};

/// Antenna phase center model for one antenna (satellite or receiver).
/// Offsets are expressed in the local antenna frame: ENU for a receiver,
/// boresight-aligned for a satellite. Variations are sampled on a fixed
/// angular grid and linearly interpolated.
#[derive(Debug, Clone)]
pub struct AntennaPcv {
    /// Antenna type name, e.g. "BLOCK IIA". Drives the eclipse filter.
    pub type_name: String,

    /// Per-frequency phase center offsets (m)
    pub pco_m: [[f64; 3]; NFREQ],

    /// Per-frequency phase center variations (m), 19 samples.
    /// Satellite antennas: 1° nadir bins over 0..18°.
    /// Receiver antennas: 5° zenith-angle bins over 0..90°.
    pub pcv_m: [[f64; 19]; NFREQ],
}

impl Default for AntennaPcv {
    fn default() -> Self {
        Self {
            type_name: Default::default(),
            pco_m: [[0.0; 3]; NFREQ],
            pcv_m: [[0.0; 19]; NFREQ],
        }
    }
}

impl AntennaPcv {
    /// Linear interpolation into one variation table,
    /// clamped at both grid ends.
    fn interpolate(table: &[f64; 19], bin: f64) -> f64 {
        if bin <= 0.0 {
            table[0]
        } else if bin >= 18.0 {
            table[18]
        } else {
            let i = bin.floor() as usize;
            table[i] + (table[i + 1] - table[i]) * (bin - i as f64)
        }
    }

    /// Satellite antenna correction (m) per frequency, at given
    /// nadir angle.
    pub(crate) fn nadir_corrections(&self, nadir_rad: f64) -> [f64; NFREQ] {
        let bin = nadir_rad.to_degrees();
        let mut dant = [0.0; NFREQ];
        for (f, table) in self.pcv_m.iter().enumerate() {
            dant[f] = Self::interpolate(table, bin);
        }
        dant
    }

    /// Receiver antenna correction (m) per frequency: projected
    /// phase center offset (+ antenna reference point), plus the
    /// zenith-angle dependent variation when enabled.
    pub(crate) fn receiver_corrections(
        &self,
        arp_enu_m: &Vector3<f64>,
        azimuth_rad: f64,
        elevation_rad: f64,
        with_pcv: bool,
    ) -> [f64; NFREQ] {
        let (sin_az, cos_az) = azimuth_rad.sin_cos();
        let (sin_el, cos_el) = elevation_rad.sin_cos();

        // unit line of sight, receiver antenna frame (ENU)
        let e = Vector3::new(sin_az * cos_el, cos_az * cos_el, sin_el);

        let zenith_bin = (90.0 - elevation_rad.to_degrees()) / 5.0;

        let mut dant = [0.0; NFREQ];
        for f in 0..NFREQ {
            let pco = Vector3::new(self.pco_m[f][0], self.pco_m[f][1], self.pco_m[f][2]);
            dant[f] = -e.dot(&(pco + arp_enu_m));
            if with_pcv {
                dant[f] += Self::interpolate(&self.pcv_m[f], zenith_bin);
            }
        }
        dant
    }
}

/// External slant TEC product sample: per-slot slant delays on the
/// first frequency, with their standard deviations.
#[derive(Debug, Clone)]
pub struct StecRecord {
    /// Product [Epoch]
    pub time: Epoch,
    /// Slant delay per arena slot (m), 0 when unavailable
    pub iono_m: Vec<f64>,
    /// Standard deviation per arena slot (m)
    pub std_m: Vec<f64>,
}

/// External correction products (regional PPP augmentation).
#[derive(Debug, Clone, Default)]
pub struct ExternalCorrections {
    /// Zenith tropospheric products: epoch, (ztd, grad_n, grad_e)
    /// values and standard deviations.
    pub ztd: Vec<(Epoch, [f64; 3], [f64; 3])>,

    /// Slant TEC products.
    pub stec: Vec<StecRecord>,
}

impl ExternalCorrections {
    /// Zenith troposphere product closest to this epoch,
    /// within a 2 minute tolerance.
    pub(crate) fn tropo_at(&self, t: Epoch) -> Option<(&[f64; 3], &[f64; 3])> {
        self.ztd
            .iter()
            .filter(|(t_i, _, _)| (*t_i - t).abs().to_seconds() < 120.0)
            .min_by_key(|(t_i, _, _)| (*t_i - t).abs())
            .map(|(_, values, stds)| (values, stds))
    }

    /// Slant TEC product closest to this epoch, within a
    /// 2 minute tolerance.
    pub(crate) fn stec_at(&self, t: Epoch) -> Option<&StecRecord> {
        self.stec
            .iter()
            .filter(|rec| (rec.time - t).abs().to_seconds() < 120.0)
            .min_by_key(|rec| (rec.time - t).abs())
    }
}

/// Map-based ionospheric delay provider (TEC grids, SBAS grids).
/// Returns the L1 slant delay (m) and its variance (m²), or None
/// when the map does not cover the pierce point.
pub trait IonoMapModel {
    fn delay(
        &self,
        t: Epoch,
        position: &Geodetic,
        azimuth_rad: f64,
        elevation_rad: f64,
    ) -> Option<(f64, f64)>;
}

/// Navigation context shared by all epochs of a session: wavelength
/// tables, code biases, antenna models and correction products.
pub struct NavData {
    /// Carrier wavelength per arena slot and frequency (m),
    /// 0 when the signal does not exist.
    pub wavelengths_m: Vec<[f64; NFREQ]>,

    /// Satellite code biases per slot: [P1-P2, P1-C1, P2-C2] (m)
    pub code_bias_m: Vec<[f64; 3]>,

    /// Receiver P2 differential code bias, [0] GPS, [1] Glonass (m)
    pub receiver_dcb_m: [f64; 2],

    /// SSR code biases per slot, indexed by [Code::index] (m)
    pub ssr_code_bias_m: Vec<[f64; Code::COUNT]>,

    /// Satellite antenna models per slot
    pub satellite_antenna: Vec<AntennaPcv>,

    /// Receiver antenna model
    pub receiver_antenna: AntennaPcv,

    /// Antenna reference point offset, ENU (m)
    pub receiver_arp_enu_m: Vector3<f64>,

    /// Broadcast (Klobuchar) ionosphere coefficients
    pub klobuchar: Option<[f64; 8]>,

    /// External regional correction products
    pub corrections: Option<ExternalCorrections>,

    /// Global TEC map provider
    pub tec_model: Option<Box<dyn IonoMapModel>>,

    /// SBAS ionosphere grid provider
    pub sbas_iono: Option<Box<dyn IonoMapModel>>,
}

impl Default for NavData {
    fn default() -> Self {
        Self::new()
    }
}

impl NavData {
    /// Builds a [NavData] context with nominal wavelengths and
    /// empty bias and antenna tables.
    pub fn new() -> Self {
        let mut wavelengths_m = vec![[0.0; NFREQ]; MAX_SAT];

        for (slot, lambda) in wavelengths_m.iter_mut().enumerate() {
            if let Some(sv) = sv_from_slot(slot) {
                for (f, value) in lambda.iter_mut().enumerate() {
                    if let Some(carrier) = Carrier::from_band(sv.constellation, f) {
                        *value = carrier.wavelength();
                    }
                }
            }
        }

        Self {
            wavelengths_m,
            code_bias_m: vec![[0.0; 3]; MAX_SAT],
            receiver_dcb_m: [0.0; 2],
            ssr_code_bias_m: vec![[0.0; Code::COUNT]; MAX_SAT],
            satellite_antenna: vec![AntennaPcv::default(); MAX_SAT],
            receiver_antenna: AntennaPcv::default(),
            receiver_arp_enu_m: Vector3::zeros(),
            klobuchar: None,
            corrections: None,
            tec_model: None,
            sbas_iono: None,
        }
    }

    /// Redefine a Glonass FDMA frequency channel (-7..=6),
    /// updating the two FDMA wavelengths of that satellite.
    pub fn set_glonass_channel(&mut self, sv: SV, channel: i8) {
        if sv.constellation != Constellation::Glonass {
            return;
        }
        if let Some(slot) = slot(sv) {
            self.wavelengths_m[slot][0] = Carrier::G1.fdma_wavelength(channel);
            self.wavelengths_m[slot][1] = Carrier::G2.fdma_wavelength(channel);
        }
    }

    /// Carrier wavelength (m) for this slot and frequency,
    /// 0 when the signal does not exist.
    pub(crate) fn wavelength_m(&self, slot: usize, freq: usize) -> f64 {
        if freq < NFREQ {
            self.wavelengths_m[slot][freq]
        } else {
            0.0
        }
    }
}
