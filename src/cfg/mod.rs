use gnss::prelude::{Constellation, SV};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::GAP_RESION;

/// Receiver motion profile.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Roaming receiver.
    #[default]
    Kinematic,
    /// Static receiver: position states random-walk very slowly.
    Static,
    /// Receiver pinned to known ground-truth coordinates;
    /// only the remaining states are estimated.
    Fixed,
}

/// Ionospheric delay handling.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IonoOpt {
    /// No compensation at all.
    Off,
    /// Broadcast (Klobuchar) model.
    Broadcast,
    /// First order delay cancelled by the iono-free combination.
    #[default]
    IonoFree,
    /// Per-satellite slant delays estimated as filter states.
    Estimate,
    /// Global TEC map product.
    TecMap,
    /// External slant TEC product.
    Stec,
    /// SBAS grid correction.
    Sbas,
}

/// Tropospheric delay handling.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TropOpt {
    /// No compensation at all.
    Off,
    /// Saastamoinen model.
    #[default]
    Saastamoinen,
    /// Wide-area (SBAS) model.
    Sbas,
    /// Zenith wet delay estimated as a filter state.
    Estimate,
    /// Zenith wet delay and two horizontal gradients estimated.
    EstimateWithGradients,
    /// External zenith delay product.
    Ztd,
}

/// Ambiguity resolution strategy.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArMode {
    /// Float ambiguities only.
    #[default]
    Off,
    /// Continuous resolution over stable arcs.
    Continuous,
    /// Single-epoch resolution: ambiguities reset every epoch.
    Instantaneous,
    /// Continuous resolution, feeding fixes back into the
    /// float filter after enough consecutive successes.
    FixAndHold,
}

/// Measurement noise weighting strategy.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WeightMode {
    /// Elevation dependent: a² + b²/sin²(el)
    #[default]
    Elevation,
    /// SNR dependent: a² 10^(0.1 max(snr_max - snr, 0))
    Snr,
}

fn default_nf() -> usize {
    2
}

fn default_process_noise() -> [f64; 6] {
    // phase bias, iono, trop, acc horizontal, acc vertical, position
    [1.0E-4, 1.0E-3, 1.0E-4, 1.0E-1, 1.0E-2, 0.0]
}

fn default_error_model() -> [f64; 6] {
    // [1] carrier base error, [2] elevation term (m), [5] snr reference (dB-Hz)
    [100.0, 0.003, 0.003, 0.0, 1.0, 52.0]
}

fn default_eratio() -> [f64; 2] {
    [100.0, 100.0]
}

fn default_elevation_mask() -> f64 {
    10.0_f64.to_radians()
}

fn default_maxout() -> u32 {
    5
}

fn default_minfix() -> u32 {
    10
}

fn default_slip_threshold() -> f64 {
    0.05
}

/// [Config]uration of the PPP [crate::prelude::Estimator].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Receiver motion [Mode].
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: Mode,

    /// Model receiver velocity and acceleration states.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dynamics: bool,

    /// Number of processed signal frequencies (1..=3).
    #[cfg_attr(feature = "serde", serde(default = "default_nf"))]
    pub nf: usize,

    /// Ionospheric delay handling.
    #[cfg_attr(feature = "serde", serde(default))]
    pub iono: IonoOpt,

    /// Tropospheric delay handling.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tropo: TropOpt,

    /// Ambiguity resolution strategy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ar_mode: ArMode,

    /// Measurement weighting strategy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub weight: WeightMode,

    /// Process noise standard deviations:
    /// [0] carrier bias (m/√s), [1] slant iono (m/√s),
    /// [2] zenith trop (m/√s), [3] horizontal acceleration (m/s²/√s),
    /// [4] vertical acceleration (m/s²/√s), [5] static position (m/√s).
    #[cfg_attr(feature = "serde", serde(default = "default_process_noise"))]
    pub process_noise: [f64; 6],

    /// Measurement error model terms, see [WeightMode].
    #[cfg_attr(feature = "serde", serde(default = "default_error_model"))]
    pub error_model: [f64; 6],

    /// Code/carrier error ratio per frequency group.
    #[cfg_attr(feature = "serde", serde(default = "default_eratio"))]
    pub eratio: [f64; 2],

    /// Elevation mask (radians).
    #[cfg_attr(feature = "serde", serde(default = "default_elevation_mask"))]
    pub min_elevation_rad: f64,

    /// SNR mask (dB-Hz), 0 disables the mask.
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_snr_dbhz: f64,

    /// Outage (epochs) after which a carrier bias is reset.
    #[cfg_attr(feature = "serde", serde(default = "default_maxout"))]
    pub max_outage: u32,

    /// Pre-fit innovation rejection threshold (m), 0 disables it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_innovation_m: f64,

    /// Consecutive fixes required before holding ambiguities.
    #[cfg_attr(feature = "serde", serde(default = "default_minfix"))]
    pub min_consecutive_fixes: u32,

    /// Geometry-free cycle slip threshold (m).
    #[cfg_attr(feature = "serde", serde(default = "default_slip_threshold"))]
    pub slip_threshold_m: f64,

    /// Ground truth coordinates for [Mode::Fixed].
    #[cfg_attr(feature = "serde", serde(default))]
    pub fixed_position_ecef_m: (f64, f64, f64),

    /// Satellites excluded by the user.
    #[cfg_attr(feature = "serde", serde(default))]
    pub excluded_sv: Vec<SV>,

    /// Apply the solid-tide displacement provided with each epoch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tide_correction: bool,

    /// Apply satellite antenna phase center variations.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sat_antenna_pcv: bool,

    /// Apply receiver antenna phase center variations.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rec_antenna_pcv: bool,

    /// Model carrier phase windup.
    #[cfg_attr(feature = "serde", serde(default))]
    pub phase_windup: bool,

    /// Exclude eclipsing Block IIA satellites.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reject_eclipse: bool,

    /// Reset all carrier biases when crossing the day boundary,
    /// where precise clock products typically jump.
    #[cfg_attr(feature = "serde", serde(default))]
    pub handle_day_boundary: bool,

    /// Observations were corrected with SSR ephemerides: select the
    /// SSR code bias path of the observable corrector.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ssr_ephemerides: bool,

    /// Force the second frequency index of the iono-free pairing,
    /// overriding the per-constellation default (L1/L2 for GPS, QZSS
    /// and Glonass, L1/third-frequency for Galileo, SBAS and BDS).
    #[cfg_attr(feature = "serde", serde(default))]
    pub iflc_pair: Option<usize>,

    /// Free-form sub-options, e.g. "-GAP_RESION=300".
    #[cfg_attr(feature = "serde", serde(default))]
    pub ppp_options: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Default::default(),
            dynamics: false,
            nf: default_nf(),
            iono: Default::default(),
            tropo: Default::default(),
            ar_mode: Default::default(),
            weight: Default::default(),
            process_noise: default_process_noise(),
            error_model: default_error_model(),
            eratio: default_eratio(),
            min_elevation_rad: default_elevation_mask(),
            min_snr_dbhz: 0.0,
            max_outage: default_maxout(),
            max_innovation_m: 30.0,
            min_consecutive_fixes: default_minfix(),
            slip_threshold_m: default_slip_threshold(),
            fixed_position_ecef_m: (0.0, 0.0, 0.0),
            excluded_sv: Default::default(),
            tide_correction: false,
            sat_antenna_pcv: false,
            rec_antenna_pcv: false,
            phase_windup: false,
            reject_eclipse: false,
            handle_day_boundary: false,
            ssr_ephemerides: false,
            iflc_pair: None,
            ppp_options: Default::default(),
        }
    }
}

impl Config {
    /// Returns [Config] for static PPP surveying.
    /// You can then customize [Self] as you will.
    pub fn static_ppp() -> Self {
        let mut s = Self::default();
        s.mode = Mode::Static;
        s.tropo = TropOpt::EstimateWithGradients;
        s.phase_windup = true;
        s.reject_eclipse = true;
        s
    }

    /// Returns [Config] for kinematic (roaming) PPP.
    /// You can then customize [Self] as you will.
    pub fn kinematic_ppp() -> Self {
        let mut s = Self::default();
        s.mode = Mode::Kinematic;
        s.tropo = TropOpt::Estimate;
        s.phase_windup = true;
        s.reject_eclipse = true;
        s
    }

    /// Outage (epochs) after which slant ionosphere states reset,
    /// possibly redefined by a "-GAP_RESION=" sub-option.
    pub(crate) fn gap_resion(&self) -> u32 {
        if let Some(offset) = self.ppp_options.find("-GAP_RESION=") {
            let value = &self.ppp_options[offset + "-GAP_RESION=".len()..];
            let digits = value
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            if let Ok(parsed) = digits.parse::<u32>() {
                return parsed;
            }
        }
        GAP_RESION
    }

    /// Second frequency index of the geometry-free, wide-lane and
    /// iono-free pairings, for this constellation.
    pub(crate) fn second_frequency(&self, constellation: Constellation) -> usize {
        if let Some(forced) = self.iflc_pair {
            return forced;
        }
        match constellation {
            Constellation::Galileo | Constellation::BeiDou => 2,
            c if c.is_sbas() => 2,
            _ => 1,
        }
    }

    /// Receiver clock state index for this constellation.
    /// QZSS and SBAS augmentations share the GPS clock.
    pub(crate) fn clock_state(constellation: Constellation) -> usize {
        match constellation {
            Constellation::Glonass => 1,
            Constellation::Galileo => 2,
            Constellation::BeiDou => 3,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Config, Mode, TropOpt};
    use gnss::prelude::Constellation;

    #[test]
    fn test_presets() {
        let cfg = Config::static_ppp();
        assert_eq!(cfg.mode, Mode::Static);
        assert_eq!(cfg.tropo, TropOpt::EstimateWithGradients);

        let cfg = Config::kinematic_ppp();
        assert_eq!(cfg.mode, Mode::Kinematic);
    }

    #[test]
    fn test_gap_resion() {
        let mut cfg = Config::default();
        assert_eq!(cfg.gap_resion(), 120);

        cfg.ppp_options = "-GAP_RESION=300".to_string();
        assert_eq!(cfg.gap_resion(), 300);

        cfg.ppp_options = "-VERBOSE -GAP_RESION=60 -OTHER".to_string();
        assert_eq!(cfg.gap_resion(), 60);
    }

    #[test]
    fn test_second_frequency() {
        let cfg = Config::default();
        assert_eq!(cfg.second_frequency(Constellation::GPS), 1);
        assert_eq!(cfg.second_frequency(Constellation::Glonass), 1);
        assert_eq!(cfg.second_frequency(Constellation::Galileo), 2);
        assert_eq!(cfg.second_frequency(Constellation::BeiDou), 2);

        let mut cfg = Config::default();
        cfg.iflc_pair = Some(1);
        assert_eq!(cfg.second_frequency(Constellation::BeiDou), 1);
    }

    #[test]
    fn test_clock_states() {
        assert_eq!(Config::clock_state(Constellation::GPS), 0);
        assert_eq!(Config::clock_state(Constellation::QZSS), 0);
        assert_eq!(Config::clock_state(Constellation::Glonass), 1);
        assert_eq!(Config::clock_state(Constellation::Galileo), 2);
        assert_eq!(Config::clock_state(Constellation::BeiDou), 3);
    }
}
