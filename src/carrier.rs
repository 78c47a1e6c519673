use crate::{constants::SPEED_OF_LIGHT_M_S, prelude::Error};

use gnss::prelude::Constellation;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Signal [Carrier] frequencies processed by this library.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Carrier {
    /// [Carrier::L1] (1575.42) (GPS +QZSS +SBAS +Galileo E1)
    #[default]
    L1,
    /// [Carrier::L2] (1227.60) (GPS +QZSS)
    L2,
    /// [Carrier::L5] (1176.45) (GPS +QZSS +SBAS +Galileo E5a)
    L5,
    /// [Carrier::B1] (1561.098) (BDS)
    B1,
    /// [Carrier::B2] (1207.140) (BDS, Galileo E5b)
    B2,
    /// [Carrier::B3] (1268.52) (BDS)
    B3,
    /// [Carrier::G1] (1602.00 + k 0.5625) (Glonass FDMA)
    G1,
    /// [Carrier::G2] (1246.00 + k 0.4375) (Glonass FDMA)
    G2,
    /// [Carrier::G3] (1202.025) (Glonass)
    G3,
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
            Self::L5 => write!(f, "L5"),
            Self::B1 => write!(f, "B1"),
            Self::B2 => write!(f, "B2"),
            Self::B3 => write!(f, "B3"),
            Self::G1 => write!(f, "G1"),
            Self::G2 => write!(f, "G2"),
            Self::G3 => write!(f, "G3"),
        }
    }
}

impl std::str::FromStr for Carrier {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lowered = trimmed.to_lowercase();

        match lowered.as_str() {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            "l5" => Ok(Self::L5),
            "b1" => Ok(Self::B1),
            "b2" | "e5b" => Ok(Self::B2),
            "b3" => Ok(Self::B3),
            "g1" => Ok(Self::G1),
            "g2" => Ok(Self::G2),
            "g3" => Ok(Self::G3),
            _ => Err(Error::InvalidFrequency),
        }
    }
}

impl Carrier {
    /// Converts [Carrier] to exact frequency in MHz (FDMA center channel).
    pub fn frequency_mega_hz(&self) -> f64 {
        match self {
            Self::L1 => 1575.420_f64,
            Self::L2 => 1227.600_f64,
            Self::L5 => 1176.450_f64,
            Self::B1 => 1561.098,
            Self::B2 => 1207.140,
            Self::B3 => 1268.520,
            Self::G1 => 1602.000,
            Self::G2 => 1246.000,
            Self::G3 => 1202.025,
        }
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_mega_hz() * 1.0E6
    }

    /// Frequency in Hz for a Glonass FDMA channel number (-7..=6).
    /// Channel is ignored by CDMA carriers.
    pub fn fdma_frequency_hz(&self, channel: i8) -> f64 {
        match self {
            Self::G1 => 1602.0E6 + (channel as f64) * 562.5E3,
            Self::G2 => 1246.0E6 + (channel as f64) * 437.5E3,
            _ => self.frequency_hz(),
        }
    }

    pub fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT_M_S / self.frequency_hz()
    }

    /// Wavelength in meters for a Glonass FDMA channel number.
    pub fn fdma_wavelength(&self, channel: i8) -> f64 {
        SPEED_OF_LIGHT_M_S / self.fdma_frequency_hz(channel)
    }

    /// Nominal [Carrier] carried by this constellation on frequency
    /// index 0, 1 or 2. Galileo and SBAS have no second-band signal:
    /// their index 1 is empty, which is what makes the iono-free
    /// pairing of these systems use the third frequency.
    pub fn from_band(constellation: Constellation, band: usize) -> Option<Self> {
        match (constellation, band) {
            (Constellation::GPS | Constellation::QZSS, 0) => Some(Self::L1),
            (Constellation::GPS | Constellation::QZSS, 1) => Some(Self::L2),
            (Constellation::GPS | Constellation::QZSS, 2) => Some(Self::L5),
            (Constellation::Glonass, 0) => Some(Self::G1),
            (Constellation::Glonass, 1) => Some(Self::G2),
            (Constellation::Glonass, 2) => Some(Self::G3),
            (Constellation::Galileo, 0) => Some(Self::L1),
            (Constellation::Galileo, 2) => Some(Self::L5),
            (Constellation::BeiDou, 0) => Some(Self::B1),
            (Constellation::BeiDou, 1) => Some(Self::B2),
            (Constellation::BeiDou, 2) => Some(Self::B3),
            (c, 0) if c.is_sbas() => Some(Self::L1),
            (c, 2) if c.is_sbas() => Some(Self::L5),
            _ => None,
        }
    }
}
