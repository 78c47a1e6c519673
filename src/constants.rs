/// Speed of light in m.s⁻¹
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Earth angular velocity, in WGS84 frame rad/s
pub const EARTH_ANGULAR_VEL_RAD_S: f64 = 7.2921151467E-5;

/// WGS84 Earth Frame Ellipsoid semi-major axis
pub const EARTH_SEMI_MAJOR_AXIS_M: f64 = 6378137.0_f64;

/// Number of signal frequencies we may process per satellite.
pub const NFREQ: usize = 3;

/// Number of estimated receiver clocks (GPS/QZSS/SBAS, Glonass, Galileo, BDS).
pub const NSYS: usize = 4;

/// Maximal number of measurement-update iterations per epoch
pub const MAX_ITER: usize = 8;

/// Maximal 3D standard deviation to retain an ambiguity-fixed solution (m)
pub const MAX_STD_FIX_M: f64 = 0.15;

/// Minimal number of valid satellites to form a solution
pub const MIN_NSAT_SOL: usize = 4;

/// Post-fit residual rejection threshold (sigmas)
pub const THRES_REJECT: f64 = 4.0;

/// Maximal epoch-to-epoch Melbourne-Wübbena jump before arc reset (m)
pub const MW_GAP_MAX: f64 = 10.0;

/// Melbourne-Wübbena running-average arc saturation (epochs)
pub const MW_ARC_MAX: u32 = 100;

/// Melbourne-Wübbena minimal slip threshold (m)
pub const MW_CS_MIN: f64 = 0.8;

/// Initial variance of receiver position (m²)
pub const VAR_POS: f64 = 60.0 * 60.0;

/// Initial variance of receiver velocity ((m/s)²)
pub const VAR_VEL: f64 = 10.0 * 10.0;

/// Initial variance of receiver acceleration ((m/s²)²)
pub const VAR_ACC: f64 = 10.0 * 10.0;

/// Initial variance of receiver clock (m²)
pub const VAR_CLK: f64 = 60.0 * 60.0;

/// Initial variance of zenith tropospheric delay (m²)
pub const VAR_ZTD: f64 = 0.6 * 0.6;

/// Initial variance of tropospheric gradients (m²)
pub const VAR_GRA: f64 = 0.01 * 0.01;

/// Initial variance of the receiver DCB (m²)
pub const VAR_DCB: f64 = 30.0 * 30.0;

/// Initial variance of carrier-phase biases (m²)
pub const VAR_BIAS: f64 = 60.0 * 60.0;

/// Initial variance of slant ionospheric delay (m²)
pub const VAR_IONO: f64 = 60.0 * 60.0;

/// Variance of the Glonass code inter-frequency hardware bias (m²)
pub const VAR_GLO_IFB: f64 = 0.6 * 0.6;

/// Saastamoinen model error std (m)
pub const ERR_SAAS: f64 = 0.3;

/// Broadcast ionosphere model error factor
pub const ERR_BRDCI: f64 = 0.5;

/// Relative humidity assumed by the Saastamoinen model
pub const REL_HUMI: f64 = 0.7;

/// Default outage (epochs) before slant ionosphere states are reset
pub const GAP_RESION: u32 = 120;

/// Measurement error factor, GPS/QZSS/Galileo/BDS
pub const EFACT_GPS: f64 = 1.0;

/// Measurement error factor, Glonass
pub const EFACT_GLO: f64 = 1.5;

/// Measurement error factor, SBAS
pub const EFACT_SBS: f64 = 3.0;

/// Extra measurement error factor of GPS/QZSS L5
pub const EFACT_GPS_L5: f64 = 10.0;
