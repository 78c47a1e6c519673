//! Filter state layout
use crate::{
    cfg::{Config, IonoOpt, TropOpt},
    constants::NSYS,
    state::satellite::MAX_SAT,
};

/// Semantic description of one filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Receiver position component (0..3, ECEF m)
    Position(usize),
    /// Receiver velocity component (0..3, ECEF m/s), dynamics only
    Velocity(usize),
    /// Receiver acceleration component (0..3, ECEF m/s²), dynamics only
    Acceleration(usize),
    /// Receiver clock for one system (m)
    Clock(usize),
    /// Zenith wet tropospheric delay (m)
    TropZenith,
    /// Tropospheric gradient, 0 north 1 east (m)
    TropGradient(usize),
    /// Slant ionospheric delay of one satellite slot (m)
    Iono(usize),
    /// Third-frequency receiver DCB (m)
    ReceiverDcb,
    /// Carrier phase bias of one satellite slot on one frequency (m)
    Bias { slot: usize, freq: usize },
}

/// Deterministic mapping from semantic [Parameter]s to flat state
/// indices. Pure function of [Config]: the layout is fixed at session
/// start. The ordering (position, clocks, troposphere, ionosphere,
/// DCB, biases) is relied upon by the time update and by status
/// consumers expecting contiguous blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateIndexer {
    np: usize,
    nc: usize,
    nt: usize,
    ni: usize,
    nd: usize,
    nf: usize,
}

impl StateIndexer {
    /// Build the [StateIndexer] this [Config] implies.
    pub fn new(cfg: &Config) -> Self {
        Self {
            np: if cfg.dynamics { 9 } else { 3 },
            nc: NSYS,
            nt: match cfg.tropo {
                TropOpt::Estimate | TropOpt::Ztd => 1,
                TropOpt::EstimateWithGradients => 3,
                _ => 0,
            },
            ni: if cfg.iono == IonoOpt::Estimate {
                MAX_SAT
            } else {
                0
            },
            nd: if cfg.nf >= 3 { 1 } else { 0 },
            nf: if cfg.iono == IonoOpt::IonoFree {
                1
            } else {
                cfg.nf
            },
        }
    }

    /// Number of estimated frequencies (1 for the iono-free combination).
    pub fn nf(&self) -> usize {
        self.nf
    }

    /// Number of position (+velocity +acceleration) states.
    pub fn np(&self) -> usize {
        self.np
    }

    /// Number of receiver clock states.
    pub fn nc(&self) -> usize {
        self.nc
    }

    /// Number of tropospheric states.
    pub fn nt(&self) -> usize {
        self.nt
    }

    /// Number of slant ionosphere states.
    pub fn ni(&self) -> usize {
        self.ni
    }

    /// Number of receiver DCB states.
    pub fn nd(&self) -> usize {
        self.nd
    }

    /// Number of carrier bias states.
    pub fn nb(&self) -> usize {
        self.nf * MAX_SAT
    }

    /// Number of non-ambiguity states.
    pub fn nr(&self) -> usize {
        self.np + self.nc + self.nt + self.ni + self.nd
    }

    /// Total state vector size.
    pub fn nx(&self) -> usize {
        self.nr() + self.nb()
    }

    /// First receiver position index.
    pub fn position(&self) -> usize {
        0
    }

    /// Receiver clock index for given system.
    pub fn clock(&self, sys: usize) -> usize {
        debug_assert!(sys < self.nc);
        self.np + sys
    }

    /// Zenith wet delay index (gradients follow).
    pub fn tropo(&self) -> usize {
        self.np + self.nc
    }

    /// Slant ionosphere index for given satellite slot.
    pub fn iono(&self, slot: usize) -> usize {
        debug_assert!(self.ni > 0 && slot < MAX_SAT);
        self.np + self.nc + self.nt + slot
    }

    /// Receiver DCB index.
    pub fn dcb(&self) -> usize {
        self.np + self.nc + self.nt + self.ni
    }

    /// Carrier bias index for given satellite slot and frequency.
    pub fn bias(&self, slot: usize, freq: usize) -> usize {
        debug_assert!(slot < MAX_SAT && freq < self.nf);
        self.nr() + MAX_SAT * freq + slot
    }

    /// Flat index of any [Parameter].
    pub fn index_of(&self, parameter: Parameter) -> usize {
        match parameter {
            Parameter::Position(axis) => axis,
            Parameter::Velocity(axis) => 3 + axis,
            Parameter::Acceleration(axis) => 6 + axis,
            Parameter::Clock(sys) => self.clock(sys),
            Parameter::TropZenith => self.tropo(),
            Parameter::TropGradient(axis) => self.tropo() + 1 + axis,
            Parameter::Iono(slot) => self.iono(slot),
            Parameter::ReceiverDcb => self.dcb(),
            Parameter::Bias { slot, freq } => self.bias(slot, freq),
        }
    }
}
