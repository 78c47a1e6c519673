//! PPP estimator: per-epoch extended Kalman filtering of
//! undifferenced observables.
use log::{debug, info, warn};
use nalgebra::Vector3;

use gnss::prelude::SV;
use hifitime::Epoch;

use crate::{
    ambiguity::{AmbiguityResolver, NoAmbiguityResolution},
    attitude::filter_eclipsed,
    bias::iono::StecCache,
    cfg::{ArMode, Config},
    constants::{MAX_ITER, MAX_STD_FIX_M, MIN_NSAT_SOL, NFREQ},
    error::Error,
    kalman::filter_update,
    navdata::NavData,
    observation::{Candidate, EpochInput},
    residuals::{residuals, Stage},
    solution::{Solution, SolutionStatus},
    state::{
        satellite::{slot, MAX_SAT},
        FilterState, SatelliteState, StateIndexer,
    },
    timeupdate::time_update,
};

/// Precise point positioning estimator: one instance per receiver
/// stream. [Estimator::process] consumes one epoch at a time and is
/// strictly sequential; the committed state is only replaced once
/// the whole epoch is accepted.
pub struct Estimator<AR: AmbiguityResolver = NoAmbiguityResolution> {
    /// [Config] preset, frozen at session start
    pub cfg: Config,

    /// State layout implied by the configuration
    pub(crate) indexer: StateIndexer,

    /// Filter state and covariance
    pub(crate) state: FilterState,

    /// Per-satellite arena
    pub(crate) ssat: Vec<SatelliteState>,

    /// Slant TEC product cache, per session
    pub(crate) stec_cache: StecCache,

    /// Last resolved [Solution]
    pub(crate) solution: Solution,

    /// Ambiguity search implementation
    resolver: AR,

    /// Consecutive ambiguity-fixed epochs (fix-and-hold)
    consecutive_fixes: u32,

    /// Previous processed [Epoch]
    last_epoch: Option<Epoch>,
}

impl Estimator<NoAmbiguityResolution> {
    /// Builds a float-only [Estimator] for this [Config].
    pub fn new(cfg: Config) -> Self {
        Self::with_resolver(cfg, NoAmbiguityResolution)
    }
}

impl<AR: AmbiguityResolver> Estimator<AR> {
    /// Builds an [Estimator] with a custom [AmbiguityResolver].
    pub fn with_resolver(cfg: Config, resolver: AR) -> Self {
        let indexer = StateIndexer::new(&cfg);
        Self {
            state: FilterState::new(indexer.nx()),
            ssat: vec![SatelliteState::default(); MAX_SAT],
            stec_cache: StecCache::default(),
            solution: Solution::default(),
            resolver,
            consecutive_fixes: 0,
            last_epoch: None,
            indexer,
            cfg,
        }
    }

    /// State layout of this session.
    pub fn indexer(&self) -> &StateIndexer {
        &self.indexer
    }

    /// Filter state and covariance.
    pub fn filter_state(&self) -> &FilterState {
        &self.state
    }

    /// Last resolved [Solution].
    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    /// Per-satellite diagnostics.
    pub fn satellite(&self, sv: SV) -> Option<&SatelliteState> {
        Some(&self.ssat[slot(sv)?])
    }

    /// Discards the session state: next epoch starts from scratch.
    pub fn reset(&mut self) {
        self.state = FilterState::new(self.indexer.nx());
        self.ssat = vec![SatelliteState::default(); MAX_SAT];
        self.stec_cache = StecCache::default();
        self.solution = Solution::default();
        self.consecutive_fixes = 0;
        self.last_epoch = None;
    }

    /// Processes one measurement epoch: time update, bounded
    /// measurement iteration with post-fit screening, optional
    /// ambiguity fixing, solution commit.
    ///
    /// ## Input
    /// - input: [EpochInput] proposal
    /// - nav: [NavData] context
    ///
    /// ## Output
    /// - [Solution] with reached status; [SolutionStatus::None]
    ///   when the epoch could not be accepted (the time update is
    ///   still applied).
    pub fn process(&mut self, input: &EpochInput, nav: &NavData) -> Result<Solution, Error> {
        let n = input.candidates.len();
        if n == 0 {
            return Err(Error::NoCandidates);
        }

        debug!(
            "{} - processing epoch, nx={} n={}",
            input.time,
            self.indexer.nx(),
            n
        );

        let tt_s = match self.last_epoch {
            Some(previous) => (input.time - previous).to_seconds(),
            None => 0.0,
        };
        self.last_epoch = Some(input.time);

        // epoch bookkeeping: visibility, SNR, fix flags
        for sat in self.ssat.iter_mut() {
            sat.vs = false;
        }
        for cand in input.candidates.iter() {
            if let Some(slot) = cand.slot() {
                self.ssat[slot].vs = true;
                for f in 0..NFREQ {
                    self.ssat[slot].snr_dbhz[f] = cand.observation.snr_dbhz[f];
                    self.ssat[slot].fix[f] = 0;
                }
            }
        }

        // temporal update of all states
        time_update(
            &self.cfg,
            &self.indexer,
            &mut self.state,
            &mut self.ssat,
            input,
            nav,
            tt_s,
        );

        // eclipse filter on a working copy of the proposal
        let mut candidates = input.candidates.clone();
        if self.cfg.reject_eclipse {
            filter_eclipsed(&mut candidates, nav, &input.sun_position_ecef_m);
        }

        let tide_m = if self.cfg.tide_correction {
            input.tide_displacement_m
        } else {
            Vector3::zeros()
        };

        let mut excluded = vec![false; n];
        let mut status = SolutionStatus::Single;
        let mut iterations = 0;

        while iterations < MAX_ITER {
            iterations += 1;

            let mut trial = self.state.clone();

            let prefit = residuals(
                Stage::Prefit,
                &self.cfg,
                &self.indexer,
                &self.state,
                &trial.x,
                nav,
                input,
                &candidates,
                &tide_m,
                &mut excluded,
                &mut self.ssat,
                &mut self.stec_cache,
            );

            if prefit.nv == 0 {
                warn!("{} - ({}) no valid observations", input.time, iterations);
                break;
            }

            if let Err(e) = filter_update(&mut trial, &prefit.h, &prefit.v, &prefit.r) {
                warn!("{} - ({}) filter error: {}", input.time, iterations, e);
                break;
            }

            let postfit = residuals(
                Stage::Postfit(iterations),
                &self.cfg,
                &self.indexer,
                &self.state,
                &trial.x,
                nav,
                input,
                &candidates,
                &tide_m,
                &mut excluded,
                &mut self.ssat,
                &mut self.stec_cache,
            );

            if postfit.accepted {
                // commit the iteration
                self.state.x.copy_from(&trial.x);
                self.state.p.copy_from(&trial.p);
                status = SolutionStatus::Float;
                break;
            }
            // one outlier was removed: retain the pre-update state
            // and iterate again
        }

        if iterations >= MAX_ITER && status != SolutionStatus::Float {
            warn!("{} - iteration overflow", input.time);
        }

        if status != SolutionStatus::Float {
            // epoch rejected: report, states stay time-updated
            self.solution = Solution {
                time: input.time,
                status: SolutionStatus::None,
                position_ecef_m: Vector3::new(self.state.x[0], self.state.x[1], self.state.x[2]),
                position_covar_m2: self.position_covariance(false),
                receiver_clock_m: self.receiver_clocks(),
                satellites: 0,
            };
            return Ok(self.solution.clone());
        }

        // ambiguity resolution attempt on the accepted float state
        if let Some(fixed) =
            self.resolver
                .resolve(&self.indexer, &candidates, &self.state.x, &self.state.p)
        {
            let validation = residuals(
                Stage::FixValidation,
                &self.cfg,
                &self.indexer,
                &self.state,
                &fixed.x,
                nav,
                input,
                &candidates,
                &tide_m,
                &mut excluded,
                &mut self.ssat,
                &mut self.stec_cache,
            );

            if validation.accepted {
                self.state.xa.copy_from(&fixed.x);
                self.state.pa.copy_from(&fixed.p);

                let std_3d =
                    (fixed.p[(0, 0)] + fixed.p[(1, 1)] + fixed.p[(2, 2)]).max(0.0).sqrt();

                if std_3d < MAX_STD_FIX_M {
                    status = SolutionStatus::Fixed;

                    for cand in candidates.iter() {
                        if let Some(slot) = cand.slot() {
                            for f in 0..self.cfg.nf.min(NFREQ) {
                                if self.ssat[slot].vsat[f] {
                                    self.ssat[slot].fix[f] = 2;
                                }
                            }
                        }
                    }
                }
            } else {
                self.consecutive_fixes = 0;
            }
        } else {
            self.consecutive_fixes = 0;
        }

        self.commit(status, input, &candidates);

        // fix-and-hold: feed the fixed state back into the filter
        if self.solution.status == SolutionStatus::Fixed && self.test_hold() {
            let xa = self.state.xa.clone();
            let pa = self.state.pa.clone();
            self.state.x.copy_from(&xa);
            self.state.p.copy_from(&pa);

            info!("{} - hold ambiguity", input.time);
            self.consecutive_fixes = 0;
        }

        Ok(self.solution.clone())
    }

    /// Packed position covariance (xx, yy, zz, xy, yz, zx) from
    /// the float or fixed matrix.
    fn position_covariance(&self, fixed: bool) -> [f64; 6] {
        let p = if fixed { &self.state.pa } else { &self.state.p };
        [
            p[(0, 0)],
            p[(1, 1)],
            p[(2, 2)],
            p[(0, 1)],
            p[(1, 2)],
            p[(2, 0)],
        ]
    }

    /// Receiver clock states (m): reference clock, then
    /// inter-system offsets against it.
    fn receiver_clocks(&self) -> [f64; crate::constants::NSYS] {
        let reference = self.state.x[self.indexer.clock(0)];
        let mut clocks = [0.0; crate::constants::NSYS];
        clocks[0] = reference;
        for (sys, clock) in clocks.iter_mut().enumerate().skip(1) {
            *clock = self.state.x[self.indexer.clock(sys)] - reference;
        }
        clocks
    }

    /// Solution commit: satellite counting, lock/outage counters,
    /// solution record, cumulative slip counters.
    fn commit(&mut self, status: SolutionStatus, input: &EpochInput, candidates: &[Candidate]) {
        let nf = self.cfg.nf.min(NFREQ);
        let mut satellites = 0;

        for cand in candidates.iter() {
            let slot = match cand.slot() {
                Some(slot) => slot,
                None => continue,
            };
            for f in 0..nf {
                if !self.ssat[slot].vsat[f] {
                    continue;
                }
                self.ssat[slot].lock[f] += 1;
                self.ssat[slot].outage[f] = 0;
                if f == 0 {
                    satellites += 1;
                }
            }
        }

        let status = if satellites < MIN_NSAT_SOL {
            SolutionStatus::None
        } else {
            status
        };

        let fixed = status == SolutionStatus::Fixed;
        let x = if fixed { &self.state.xa } else { &self.state.x };

        self.solution = Solution {
            time: input.time,
            status,
            position_ecef_m: Vector3::new(x[0], x[1], x[2]),
            position_covar_m2: self.position_covariance(fixed),
            receiver_clock_m: self.receiver_clocks(),
            satellites,
        };

        for sat in self.ssat.iter_mut() {
            for f in 0..nf {
                if (sat.slip[f] & 3) != 0 {
                    sat.slip_count[f] += 1;
                }
                if sat.fix[f] == 2 && status != SolutionStatus::Fixed {
                    sat.fix[f] = 1;
                }
            }
        }

        info!(
            "{} - {:?} solution, {} satellites",
            input.time, self.solution.status, satellites
        );
    }

    /// Fix-and-hold gate: enough consecutive fixes over a stable
    /// satellite pairing set.
    fn test_hold(&mut self) -> bool {
        if self.cfg.ar_mode != ArMode::FixAndHold {
            return false;
        }

        // a new pairing resets the consecutive-fix count
        let mut new_pairing = false;

        let fixed_slots = (0..MAX_SAT)
            .filter(|i| self.ssat[*i].fix[0] == 2 || self.ssat[*i].fix[1] == 2)
            .collect::<Vec<_>>();

        for i in fixed_slots.iter() {
            for j in fixed_slots.iter() {
                if !self.ssat[*j].pair_flags[*i] || !self.ssat[*i].pair_flags[*j] {
                    new_pairing = true;
                }
                self.ssat[*j].pair_flags[*i] = true;
                self.ssat[*i].pair_flags[*j] = true;
            }
        }

        if new_pairing {
            self.consecutive_fixes = 0;
            return false;
        }

        self.consecutive_fixes += 1;
        self.consecutive_fixes >= self.cfg.min_consecutive_fixes
    }
}
