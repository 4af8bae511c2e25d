//! # Stochastic solver
//!
//! Advances one cell from `t` to `tstop` by direct simulation.
//!
//! ## Algorithm
//! Each outer iteration:
//! 1. with weighted coagulation and adaptive inception weighting, set the incepting weight
//!    from the current number of computational particles
//! 2. choose the split end time `tsplit`: with deferred processes and a non-empty cell
//!    `t + (N + 1) r / (jrate + 1)` (at most `tstop`), otherwise `tstop`
//! 3. until `tsplit`: draw an exponential waiting time with the total jump rate; if the
//!    event falls before `tsplit`, select the rate term by DIV and perform it, otherwise
//!    stop exactly at `tsplit`. Particle streams are processed after every step.
//! 4. bring all particles up to `tsplit` with the deferred processes (LPDA), then the
//!    particle-number register in hybrid mode
//!
//! The run always ends exactly at `tstop`. A failing process aborts the run with a
//! `SolverError` carrying the time of failure; `status()` gives the signed status code.
use crate::Particles::ensemble::EnsembleError;
use crate::Processes::mechanism::Mechanism;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ProcessError};
use crate::StochasticSolver::cell::{Cell, CellStats};
use crate::StochasticSolver::gas_state::GasProfile;
use crate::Utils::random::{RngType, exponential_deviate, uniform01};
use log::{debug, info, warn};
use prettytable::{Table, row};
use rand::RngCore;
use rayon::prelude::*;
use thiserror::Error;

/// Default ratio of the split step to the mean time between jump events
pub const DEFAULT_SPLIT_RATIO: f64 = 1.0e9;

/// Smallest representable time after `t`.
fn next_after(t: f64) -> f64 {
    if t.is_nan() || t == f64::INFINITY {
        t
    } else if t == 0.0 {
        f64::from_bits(1)
    } else if t > 0.0 {
        f64::from_bits(t.to_bits() + 1)
    } else {
        f64::from_bits(t.to_bits() - 1)
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid time interval [{t}, {tstop}]")]
    InvalidInterval { t: f64, tstop: f64 },
    #[error("process failed at t = {t} s: {source}")]
    Process {
        t: f64,
        #[source]
        source: ProcessError,
    },
    #[error("cell setup failed: {0}")]
    Ensemble(#[from] EnsembleError),
}

impl SolverError {
    /// Negative status code of the failure
    pub fn status(&self) -> i32 {
        match self {
            SolverError::Process { source, .. } => source.status(),
            SolverError::InvalidInterval { .. } => -10,
            SolverError::Ensemble(_) => -11,
        }
    }
}

/// What one call of `Solver::run` did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub t_end: f64,
    /// selected events, performed or fictitious
    pub events: u64,
    pub fictitious: u64,
    /// LPDA splitting steps
    pub splits: u64,
}

impl RunSummary {
    /// Status code of a successful run
    pub fn status(&self) -> i32 {
        0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Solver {
    split_ratio: f64,
    geom: LocalGeometry,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(DEFAULT_SPLIT_RATIO)
    }
}

impl Solver {
    pub fn new(split_ratio: f64) -> Self {
        Self {
            split_ratio,
            geom: LocalGeometry::default(),
        }
    }
    pub fn with_geometry(mut self, geom: LocalGeometry) -> Self {
        self.geom = geom;
        self
    }
    pub fn split_ratio(&self) -> f64 {
        self.split_ratio
    }
    pub fn geometry(&self) -> &LocalGeometry {
        &self.geom
    }

    /// End of the next splitting step for `n` particles and total jump rate `jrate`.
    /// Always later than `t` while `t < tstop`, even when `dt` is lost to rounding.
    pub fn calc_split_time(&self, t: f64, tstop: f64, jrate: f64, n: u64) -> f64 {
        let dt = (n as f64 + 1.0) * self.split_ratio / (jrate + 1.0);
        (t + dt).max(next_after(t)).min(tstop)
    }

    /// DIV selection: index `i` with probability `rates[i] / sum(rates)`.
    /// None when all rates are zero.
    pub fn choose_index(rates: &[f64], rng: &mut dyn RngCore) -> Option<usize> {
        let sum: f64 = rates.iter().sum();
        if !(sum > 0.0) {
            return None;
        }
        let mut r = uniform01(rng) * sum;
        for (i, rate) in rates.iter().enumerate() {
            if r < *rate {
                return Some(i);
            }
            r -= rate;
        }
        // rounding left r just above the last interval
        rates.iter().rposition(|x| *x > 0.0)
    }

    /// Installs the particle-number register templates of a hybrid mechanism.
    pub fn initialise_pn_particles(&self, t: f64, cell: &mut Cell, mech: &Mechanism) {
        if !mech.is_hybrid() {
            return;
        }
        cell.particles_mut().pn_mut().initialise(mech.pn_templates(t));
        info!(
            "particle-number register initialised with threshold {}",
            mech.hybrid_threshold()
        );
    }

    fn update_inception_weight(cell: &mut Cell, mech: &Mechanism) {
        if !mech.is_weighted_coag() {
            return;
        }
        if let Some(weighting) = mech.inception_weighting() {
            let n = cell.particle_count() as f64;
            let capacity = cell.particles().capacity() as f64;
            cell.set_incepting_weight(weighting.weight(n, capacity));
        }
    }

    /// One jump event, or a truncated step to `tstop`.
    #[allow(clippy::too_many_arguments)]
    fn time_step(
        &self,
        t: &mut f64,
        tstop: f64,
        cell: &mut Cell,
        mech: &Mechanism,
        rates: &[f64],
        jrate: f64,
        rng: &mut dyn RngCore,
        summary: &mut RunSummary,
    ) -> Result<(), SolverError> {
        let dt = exponential_deviate(jrate, rng);
        if *t + dt <= tstop {
            let tev = *t + dt;
            if let Some(term) = Self::choose_index(rates, rng) {
                let outcome = mech
                    .do_process(term, tev, cell, &self.geom, rng)
                    .map_err(|source| SolverError::Process { t: tev, source })?;
                summary.events += 1;
                if outcome == EventOutcome::Fictitious {
                    summary.fictitious += 1;
                }
            }
            *t = tev;
        } else {
            *t = tstop;
        }
        Ok(())
    }

    /// Advances `cell` from `t` to `tstop`.
    pub fn run(
        &self,
        t: f64,
        tstop: f64,
        cell: &mut Cell,
        mech: &Mechanism,
        rng: &mut dyn RngCore,
    ) -> Result<RunSummary, SolverError> {
        if !t.is_finite() || !tstop.is_finite() || tstop < t {
            return Err(SolverError::InvalidInterval { t, tstop });
        }
        let mut t = t;
        let mut tflow = t;
        let mut rates = Vec::with_capacity(mech.term_count());
        let mut summary = RunSummary::default();
        let has_flow = cell.inflow_count() > 0 || cell.outflow_count() > 0;

        while t < tstop {
            Self::update_inception_weight(cell, mech);

            let tin = t;
            let n = cell.total_particle_number();
            let tsplit = if mech.any_deferred() && n > 0 {
                let jrate = mech.calc_jump_rate_terms(t, cell, &self.geom, &mut rates);
                self.calc_split_time(t, tstop, jrate, n)
            } else {
                tstop
            };

            while t < tsplit {
                let jrate = mech.calc_jump_rate_terms(t, cell, &self.geom, &mut rates);
                self.time_step(&mut t, tsplit, cell, mech, &rates, jrate, rng, &mut summary)?;
                if has_flow {
                    mech.do_particle_flow(t, t - tflow, cell, &self.geom, rng);
                }
                tflow = t;
            }

            mech.lpda(t, cell, rng)
                .map_err(|source| SolverError::Process { t, source })?;
            if mech.is_hybrid() && cell.particles().pn().total() > 0 {
                cell.particles_mut().pn_mut().recalc_sums();
                mech.update_sections(t, t - tin, cell, rng)
                    .map_err(|source| SolverError::Process { t, source })?;
            }
            summary.splits += 1;
        }
        summary.t_end = t;
        debug!(
            "run to t = {t:.6e} s: {} events ({} fictitious), {} splits, {} particles",
            summary.events,
            summary.fictitious,
            summary.splits,
            cell.particle_count()
        );
        Ok(summary)
    }

    /// Runs `cell` through the output times, taking the gas state of each interval from
    /// `profile` at its start and reporting to `observer` after each interval.
    /// Output times not after the current time are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn run_profile(
        &self,
        t0: f64,
        output_times: &[f64],
        cell: &mut Cell,
        mech: &Mechanism,
        profile: &dyn GasProfile,
        observer: &mut dyn SolverObserver,
        rng: &mut dyn RngCore,
    ) -> Result<RunSummary, SolverError> {
        let mut t = t0;
        let mut total = RunSummary {
            t_end: t0,
            ..Default::default()
        };
        observer.on_output(t, cell);
        for &tout in output_times {
            if tout <= t {
                warn!("output time {tout} is not after t = {t}, skipped");
                continue;
            }
            let mut gas = profile.gas_state_at(t);
            if !cell.fixed_chem() {
                // the particles have been consuming the gas: keep the cell's own composition
                gas = gas.with_concentrations(cell.gas().concentrations().clone());
            }
            cell.set_gas(gas);
            let summary = self.run(t, tout, cell, mech, rng)?;
            total.events += summary.events;
            total.fictitious += summary.fictitious;
            total.splits += summary.splits;
            t = summary.t_end;
            total.t_end = t;
            observer.on_output(t, cell);
        }
        Ok(total)
    }

    /// Runs independent cells side by side on the rayon thread pool. Each cell brings its own
    /// random number stream; the mechanism is shared.
    pub fn run_cells_parallel(
        &self,
        t: f64,
        tstop: f64,
        cells: &mut [(Cell, RngType)],
        mech: &Mechanism,
    ) -> Vec<Result<RunSummary, SolverError>> {
        cells
            .par_iter_mut()
            .map(|(cell, rng)| self.run(t, tstop, cell, mech, rng))
            .collect()
    }
}

/// Receives the cell state at every output time of `Solver::run_profile`.
pub trait SolverObserver {
    fn on_output(&mut self, t: f64, cell: &Cell);
}

/// Collects `CellStats` at every output time.
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder {
    records: Vec<(f64, CellStats)>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn records(&self) -> &[(f64, CellStats)] {
        &self.records
    }
    pub fn last(&self) -> Option<&(f64, CellStats)> {
        self.records.last()
    }

    /// Time series of the main moments
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["t, s", "N, 1/m3", "M, kg/m3", "d_coll, m", "sint. level", "SP count"]);
        for (t, s) in self.records.iter() {
            table.add_row(row![
                format!("{t:.4e}"),
                format!("{:.4e}", s.number_density),
                format!("{:.4e}", s.mass_density),
                format!("{:.4e}", s.mean_coll_diameter),
                format!("{:.4}", s.mean_sintering_level),
                s.particle_count
            ]);
        }
        table
    }
}

impl SolverObserver for StatsRecorder {
    fn on_output(&mut self, t: f64, cell: &Cell) {
        self.records.push((t, cell.stats()));
    }
}
