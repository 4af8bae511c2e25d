//! # Process interface
//!
//! Every particle process (inception, surface reaction, coagulation, sintering, transport)
//! implements `ParticleProcess`; the closed set of variants is the `Process` enum, dispatched
//! statically with `enum_dispatch`.
//!
//! A process exposes one or more *rate terms* (e.g. the majorant sub-terms of coagulation).
//! The mechanism concatenates the terms of all processes into one rate vector; the solver
//! picks a term and the owning process performs the matching event.
//!
//! Status convention: a performed or rejected (fictitious) event is a non-negative status,
//! a `ProcessError` is a negative one.
use crate::Particles::particle::Particle;
use crate::Particles::particle_model::ParticleModel;
use crate::Processes::coagulation::Coagulation;
use crate::Processes::inception::Inception;
use crate::Processes::mechanism::Mechanism;
use crate::Processes::sintering::Sintering;
use crate::Processes::surface_reaction::{ActiveSitesReaction, SurfaceReaction};
use crate::Processes::transport::Transport;
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::GasState;
use crate::Utils::random::poisson_deviate;
use enum_dispatch::enum_dispatch;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of one selected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Performed,
    /// rejected by the majorant test; nothing changed
    Fictitious,
}

impl EventOutcome {
    pub fn status(&self) -> i32 {
        match self {
            EventOutcome::Performed => 0,
            EventOutcome::Fictitious => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("term {term} is out of range for process '{process}'")]
    UnknownTerm { process: String, term: usize },
    #[error("rate term {0} does not belong to any process")]
    UnknownProcessIndex(usize),
    #[error("process '{process}' produced an invalid particle")]
    InvalidParticle { process: String },
    #[error("sintering failed: {0}")]
    Sintering(String),
}

impl ProcessError {
    pub fn status(&self) -> i32 {
        match self {
            ProcessError::UnknownTerm { .. } => -1,
            ProcessError::UnknownProcessIndex(_) => -2,
            ProcessError::InvalidParticle { .. } => -3,
            ProcessError::Sintering(_) => -4,
        }
    }
}

/// Scaling of process rates by the local geometry of a cell (1 for a single well-mixed cell).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalGeometry {
    volume_scale: f64,
}

impl Default for LocalGeometry {
    fn default() -> Self {
        Self { volume_scale: 1.0 }
    }
}

impl LocalGeometry {
    pub fn new(volume_scale: f64) -> Self {
        Self { volume_scale }
    }
    pub fn volume_scale(&self) -> f64 {
        self.volume_scale
    }
}

#[enum_dispatch]
pub trait ParticleProcess {
    fn name(&self) -> &str;
    /// Number of rate terms contributed to the mechanism rate vector
    fn term_count(&self) -> usize;
    /// Deferred processes are applied in aggregate by LPDA instead of as jump events
    fn is_deferred(&self) -> bool;

    /// Fills `terms` (length `term_count()`) and returns their sum, events per second.
    fn rate_terms(
        &self,
        t: f64,
        cell: &Cell,
        mech: &Mechanism,
        geom: &LocalGeometry,
        terms: &mut [f64],
    ) -> f64;

    /// Total rate of the process in the cell, events per second.
    fn rate(&self, t: f64, cell: &Cell, mech: &Mechanism, geom: &LocalGeometry) -> f64 {
        let mut terms = vec![0.0; self.term_count()];
        self.rate_terms(t, cell, mech, geom, &mut terms)
    }

    /// Rate at which a single particle undergoes the process, 1/s.
    fn particle_rate(&self, _t: f64, _gas: &GasState, _particle: &Particle) -> f64 {
        0.0
    }

    /// Executes one event of rate term `term`.
    fn perform(
        &self,
        t: f64,
        cell: &mut Cell,
        term: usize,
        mech: &Mechanism,
        geom: &LocalGeometry,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError>;

    /// Applies `n` events to one particle; returns how many could be applied.
    fn perform_on_particle(
        &self,
        _t: f64,
        _gas: &GasState,
        _particle: &mut Particle,
        _model: &ParticleModel,
        _n: u64,
    ) -> u64 {
        0
    }

    /// Deferred update of one particle over `dt`: a Poisson number of events with mean
    /// `particle_rate * dt`. Returns the number of events applied.
    fn update_deferred(
        &self,
        t: f64,
        dt: f64,
        gas: &GasState,
        particle: &mut Particle,
        model: &ParticleModel,
        rng: &mut dyn RngCore,
    ) -> Result<u64, ProcessError> {
        let n = poisson_deviate(self.particle_rate(t, gas, particle) * dt, rng);
        if n > 0 {
            Ok(self.perform_on_particle(t, gas, particle, model, n))
        } else {
            Ok(0)
        }
    }

    /// Gas species consumed per event: (species index, molecules)
    fn gas_stoichiometry(&self) -> &[(usize, f64)] {
        &[]
    }
}

#[derive(Debug, Clone)]
#[enum_dispatch(ParticleProcess)]
pub enum Process {
    Inception(Inception),
    SurfaceReaction(SurfaceReaction),
    ActiveSitesReaction(ActiveSitesReaction),
    Coagulation(Coagulation),
    Sintering(Sintering),
    Transport(Transport),
}
