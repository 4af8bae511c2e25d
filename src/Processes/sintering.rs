//! Sintering as a deferred process: it has no jump terms and is applied to every particle
//! during LPDA, after the other deferred processes of the mechanism.
use crate::Particles::particle::Particle;
use crate::Particles::particle_model::ParticleModel;
use crate::Processes::mechanism::Mechanism;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess, ProcessError};
use crate::Processes::sintering_model::SinteringModel;
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::GasState;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sintering {
    name: String,
    model: SinteringModel,
}

impl Sintering {
    pub fn new(model: SinteringModel) -> Self {
        Self {
            name: "sintering".to_string(),
            model,
        }
    }
    pub fn model(&self) -> &SinteringModel {
        &self.model
    }

    /// Total surface loss rate of the explicit particles per unit volume, m2/(m3 s)
    pub fn surface_loss_rate(&self, cell: &Cell) -> f64 {
        let vol = cell.sample_volume();
        if !(vol > 0.0) {
            return 0.0;
        }
        cell.particles()
            .iter()
            .map(|p| p.stat_weight() * self.model.rate(cell.gas(), p))
            .sum::<f64>()
            / vol
    }
}

impl ParticleProcess for Sintering {
    fn name(&self) -> &str {
        &self.name
    }
    fn term_count(&self) -> usize {
        0
    }
    fn is_deferred(&self) -> bool {
        true
    }

    fn rate_terms(
        &self,
        _t: f64,
        _cell: &Cell,
        _mech: &Mechanism,
        _geom: &LocalGeometry,
        _terms: &mut [f64],
    ) -> f64 {
        0.0
    }

    fn perform(
        &self,
        _t: f64,
        _cell: &mut Cell,
        term: usize,
        _mech: &Mechanism,
        _geom: &LocalGeometry,
        _rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        Err(ProcessError::UnknownTerm {
            process: self.name.clone(),
            term,
        })
    }

    fn update_deferred(
        &self,
        _t: f64,
        dt: f64,
        gas: &GasState,
        particle: &mut Particle,
        model: &ParticleModel,
        _rng: &mut dyn RngCore,
    ) -> Result<u64, ProcessError> {
        self.model.perform(dt, gas, particle, model)?;
        Ok(0)
    }
}
