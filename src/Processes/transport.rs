//! Particle transport in and out of a single cell.
//!
//! `Transport` is a jump process: each particle leaves the cell with first-order rate `k`,
//! scaled by the local geometry. `Inflow` and `Outflow` are continuous streams attached to
//! a cell and processed between jump events by `Mechanism::do_particle_flow`.
use crate::Particles::ensemble::Selection;
use crate::Particles::particle::{Particle, PropId};
use crate::Processes::mechanism::Mechanism;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess, ProcessError};
use crate::StochasticSolver::cell::Cell;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    name: String,
    /// 1/s
    rate: f64,
}

impl Transport {
    pub fn new(name: &str, rate: f64) -> Self {
        Self {
            name: name.to_string(),
            rate,
        }
    }
    pub fn rate_constant(&self) -> f64 {
        self.rate
    }
}

impl ParticleProcess for Transport {
    fn name(&self) -> &str {
        &self.name
    }
    fn term_count(&self) -> usize {
        1
    }
    fn is_deferred(&self) -> bool {
        false
    }

    fn rate_terms(
        &self,
        _t: f64,
        cell: &Cell,
        _mech: &Mechanism,
        geom: &LocalGeometry,
        terms: &mut [f64],
    ) -> f64 {
        terms[0] = (self.rate * geom.volume_scale() * cell.total_particle_number() as f64).max(0.0);
        terms[0]
    }

    fn perform(
        &self,
        _t: f64,
        cell: &mut Cell,
        term: usize,
        _mech: &Mechanism,
        _geom: &LocalGeometry,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        if term != 0 {
            return Err(ProcessError::UnknownTerm {
                process: self.name.clone(),
                term,
            });
        }
        match cell.particles().select_combined(PropId::Count, rng) {
            Some(Selection::Explicit(i)) => cell.particles_mut().remove(i),
            Some(Selection::Pn(k)) => {
                cell.particles_mut().pn_mut().remove(k);
            }
            None => return Ok(EventOutcome::Fictitious),
        }
        Ok(EventOutcome::Performed)
    }
}

/// Stream of particles entering a cell. Entering particles are copies of `particles`
/// (chosen uniformly) carrying their own statistical weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inflow {
    /// 1/s, inverse residence time
    pub rate: f64,
    /// number density of the incoming stream, 1/m3
    pub number_density: f64,
    pub particles: Vec<Particle>,
}

impl Inflow {
    pub fn new(rate: f64, number_density: f64, particles: Vec<Particle>) -> Self {
        Self {
            rate,
            number_density,
            particles,
        }
    }

    /// Mean statistical weight of the stream's particles
    pub fn mean_weight(&self) -> f64 {
        if self.particles.is_empty() {
            return 0.0;
        }
        self.particles.iter().map(|p| p.stat_weight()).sum::<f64>() / self.particles.len() as f64
    }
}

/// First-order removal of particles from a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outflow {
    /// 1/s
    pub rate: f64,
}

impl Outflow {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Probability that a particle leaves within `dt`
    pub fn removal_probability(&self, dt: f64, geom: &LocalGeometry) -> f64 {
        if !(dt > 0.0) || !(self.rate > 0.0) {
            return 0.0;
        }
        1.0 - (-self.rate * dt * geom.volume_scale()).exp()
    }
}
