//! Inception: birth of new particles from the gas phase.
//!
//! The rate per unit volume is `A * beta(T, P) * prod (NA c_i)^nu_i`, where `beta` is the
//! optional collision kernel of the two incepting molecules (harmonic mean of the
//! free-molecular and slip-flow kernels); without a kernel `beta = 1`. The cell rate is the
//! volumetric rate times the sample volume, divided by the incepting weight when particles
//! carry statistical weights.
use crate::Processes::mechanism::Mechanism;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess, ProcessError};
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::GasState;
use crate::Utils::constants::{CFM, CSF, CUNNINGHAM_A, EFM, NA};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Collision kernel of two gas molecules forming a new particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InceptionKernel {
    kfm: f64,
    ksf1: f64,
    ksf2: f64,
    ksf3: f64,
}

impl InceptionKernel {
    /// Kernel between molecules of masses `m1`, `m2` (kg) and diameters `d1`, `d2` (m).
    pub fn between(m1: f64, m2: f64, d1: f64, d2: f64) -> Self {
        Self {
            kfm: EFM * CFM * (1.0 / m1 + 1.0 / m2).sqrt() * (d1 + d2).powi(2),
            ksf1: CSF * (d1 + d2),
            ksf2: 1.0 / d1 + 1.0 / d2,
            ksf3: CUNNINGHAM_A * (1.0 / (d1 * d1) + 1.0 / (d2 * d2)),
        }
    }

    /// m3/s
    pub fn value(&self, gas: &GasState) -> f64 {
        let t = gas.temperature();
        let fm = self.kfm * t.sqrt();
        let sf = self.ksf1 * t / gas.viscosity() * (self.ksf2 + self.ksf3 * gas.knudsen_length());
        if fm + sf > 0.0 { fm * sf / (fm + sf) } else { 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inception {
    name: String,
    a: f64,
    reactants: Vec<(usize, f64)>,
    kernel: Option<InceptionKernel>,
    stoich: Vec<(usize, f64)>,
    composition: Vec<f64>,
    values: Vec<f64>,
}

impl Inception {
    /// Inception of particles with composition `composition` at rate `a` per m3 per s
    /// (before reactant and kernel factors).
    pub fn new(name: &str, a: f64, composition: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            a,
            reactants: Vec::new(),
            kernel: None,
            stoich: Vec::new(),
            composition,
            values: Vec::new(),
        }
    }

    /// (species index, reaction order) pairs entering the rate
    pub fn with_reactants(mut self, reactants: Vec<(usize, f64)>) -> Self {
        self.reactants = reactants;
        self
    }
    pub fn with_kernel(mut self, kernel: InceptionKernel) -> Self {
        self.kernel = Some(kernel);
        self
    }
    /// (species index, molecules consumed per new particle)
    pub fn with_stoichiometry(mut self, stoich: Vec<(usize, f64)>) -> Self {
        self.stoich = stoich;
        self
    }
    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    pub fn a(&self) -> f64 {
        self.a
    }
    pub fn composition(&self) -> &[f64] {
        &self.composition
    }

    /// Physical inception rate, 1/(m3 s)
    pub fn rate_per_volume(&self, gas: &GasState) -> f64 {
        let beta = self.kernel.map_or(1.0, |k| k.value(gas));
        let chem: f64 = self
            .reactants
            .iter()
            .map(|(i, nu)| (NA * gas.concentration(*i)).powf(*nu))
            .product();
        (self.a * beta * chem).max(0.0)
    }
}

impl ParticleProcess for Inception {
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
        mech: &Mechanism,
        _geom: &LocalGeometry,
        terms: &mut [f64],
    ) -> f64 {
        let mut rate = self.rate_per_volume(cell.gas()) * cell.sample_volume();
        if mech.is_weighted_coag() {
            let w = cell.incepting_weight();
            rate = if w > 0.0 { rate / w } else { 0.0 };
        }
        terms[0] = rate;
        rate
    }

    fn perform(
        &self,
        t: f64,
        cell: &mut Cell,
        term: usize,
        mech: &Mechanism,
        _geom: &LocalGeometry,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        if term != 0 {
            return Err(ProcessError::UnknownTerm {
                process: self.name.clone(),
                term,
            });
        }
        let weight = if mech.is_weighted_coag() {
            cell.incepting_weight()
        } else {
            1.0
        };
        let particle = mech
            .particle_model()
            .new_particle(t, &self.composition, &self.values, weight);
        if !particle.is_valid() {
            return Err(ProcessError::InvalidParticle {
                process: self.name.clone(),
            });
        }
        mech.add_particle_to_cell(cell, particle, rng);
        cell.adjust_gas(&self.stoich, weight);
        Ok(EventOutcome::Performed)
    }

    fn gas_stoichiometry(&self) -> &[(usize, f64)] {
        &self.stoich
    }
}
