//! Surface reactions: growth (or oxidation) of individual particles by gas-phase species.
//!
//! The per-particle rate is `k(T, c) * X(particle)` with the Arrhenius-type constant
//! `k = A T^n exp(-E/RT) prod c_i^nu_i` and a particle property `X` (surface area by default),
//! so the cell rate is `k * sum X` and is read directly from the ensemble sums.
//!
//! A surface reaction is either a jump process or a deferred one. As a jump process in a
//! mechanism that also has deferred processes, the selected particle is first brought up to
//! date by LPDA; its rate may have changed since the rate was computed, so the jump rate is
//! inflated by a majorant factor and events are accepted with probability true/majorant.
//!
//! `ActiveSitesReaction` multiplies the rate by a site density supplied by an
//! `ActiveSitesModel` strategy.
use crate::Particles::ensemble::Selection;
use crate::Particles::particle::{Particle, PropId};
use crate::Particles::particle_model::ParticleModel;
use crate::Processes::mechanism::Mechanism;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess, ProcessError};
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::GasState;
use crate::Utils::constants::R_G;
use crate::Utils::random::uniform01;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Default inflation of jump rates when particles are updated before an event
pub const SURFACE_MAJORANT_FACTOR: f64 = 2.0;

/// Density of reactive sites on particle surfaces.
pub trait ActiveSitesModel: Debug + Send + Sync {
    /// Site density (fraction of the rate) for one particle
    fn site_density(&self, t: f64, gas: &GasState, particle: &Particle) -> f64;
    /// Upper bound of `site_density` over all particles in the given gas
    fn max_site_density(&self, t: f64, gas: &GasState) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSiteDensity(pub f64);

impl ActiveSitesModel for ConstantSiteDensity {
    fn site_density(&self, _t: f64, _gas: &GasState, _particle: &Particle) -> f64 {
        self.0
    }
    fn max_site_density(&self, _t: f64, _gas: &GasState) -> f64 {
        self.0
    }
}

/// Soot surface site fraction alpha = tanh(a / ln(mu) + b) with temperature-fitted a and b
/// and `mu` the number of units of the first component in the particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbfSiteDensity;

impl ActiveSitesModel for AbfSiteDensity {
    fn site_density(&self, _t: f64, gas: &GasState, particle: &Particle) -> f64 {
        let temp = gas.temperature();
        let a = 12.65 - 5.63e-3 * temp;
        let b = -1.38 + 6.8e-4 * temp;
        let mu = particle.composition().first().copied().unwrap_or(0.0);
        if mu <= 1.0 {
            return 1.0;
        }
        (a / mu.ln() + b).tanh().clamp(0.0, 1.0)
    }
    fn max_site_density(&self, _t: f64, _gas: &GasState) -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceReaction {
    name: String,
    a: f64,
    n: f64,
    /// activation energy, J/mol
    e: f64,
    reactants: Vec<(usize, f64)>,
    stoich: Vec<(usize, f64)>,
    dcomp: Vec<f64>,
    dvalues: Vec<f64>,
    property: PropId,
    deferred: bool,
    majorant_factor: f64,
}

impl SurfaceReaction {
    pub fn new(name: &str, a: f64, n: f64, e: f64, dcomp: Vec<f64>, property: PropId) -> Self {
        Self {
            name: name.to_string(),
            a,
            n,
            e,
            reactants: Vec::new(),
            stoich: Vec::new(),
            dcomp,
            dvalues: Vec::new(),
            property,
            deferred: false,
            majorant_factor: SURFACE_MAJORANT_FACTOR,
        }
    }
    pub fn with_reactants(mut self, reactants: Vec<(usize, f64)>) -> Self {
        self.reactants = reactants;
        self
    }
    pub fn with_stoichiometry(mut self, stoich: Vec<(usize, f64)>) -> Self {
        self.stoich = stoich;
        self
    }
    pub fn with_values(mut self, dvalues: Vec<f64>) -> Self {
        self.dvalues = dvalues;
        self
    }
    pub fn deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }
    pub fn with_majorant_factor(mut self, factor: f64) -> Self {
        self.majorant_factor = factor;
        self
    }
    pub fn property(&self) -> PropId {
        self.property
    }
    pub fn composition_change(&self) -> &[f64] {
        &self.dcomp
    }

    /// Rate constant per unit of the particle property, 1/s
    pub fn rate_constant(&self, gas: &GasState) -> f64 {
        let t = gas.temperature();
        let chem: f64 = self
            .reactants
            .iter()
            .map(|(i, nu)| gas.concentration(*i).powf(*nu))
            .product();
        (self.a * t.powf(self.n) * (-self.e / (R_G * t)).exp() * chem).max(0.0)
    }

    fn jump_majorant(&self, mech: &Mechanism) -> f64 {
        if mech.any_deferred() && !self.deferred {
            self.majorant_factor
        } else {
            1.0
        }
    }

    fn total_rate(&self, cell: &Cell, mech: &Mechanism, site_bound: f64) -> f64 {
        let sum = cell.particles().get_sum(self.property) + cell.particles().pn().get_sum(self.property);
        self.rate_constant(cell.gas()) * sum * site_bound * self.jump_majorant(mech)
    }

    fn apply(&self, particle: &mut Particle, model: &ParticleModel, n: u64) -> u64 {
        particle.primary_mut().adjust(&self.dcomp, &self.dvalues, n, model)
    }

    fn perform_jump(
        &self,
        t: f64,
        cell: &mut Cell,
        mech: &Mechanism,
        sites: Option<&dyn ActiveSitesModel>,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        let Some(selection) = cell.particles().select_combined(self.property, rng) else {
            return Ok(EventOutcome::Fictitious);
        };
        let model = mech.particle_model();
        match selection {
            Selection::Pn(k) => {
                let Some(mut particle) = cell.particles().pn().particle_of_class(k, t) else {
                    return Ok(EventOutcome::Fictitious);
                };
                if let Some(s) = sites {
                    let bound = s.max_site_density(t, cell.gas());
                    if bound > 0.0 && uniform01(rng) * bound > s.site_density(t, cell.gas(), &particle) {
                        return Ok(EventOutcome::Fictitious);
                    }
                }
                let done = self.apply(&mut particle, model, 1);
                if done == 0 {
                    return Ok(EventOutcome::Fictitious);
                }
                cell.particles_mut().pn_mut().remove(k);
                mech.add_particle_to_cell(cell, particle, rng);
                cell.adjust_gas(&self.stoich, done as f64);
                Ok(EventOutcome::Performed)
            }
            Selection::Explicit(i) => {
                let majorant = self.jump_majorant(mech);
                let site_bound = sites.map_or(1.0, |s| s.max_site_density(t, cell.gas()));
                let Some(before) = cell.particles().particle(i) else {
                    return Ok(EventOutcome::Fictitious);
                };
                let maj_rate = self.particle_rate(t, cell.gas(), before) * site_bound * majorant;
                if mech.any_deferred() {
                    let valid = mech.update_particle(cell, i, t, rng)?;
                    if !valid {
                        cell.particles_mut().remove(i);
                        return Ok(EventOutcome::Fictitious);
                    }
                }
                let Some(after) = cell.particles().particle(i) else {
                    return Ok(EventOutcome::Fictitious);
                };
                let site = sites.map_or(1.0, |s| s.site_density(t, cell.gas(), after));
                let true_rate = self.particle_rate(t, cell.gas(), after) * site;
                let weight = after.stat_weight();
                if (majorant > 1.0 || sites.is_some()) && uniform01(rng) * maj_rate > true_rate {
                    return Ok(EventOutcome::Fictitious);
                }
                let done = cell
                    .particles_mut()
                    .modify(i, |p| self.apply(p, model, 1))
                    .unwrap_or(0);
                cell.adjust_gas(&self.stoich, done as f64 * weight);
                if !cell.particles().particle(i).is_some_and(|p| p.is_valid()) {
                    cell.particles_mut().remove(i);
                }
                Ok(if done > 0 {
                    EventOutcome::Performed
                } else {
                    EventOutcome::Fictitious
                })
            }
        }
    }
}

impl ParticleProcess for SurfaceReaction {
    fn name(&self) -> &str {
        &self.name
    }
    fn term_count(&self) -> usize {
        1
    }
    fn is_deferred(&self) -> bool {
        self.deferred
    }

    fn rate_terms(
        &self,
        _t: f64,
        cell: &Cell,
        mech: &Mechanism,
        _geom: &LocalGeometry,
        terms: &mut [f64],
    ) -> f64 {
        terms[0] = self.total_rate(cell, mech, 1.0);
        terms[0]
    }

    fn particle_rate(&self, _t: f64, gas: &GasState, particle: &Particle) -> f64 {
        self.rate_constant(gas) * particle.property(self.property)
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
        self.perform_jump(t, cell, mech, None, rng)
    }

    fn perform_on_particle(
        &self,
        _t: f64,
        _gas: &GasState,
        particle: &mut Particle,
        model: &ParticleModel,
        n: u64,
    ) -> u64 {
        self.apply(particle, model, n)
    }

    fn gas_stoichiometry(&self) -> &[(usize, f64)] {
        &self.stoich
    }
}

#[derive(Debug, Clone)]
pub struct ActiveSitesReaction {
    reaction: SurfaceReaction,
    sites: Arc<dyn ActiveSitesModel>,
}

impl ActiveSitesReaction {
    pub fn new(reaction: SurfaceReaction, sites: Arc<dyn ActiveSitesModel>) -> Self {
        Self { reaction, sites }
    }
    pub fn reaction(&self) -> &SurfaceReaction {
        &self.reaction
    }
    pub fn sites(&self) -> &dyn ActiveSitesModel {
        self.sites.as_ref()
    }
}

impl ParticleProcess for ActiveSitesReaction {
    fn name(&self) -> &str {
        &self.reaction.name
    }
    fn term_count(&self) -> usize {
        1
    }
    fn is_deferred(&self) -> bool {
        self.reaction.deferred
    }

    fn rate_terms(
        &self,
        t: f64,
        cell: &Cell,
        mech: &Mechanism,
        _geom: &LocalGeometry,
        terms: &mut [f64],
    ) -> f64 {
        let bound = self.sites.max_site_density(t, cell.gas());
        terms[0] = self.reaction.total_rate(cell, mech, bound);
        terms[0]
    }

    fn particle_rate(&self, t: f64, gas: &GasState, particle: &Particle) -> f64 {
        self.reaction.particle_rate(t, gas, particle) * self.sites.site_density(t, gas, particle)
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
                process: self.reaction.name.clone(),
                term,
            });
        }
        self.reaction
            .perform_jump(t, cell, mech, Some(self.sites.as_ref()), rng)
    }

    fn perform_on_particle(
        &self,
        _t: f64,
        _gas: &GasState,
        particle: &mut Particle,
        model: &ParticleModel,
        n: u64,
    ) -> u64 {
        self.reaction.apply(particle, model, n)
    }

    fn gas_stoichiometry(&self) -> &[(usize, f64)] {
        &self.reaction.stoich
    }
}
