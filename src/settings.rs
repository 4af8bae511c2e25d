//! # Settings Module
//!
//! ## Purpose
//! JSON description of a simulation: the particle model, the process list, mechanism flags,
//! the initial cell and the solver parameters. Settings are validated as a whole before
//! anything is built, so a malformed setup fails at load time with a descriptive error
//! instead of during a run.
//!
//! ## Usage Pattern
//! ```rust,ignore
//! use PopBal::settings::SimulationSettings;
//!
//! let settings = SimulationSettings::from_file("soot.json")?;
//! let mech = settings.build_mechanism()?;
//! let mut cell = settings.build_cell(&mech)?;
//! let solver = settings.build_solver();
//! let mut rng = settings.build_rng();
//! solver.run(0.0, settings.solver.t_stop, &mut cell, &mech, &mut rng)?;
//! ```
//!
//! ## Process entries
//! | `type` | fields |
//! |--------|--------|
//! | `Inception` | name, a, composition, values, reactants, stoichiometry, kernel |
//! | `SurfaceReaction` | name, a, n, e, dcomp, dvalues, property, deferred, reactants, stoichiometry, active_sites |
//! | `Coagulation` | name, kernel, a, weight_rule |
//! | `Sintering` | kind, a, e, dp_min |
//! | `Transport` | name, rate |
use crate::Particles::ensemble::EnsembleError;
use crate::Particles::particle::PropId;
use crate::Particles::particle_model::{Component, ParticleModel};
use crate::Processes::coagulation::{CoagKernel, CoagWeightRule, Coagulation};
use crate::Processes::inception::{Inception, InceptionKernel};
use crate::Processes::mechanism::Mechanism;
use crate::Processes::sintering::Sintering;
use crate::Processes::sintering_model::{SinteringModel, SinteringType};
use crate::Processes::surface_reaction::{
    AbfSiteDensity, ActiveSitesReaction, ConstantSiteDensity, SURFACE_MAJORANT_FACTOR, SurfaceReaction,
};
use crate::Processes::transport::{Outflow, Transport};
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::gas_state::GasState;
use crate::StochasticSolver::solver::{DEFAULT_SPLIT_RATIO, Solver};
use crate::StochasticSolver::weight_scaling::InceptionWeighting;
use crate::Utils::random::{RngType, seeded_rng};
use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("cannot build cell: {0}")]
    Ensemble(#[from] EnsembleError),
}

fn invalid<T>(msg: String) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg))
}

fn default_fractal_dimension() -> f64 {
    1.8
}
fn default_one() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_split_ratio() -> f64 {
    DEFAULT_SPLIT_RATIO
}
fn default_coagulation_name() -> String {
    "coagulation".to_string()
}
fn default_surface_property() -> PropId {
    PropId::Surface
}
fn default_majorant_factor() -> f64 {
    SURFACE_MAJORANT_FACTOR
}

/// Collision parameters of the two incepting molecules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InceptionKernelSettings {
    /// kg
    pub m1: f64,
    pub m2: f64,
    /// m
    pub d1: f64,
    pub d2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum ActiveSitesSettings {
    Constant { density: f64 },
    Abf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessSettings {
    Inception {
        name: String,
        a: f64,
        composition: Vec<f64>,
        #[serde(default)]
        values: Vec<f64>,
        #[serde(default)]
        reactants: Vec<(usize, f64)>,
        #[serde(default)]
        stoichiometry: Vec<(usize, f64)>,
        #[serde(default)]
        kernel: Option<InceptionKernelSettings>,
    },
    SurfaceReaction {
        name: String,
        a: f64,
        #[serde(default)]
        n: f64,
        /// J/mol
        #[serde(default)]
        e: f64,
        dcomp: Vec<f64>,
        #[serde(default)]
        dvalues: Vec<f64>,
        #[serde(default = "default_surface_property")]
        property: PropId,
        #[serde(default)]
        deferred: bool,
        #[serde(default = "default_majorant_factor")]
        majorant_factor: f64,
        #[serde(default)]
        reactants: Vec<(usize, f64)>,
        #[serde(default)]
        stoichiometry: Vec<(usize, f64)>,
        #[serde(default)]
        active_sites: Option<ActiveSitesSettings>,
    },
    Coagulation {
        #[serde(default = "default_coagulation_name")]
        name: String,
        kernel: CoagKernel,
        #[serde(default = "default_one")]
        a: f64,
        #[serde(default)]
        weight_rule: Option<CoagWeightRule>,
    },
    Sintering {
        kind: SinteringType,
        a: f64,
        /// J/mol
        e: f64,
        #[serde(default)]
        dp_min: f64,
    },
    Transport {
        name: String,
        rate: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSettings {
    /// K
    pub temperature: f64,
    /// Pa
    pub pressure: f64,
    /// mol/m3, indexed like the species indices of the processes
    #[serde(default)]
    pub concentrations: Vec<f64>,
    pub capacity: usize,
    /// m3
    pub sample_volume: f64,
    #[serde(default = "default_true")]
    pub fixed_chem: bool,
    /// first-order particle outflow, 1/s
    #[serde(default)]
    pub outflow_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    #[serde(default)]
    pub seed: u64,
    /// s
    pub t_stop: f64,
    #[serde(default)]
    pub output_times: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub components: Vec<Component>,
    #[serde(default)]
    pub trackers: Vec<String>,
    #[serde(default = "default_fractal_dimension")]
    pub fractal_dimension: f64,
    pub processes: Vec<ProcessSettings>,
    /// smallest size class kept as an explicit particle; 0 disables the hybrid representation
    #[serde(default)]
    pub hybrid_threshold: usize,
    #[serde(default)]
    pub inception_weighting: Option<InceptionWeighting>,
    pub cell: CellSettings,
    pub solver: SolverSettings,
}

impl SimulationSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: SimulationSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&content)?;
        info!("settings loaded from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    fn check_species(&self, what: &str, pairs: &[(usize, f64)]) -> Result<(), ConfigError> {
        let n = self.cell.concentrations.len();
        for (i, _) in pairs {
            if *i >= n {
                return invalid(format!("{what}: species index {i} but only {n} concentrations given"));
            }
        }
        Ok(())
    }

    fn check_composition(&self, what: &str, composition: &[f64]) -> Result<(), ConfigError> {
        if composition.len() > self.components.len() {
            return invalid(format!(
                "{what}: {} composition entries for {} components",
                composition.len(),
                self.components.len()
            ));
        }
        Ok(())
    }

    fn weighted_coagulation(&self) -> bool {
        self.processes
            .iter()
            .any(|p| matches!(p, ProcessSettings::Coagulation { weight_rule: Some(_), .. }))
    }

    /// Checks the whole setup for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.components.is_empty() {
            return invalid("at least one particle component is required".to_string());
        }
        for c in self.components.iter() {
            if !(c.mol_wt > 0.0) || !(c.density > 0.0) {
                return invalid(format!("component '{}' needs positive molecular weight and density", c.name));
            }
        }
        if !(self.fractal_dimension > 1.0 && self.fractal_dimension <= 3.0) {
            return invalid(format!("fractal dimension {} outside (1, 3]", self.fractal_dimension));
        }

        let cell = &self.cell;
        if !(cell.temperature > 0.0) || !(cell.pressure > 0.0) {
            return invalid("cell temperature and pressure must be positive".to_string());
        }
        if cell.capacity == 0 {
            return invalid("ensemble capacity must be positive".to_string());
        }
        if !(cell.sample_volume > 0.0) {
            return invalid("sample volume must be positive".to_string());
        }
        if cell.concentrations.iter().any(|c| *c < 0.0) {
            return invalid("negative gas concentration".to_string());
        }
        if cell.outflow_rate.is_some_and(|k| !(k >= 0.0)) {
            return invalid("outflow rate must be non-negative".to_string());
        }

        let mut sintering = 0;
        for process in self.processes.iter() {
            match process {
                ProcessSettings::Inception {
                    name,
                    a,
                    composition,
                    reactants,
                    stoichiometry,
                    kernel,
                    ..
                } => {
                    if !(*a >= 0.0) {
                        return invalid(format!("inception '{name}': negative rate constant"));
                    }
                    self.check_composition(name, composition)?;
                    if composition.iter().all(|x| *x <= 0.0) {
                        return invalid(format!("inception '{name}': new particles would be empty"));
                    }
                    self.check_species(name, reactants)?;
                    self.check_species(name, stoichiometry)?;
                    if let Some(k) = kernel {
                        if [k.m1, k.m2, k.d1, k.d2].iter().any(|x| !(*x > 0.0)) {
                            return invalid(format!("inception '{name}': kernel masses and diameters must be positive"));
                        }
                    }
                }
                ProcessSettings::SurfaceReaction {
                    name,
                    a,
                    dcomp,
                    majorant_factor,
                    reactants,
                    stoichiometry,
                    active_sites,
                    ..
                } => {
                    if !(*a >= 0.0) {
                        return invalid(format!("surface reaction '{name}': negative rate constant"));
                    }
                    self.check_composition(name, dcomp)?;
                    if !(*majorant_factor >= 1.0) {
                        return invalid(format!("surface reaction '{name}': majorant factor below 1"));
                    }
                    self.check_species(name, reactants)?;
                    self.check_species(name, stoichiometry)?;
                    if let Some(ActiveSitesSettings::Constant { density }) = active_sites {
                        if !(*density >= 0.0) {
                            return invalid(format!("surface reaction '{name}': negative site density"));
                        }
                    }
                }
                ProcessSettings::Coagulation {
                    name,
                    kernel,
                    a,
                    weight_rule,
                } => {
                    if !(*a > 0.0) {
                        return invalid(format!("coagulation '{name}': multiplier must be positive"));
                    }
                    match kernel {
                        CoagKernel::Constant { k } | CoagKernel::Additive { k } if !(*k > 0.0) => {
                            return invalid(format!("coagulation '{name}': kernel constant must be positive"));
                        }
                        CoagKernel::Additive { .. } if weight_rule.is_some() => {
                            return invalid(format!(
                                "coagulation '{name}': the additive kernel has no weighted form"
                            ));
                        }
                        _ => {}
                    }
                }
                ProcessSettings::Sintering { a, dp_min, .. } => {
                    sintering += 1;
                    if !(*a > 0.0) || !(*dp_min >= 0.0) {
                        return invalid("sintering needs a positive prefactor and non-negative dp_min".to_string());
                    }
                }
                ProcessSettings::Transport { name, rate } => {
                    if !(*rate >= 0.0) {
                        return invalid(format!("transport '{name}': negative rate"));
                    }
                }
            }
        }
        if sintering > 1 {
            return invalid("at most one sintering model is allowed".to_string());
        }

        if let Some(w) = &self.inception_weighting {
            if !self.weighted_coagulation() {
                return invalid("adaptive inception weighting requires weighted coagulation".to_string());
            }
            if !(w.w_min > 0.0) || !(w.w_max >= w.w_min) {
                return invalid(format!("inception weights must satisfy 0 < w_min <= w_max, got {} and {}", w.w_min, w.w_max));
            }
            if !(w.n_min >= 0.0) || w.n_min >= cell.capacity as f64 {
                return invalid(format!("n_min = {} must lie in [0, capacity)", w.n_min));
            }
        }
        if self.hybrid_threshold == 1 {
            return invalid("hybrid threshold must be 0 (off) or at least 2".to_string());
        }

        let solver = &self.solver;
        if !(solver.split_ratio > 0.0) {
            return invalid("split ratio must be positive".to_string());
        }
        if !(solver.t_stop >= 0.0) {
            return invalid("stop time must be non-negative".to_string());
        }
        if solver.output_times.windows(2).any(|w| w[1] < w[0]) {
            return invalid("output times must be sorted".to_string());
        }
        Ok(())
    }

    pub fn particle_model(&self) -> ParticleModel {
        ParticleModel::new(self.components.clone(), self.trackers.clone())
            .with_fractal_dimension(self.fractal_dimension)
    }

    pub fn build_mechanism(&self) -> Result<Mechanism, ConfigError> {
        self.validate()?;
        let mut mech = Mechanism::new(self.particle_model());
        for process in self.processes.iter() {
            match process.clone() {
                ProcessSettings::Inception {
                    name,
                    a,
                    composition,
                    values,
                    reactants,
                    stoichiometry,
                    kernel,
                } => {
                    let mut inception = Inception::new(&name, a, composition)
                        .with_values(values)
                        .with_reactants(reactants)
                        .with_stoichiometry(stoichiometry);
                    if let Some(k) = kernel {
                        inception = inception.with_kernel(InceptionKernel::between(k.m1, k.m2, k.d1, k.d2));
                    }
                    mech.add_process(inception);
                }
                ProcessSettings::SurfaceReaction {
                    name,
                    a,
                    n,
                    e,
                    dcomp,
                    dvalues,
                    property,
                    deferred,
                    majorant_factor,
                    reactants,
                    stoichiometry,
                    active_sites,
                } => {
                    let reaction = SurfaceReaction::new(&name, a, n, e, dcomp, property)
                        .with_values(dvalues)
                        .with_reactants(reactants)
                        .with_stoichiometry(stoichiometry)
                        .with_majorant_factor(majorant_factor)
                        .deferred(deferred);
                    match active_sites {
                        None => mech.add_process(reaction),
                        Some(ActiveSitesSettings::Constant { density }) => {
                            mech.add_process(ActiveSitesReaction::new(reaction, Arc::new(ConstantSiteDensity(density))))
                        }
                        Some(ActiveSitesSettings::Abf) => {
                            mech.add_process(ActiveSitesReaction::new(reaction, Arc::new(AbfSiteDensity)))
                        }
                    }
                }
                ProcessSettings::Coagulation {
                    name,
                    kernel,
                    a,
                    weight_rule,
                } => {
                    let mut coag = Coagulation::new(&name, kernel).with_multiplier(a);
                    if let Some(rule) = weight_rule {
                        coag = coag.weighted(rule);
                    }
                    mech.add_process(coag);
                }
                ProcessSettings::Sintering { kind, a, e, dp_min } => {
                    mech.add_process(Sintering::new(SinteringModel::new(kind, a, e, dp_min)));
                }
                ProcessSettings::Transport { name, rate } => {
                    mech.add_process(Transport::new(&name, rate));
                }
            }
        }
        if self.hybrid_threshold > 1 {
            mech.set_hybrid(self.hybrid_threshold);
        }
        if let Some(w) = self.inception_weighting {
            mech.set_inception_weighting(w);
        }
        Ok(mech)
    }

    /// Empty cell at the configured gas state; in hybrid mode the particle-number register
    /// is initialised from the mechanism.
    pub fn build_cell(&self, mech: &Mechanism) -> Result<Cell, ConfigError> {
        let c = &self.cell;
        let gas = GasState::new(c.temperature, c.pressure, DVector::from_vec(c.concentrations.clone()));
        let mut cell = Cell::new(gas, c.capacity, c.sample_volume)?;
        cell.set_fixed_chem(c.fixed_chem);
        if let Some(rate) = c.outflow_rate {
            cell.add_outflow(Outflow::new(rate));
        }
        if let Some(w) = &self.inception_weighting {
            cell.set_incepting_weight(w.w_min);
        }
        self.build_solver().initialise_pn_particles(0.0, &mut cell, mech);
        Ok(cell)
    }

    pub fn build_solver(&self) -> Solver {
        Solver::new(self.solver.split_ratio)
    }

    pub fn build_rng(&self) -> RngType {
        seeded_rng(self.solver.seed)
    }
}
