//! # Cell
//!
//! One well-mixed reactor volume: the particle ensemble, the gas-phase conditions it sees,
//! the statistical weight given to newly incepted particles and the particle streams that
//! flow in and out. The sample volume represented by the ensemble is the base volume times
//! the ensemble scaling factor, so doublings and contractions never bias number densities.
use crate::Particles::ensemble::{Ensemble, EnsembleError};
use crate::Particles::particle::Particle;
use crate::Processes::process_api::EventOutcome;
use crate::Processes::transport::{Inflow, Outflow};
use crate::StochasticSolver::gas_state::GasState;
use crate::Utils::constants::NA;
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};

/// Events performed and rejected (fictitious) per rate term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessCounters {
    performed: Vec<u64>,
    fictitious: Vec<u64>,
}

impl ProcessCounters {
    pub fn record(&mut self, term: usize, outcome: EventOutcome) {
        if self.performed.len() <= term {
            self.performed.resize(term + 1, 0);
            self.fictitious.resize(term + 1, 0);
        }
        match outcome {
            EventOutcome::Performed => self.performed[term] += 1,
            EventOutcome::Fictitious => self.fictitious[term] += 1,
        }
    }
    pub fn performed(&self) -> &[u64] {
        &self.performed
    }
    pub fn fictitious(&self) -> &[u64] {
        &self.fictitious
    }
    pub fn total_performed(&self) -> u64 {
        self.performed.iter().sum()
    }
    pub fn total_fictitious(&self) -> u64 {
        self.fictitious.iter().sum()
    }
    pub fn reset(&mut self) {
        self.performed.clear();
        self.fictitious.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Cell {
    gas: GasState,
    ensemble: Ensemble,
    base_volume: f64,
    incepting_weight: f64,
    fixed_chem: bool,
    inflows: Vec<Inflow>,
    outflows: Vec<Outflow>,
    counters: ProcessCounters,
}

impl Cell {
    /// Empty cell whose ensemble represents `sample_volume` m3.
    pub fn new(gas: GasState, capacity: usize, sample_volume: f64) -> Result<Self, EnsembleError> {
        Ok(Self {
            gas,
            ensemble: Ensemble::new(capacity)?,
            base_volume: sample_volume,
            incepting_weight: 1.0,
            fixed_chem: true,
            inflows: Vec::new(),
            outflows: Vec::new(),
            counters: ProcessCounters::default(),
        })
    }

    pub fn gas(&self) -> &GasState {
        &self.gas
    }
    pub fn gas_mut(&mut self) -> &mut GasState {
        &mut self.gas
    }
    pub fn set_gas(&mut self, gas: GasState) {
        self.gas = gas;
    }
    pub fn temperature(&self) -> f64 {
        self.gas.temperature()
    }
    pub fn pressure(&self) -> f64 {
        self.gas.pressure()
    }

    pub fn particles(&self) -> &Ensemble {
        &self.ensemble
    }
    pub fn particles_mut(&mut self) -> &mut Ensemble {
        &mut self.ensemble
    }
    /// Gas (read-only) and ensemble (mutable) at the same time
    pub fn split_mut(&mut self) -> (&GasState, &mut Ensemble) {
        (&self.gas, &mut self.ensemble)
    }
    pub fn particle_count(&self) -> usize {
        self.ensemble.count()
    }
    /// Explicit plus particle-number particles
    pub fn total_particle_number(&self) -> u64 {
        self.ensemble.total_count()
    }

    /// Volume represented by the ensemble, m3
    pub fn sample_volume(&self) -> f64 {
        self.base_volume * self.ensemble.scaling()
    }
    pub fn base_volume(&self) -> f64 {
        self.base_volume
    }
    /// Multiplies the sample volume, e.g. after gas expansion.
    pub fn adjust_sample_volume(&mut self, factor: f64) {
        self.base_volume *= factor;
    }

    /// Empties the cell and sizes the sample volume so that a full ensemble represents
    /// number density `m0` (1/m3).
    pub fn reset(&mut self, m0: f64) {
        self.ensemble.clear();
        self.counters.reset();
        if m0 > 0.0 {
            self.base_volume = self.ensemble.capacity() as f64 / m0;
        }
    }

    /// Replaces the population; all particles get weight `stat_weight`.
    pub fn set_particles(&mut self, particles: Vec<Particle>, stat_weight: f64) {
        let particles = particles
            .into_iter()
            .map(|mut p| {
                p.set_stat_weight(stat_weight);
                p
            })
            .collect();
        self.ensemble.set_particles(particles);
    }

    pub fn incepting_weight(&self) -> f64 {
        self.incepting_weight
    }
    pub fn set_incepting_weight(&mut self, w: f64) {
        self.incepting_weight = w;
    }

    /// With fixed chemistry, particle events do not change the gas composition.
    pub fn fixed_chem(&self) -> bool {
        self.fixed_chem
    }
    pub fn set_fixed_chem(&mut self, fixed: bool) {
        self.fixed_chem = fixed;
    }

    /// Removes `n` physical events' worth of gas species: `stoich` pairs are
    /// (species index, molecules consumed per event).
    pub fn adjust_gas(&mut self, stoich: &[(usize, f64)], n: f64) {
        if self.fixed_chem || stoich.is_empty() || n == 0.0 {
            return;
        }
        let vol = self.sample_volume();
        if !(vol > 0.0) {
            return;
        }
        for (species, nu) in stoich.iter() {
            self.gas.adjust_concentration(*species, -nu * n / (NA * vol));
        }
    }

    pub fn inflows(&self) -> &[Inflow] {
        &self.inflows
    }
    pub fn outflows(&self) -> &[Outflow] {
        &self.outflows
    }
    pub fn inflow_count(&self) -> usize {
        self.inflows.len()
    }
    pub fn outflow_count(&self) -> usize {
        self.outflows.len()
    }
    pub fn add_inflow(&mut self, inflow: Inflow) {
        self.inflows.push(inflow);
    }
    pub fn add_outflow(&mut self, outflow: Outflow) {
        self.outflows.push(outflow);
    }

    pub fn counters(&self) -> &ProcessCounters {
        &self.counters
    }
    pub fn counters_mut(&mut self) -> &mut ProcessCounters {
        &mut self.counters
    }

    /// Population statistics per unit volume
    pub fn stats(&self) -> CellStats {
        let vol = self.sample_volume();
        let mut weight = 0.0;
        let mut mass = 0.0;
        let mut volume = 0.0;
        let mut wd = 0.0;
        let mut wsl = 0.0;
        for p in self.ensemble.iter() {
            let w = p.stat_weight();
            weight += w;
            mass += w * p.mass();
            volume += w * p.volume();
            wd += w * p.coll_diameter();
            wsl += w * p.sintering_level();
        }
        let pn = self.ensemble.pn();
        for (k, &c) in pn.counts().iter().enumerate() {
            if c == 0 {
                continue;
            }
            if let Some(p) = pn.template(k) {
                let c = c as f64;
                weight += c;
                mass += c * p.mass();
                volume += c * p.volume();
                wd += c * p.coll_diameter();
                wsl += c;
            }
        }
        let per_vol = |x: f64| if vol > 0.0 { x / vol } else { 0.0 };
        let mean = |x: f64| if weight > 0.0 { x / weight } else { 0.0 };
        let count = self.ensemble.count();
        CellStats {
            particle_count: count,
            pn_count: pn.total(),
            number_density: per_vol(weight),
            mass_density: per_vol(mass),
            volume_fraction: per_vol(volume),
            mean_coll_diameter: mean(wd),
            mean_sintering_level: mean(wsl),
            mean_weight: if count + pn.total() as usize > 0 {
                weight / (count as f64 + pn.total() as f64)
            } else {
                0.0
            },
            scaling: self.ensemble.scaling(),
            sample_volume: vol,
        }
    }
}

/// Snapshot of population moments of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellStats {
    pub particle_count: usize,
    pub pn_count: u64,
    /// 1/m3
    pub number_density: f64,
    /// kg/m3
    pub mass_density: f64,
    pub volume_fraction: f64,
    /// m
    pub mean_coll_diameter: f64,
    pub mean_sintering_level: f64,
    pub mean_weight: f64,
    pub scaling: f64,
    /// m3
    pub sample_volume: f64,
}

impl CellStats {
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Quantity", "Value"]);
        table.add_row(row!["computational particles", self.particle_count]);
        table.add_row(row!["particle-number particles", self.pn_count]);
        table.add_row(row!["number density, 1/m3", format!("{:.4e}", self.number_density)]);
        table.add_row(row!["mass density, kg/m3", format!("{:.4e}", self.mass_density)]);
        table.add_row(row!["volume fraction", format!("{:.4e}", self.volume_fraction)]);
        table.add_row(row!["mean collision diameter, m", format!("{:.4e}", self.mean_coll_diameter)]);
        table.add_row(row!["mean sintering level", format!("{:.4}", self.mean_sintering_level)]);
        table.add_row(row!["mean statistical weight", format!("{:.4}", self.mean_weight)]);
        table.add_row(row!["ensemble scaling", format!("{:.4e}", self.scaling)]);
        table.add_row(row!["sample volume, m3", format!("{:.4e}", self.sample_volume)]);
        table
    }

    pub fn print_table(&self) {
        self.table().printstd();
    }
}
