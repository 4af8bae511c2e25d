//! # Mechanism
//!
//! Ordered list of particle processes together with the particle model and the run-wide
//! flags (weighted coagulation, hybrid particle-number representation, adaptive inception
//! weighting). A mechanism is built once and then only read: every cell of a run shares the
//! same `&Mechanism`, all mutable state lives in the cells.
//!
//! The rate terms of all processes are laid out one after another in a single vector;
//! `offsets[i]` is the first term of process `i`.
//!
//! ## Main functions
//! - `calc_jump_rate_terms`: rates of the processes simulated as jump events
//! - `do_process`: performs the event of one rate term and updates the event counters
//! - `lpda`: brings every particle up to date with the deferred processes (linear process
//!   deferment)
//! - `update_sections`: deferred processes on the particle-number register
//! - `do_particle_flow`: inflow and outflow streams of a cell
use crate::Particles::particle::{Particle, PropId};
use crate::Particles::particle_model::ParticleModel;
use crate::Processes::process_api::{EventOutcome, LocalGeometry, ParticleProcess, Process, ProcessError};
use crate::Processes::sintering_model::SinteringModel;
use crate::StochasticSolver::cell::Cell;
use crate::StochasticSolver::weight_scaling::InceptionWeighting;
use crate::Utils::constants::NA;
use crate::Utils::random::{binomial_deviate, poisson_deviate, uniform01, uniform_index};
use log::{debug, info};
use nalgebra::DVector;
use rand::RngCore;

#[derive(Debug, Clone, Default)]
pub struct Mechanism {
    model: ParticleModel,
    processes: Vec<Process>,
    offsets: Vec<usize>,
    term_count: usize,
    any_deferred: bool,
    weighted_coag: bool,
    /// smallest size class stored explicitly; 0 disables the hybrid representation
    hybrid_threshold: usize,
    weighting: Option<InceptionWeighting>,
}

impl Mechanism {
    pub fn new(model: ParticleModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    pub fn add_process(&mut self, process: impl Into<Process>) {
        let process = process.into();
        self.offsets.push(self.term_count);
        self.term_count += process.term_count();
        self.any_deferred |= process.is_deferred();
        if let Process::Coagulation(coag) = &process {
            self.weighted_coag |= coag.is_weighted();
        }
        debug!(
            "process '{}' added with {} rate terms",
            process.name(),
            process.term_count()
        );
        self.processes.push(process);
    }

    pub fn with_process(mut self, process: impl Into<Process>) -> Self {
        self.add_process(process);
        self
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }
    /// Length of the rate-term vector
    pub fn term_count(&self) -> usize {
        self.term_count
    }
    pub fn process_names(&self) -> Vec<String> {
        self.processes.iter().map(|p| p.name().to_string()).collect()
    }
    pub fn particle_model(&self) -> &ParticleModel {
        &self.model
    }
    pub fn any_deferred(&self) -> bool {
        self.any_deferred
    }
    /// True when coagulation uses statistical weights (SWA)
    pub fn is_weighted_coag(&self) -> bool {
        self.weighted_coag
    }

    pub fn set_hybrid(&mut self, threshold: usize) {
        self.hybrid_threshold = threshold;
    }
    pub fn is_hybrid(&self) -> bool {
        self.hybrid_threshold > 1
    }
    pub fn hybrid_threshold(&self) -> usize {
        self.hybrid_threshold
    }

    pub fn set_inception_weighting(&mut self, weighting: InceptionWeighting) {
        self.weighting = Some(weighting);
    }
    pub fn inception_weighting(&self) -> Option<&InceptionWeighting> {
        self.weighting.as_ref()
    }
    pub fn is_variable_weighted_inception(&self) -> bool {
        self.weighting.is_some()
    }

    /// The sintering model of the first sintering process, if any
    pub fn sintering_model(&self) -> Option<&SinteringModel> {
        self.processes.iter().find_map(|p| match p {
            Process::Sintering(s) => Some(s.model()),
            _ => None,
        })
    }
    /// Particles form aggregates (instead of coalescing) when sintering is modelled.
    pub fn is_aggregating(&self) -> bool {
        self.sintering_model().is_some_and(|m| m.is_enabled())
    }

    /// Template particles of size classes `0..threshold` for the particle-number register
    pub fn pn_templates(&self, t: f64) -> Vec<Particle> {
        (0..self.hybrid_threshold)
            .map(|k| self.model.size_class_particle(t, k))
            .collect()
    }

    /// Adds a particle to the cell: small unit-weight particles go to the particle-number
    /// register in hybrid mode, everything else into the ensemble.
    pub fn add_particle_to_cell(&self, cell: &mut Cell, particle: Particle, rng: &mut dyn RngCore) {
        if self.is_hybrid() && particle.stat_weight() == 1.0 {
            let k = particle.size_class();
            let pn = cell.particles_mut().pn_mut();
            if pn.accepts(k) && pn.add(k, 1) {
                return;
            }
        }
        cell.particles_mut().add(particle, rng);
    }

    fn locate(&self, term: usize) -> Option<(usize, usize)> {
        if term >= self.term_count {
            return None;
        }
        let i = self.offsets.partition_point(|&o| o <= term).checked_sub(1)?;
        Some((i, term - self.offsets[i]))
    }

    fn fill_terms(
        &self,
        t: f64,
        cell: &Cell,
        geom: &LocalGeometry,
        terms: &mut Vec<f64>,
        keep: impl Fn(&Process) -> bool,
    ) -> f64 {
        terms.clear();
        terms.resize(self.term_count, 0.0);
        let mut total = 0.0;
        for (process, &offset) in self.processes.iter().zip(self.offsets.iter()) {
            if !keep(process) {
                continue;
            }
            let slice = &mut terms[offset..offset + process.term_count()];
            total += process.rate_terms(t, cell, self, geom, slice);
        }
        total
    }

    /// Rate terms of every process, events per second. Returns the total.
    pub fn calc_rate_terms(&self, t: f64, cell: &Cell, geom: &LocalGeometry, terms: &mut Vec<f64>) -> f64 {
        self.fill_terms(t, cell, geom, terms, |_| true)
    }

    /// Total rate of each process, events per second
    pub fn calc_rates(&self, t: f64, cell: &Cell, geom: &LocalGeometry) -> Vec<f64> {
        self.processes
            .iter()
            .map(|p| p.rate(t, cell, self, geom))
            .collect()
    }

    /// Rate terms of the jump processes; the terms of deferred processes are zero.
    pub fn calc_jump_rate_terms(&self, t: f64, cell: &Cell, geom: &LocalGeometry, terms: &mut Vec<f64>) -> f64 {
        self.fill_terms(t, cell, geom, terms, |p| !p.is_deferred())
    }

    /// Rate terms of the deferred processes; all other terms are zero.
    pub fn calc_deferred_rate_terms(
        &self,
        t: f64,
        cell: &Cell,
        geom: &LocalGeometry,
        terms: &mut Vec<f64>,
    ) -> f64 {
        self.fill_terms(t, cell, geom, terms, |p| p.is_deferred())
    }

    /// Molar concentration source terms of the gas species, mol/(m3 s)
    pub fn calc_gas_change_rates(&self, t: f64, cell: &Cell, geom: &LocalGeometry) -> DVector<f64> {
        let mut rates = DVector::zeros(cell.gas().species_count());
        let vol = cell.sample_volume();
        if !(vol > 0.0) {
            return rates;
        }
        let sums = cell.particles().combined_sums();
        let n = sums[PropId::Count.index()];
        let mean_weight = if n > 0.0 { sums[PropId::Weight.index()] / n } else { 1.0 };
        for process in self.processes.iter() {
            let stoich = process.gas_stoichiometry();
            if stoich.is_empty() {
                continue;
            }
            let weight = match process {
                Process::Inception(_) if self.weighted_coag => cell.incepting_weight(),
                Process::Inception(_) => 1.0,
                _ => mean_weight,
            };
            let rate = process.rate(t, cell, self, geom) * weight;
            for &(species, nu) in stoich {
                if species < rates.len() {
                    rates[species] -= nu * rate / (NA * vol);
                }
            }
        }
        rates
    }

    /// Performs one event of rate term `term` at time `t` and records its outcome.
    pub fn do_process(
        &self,
        term: usize,
        t: f64,
        cell: &mut Cell,
        geom: &LocalGeometry,
        rng: &mut dyn RngCore,
    ) -> Result<EventOutcome, ProcessError> {
        let (i, local) = self
            .locate(term)
            .ok_or(ProcessError::UnknownProcessIndex(term))?;
        let outcome = self.processes[i].perform(t, cell, local, self, geom, rng)?;
        cell.counters_mut().record(term, outcome);
        Ok(outcome)
    }

    /// Applies the deferred processes to explicit particle `i` over the time since its last
    /// update. Returns false if the particle is no longer valid; it is left in place.
    pub fn update_particle(
        &self,
        cell: &mut Cell,
        i: usize,
        t: f64,
        rng: &mut dyn RngCore,
    ) -> Result<bool, ProcessError> {
        if !self.any_deferred {
            return Ok(cell.particles().particle(i).is_some_and(|p| p.is_valid()));
        }
        let mut events = vec![0u64; self.processes.len()];
        let (gas, ensemble) = cell.split_mut();
        let result = ensemble.modify(i, |particle| -> Result<(bool, f64), ProcessError> {
            let dt = t - particle.last_update_time();
            if dt > 0.0 && particle.is_valid() {
                particle.set_time(t);
                for (k, process) in self.processes.iter().enumerate() {
                    if process.is_deferred() {
                        events[k] = process.update_deferred(t, dt, gas, particle, &self.model, rng)?;
                    }
                }
            }
            Ok((particle.is_valid(), particle.stat_weight()))
        });
        let Some(result) = result else {
            return Ok(false);
        };
        let (valid, weight) = result?;
        for (process, n) in self.processes.iter().zip(events) {
            if n > 0 {
                cell.adjust_gas(process.gas_stoichiometry(), n as f64 * weight);
            }
        }
        Ok(valid)
    }

    /// Linear process deferment: updates every explicit particle to time `t` and drops the
    /// ones that became invalid.
    pub fn lpda(&self, t: f64, cell: &mut Cell, rng: &mut dyn RngCore) -> Result<(), ProcessError> {
        if !self.any_deferred || cell.particle_count() == 0 {
            return Ok(());
        }
        cell.particles_mut().freeze_doubling();
        let mut result = Ok(());
        for i in 0..cell.particle_count() {
            if let Err(e) = self.update_particle(cell, i, t, rng) {
                result = Err(e);
                break;
            }
        }
        cell.particles_mut().remove_invalids();
        cell.particles_mut().unfreeze_doubling();
        result
    }

    /// Applies the deferred processes to the particle-number register over `dt`.
    ///
    /// The particles of a class are identical, so instead of drawing a Poisson number of
    /// events for each one, the class count is split by number of events `m` with
    /// successive binomial draws. Every group moves in bulk to the class its grown
    /// template falls into, or into the ensemble if that class is above the threshold.
    pub fn update_sections(
        &self,
        t: f64,
        dt: f64,
        cell: &mut Cell,
        rng: &mut dyn RngCore,
    ) -> Result<(), ProcessError> {
        if !self.is_hybrid() || !(dt > 0.0) || cell.particles().pn().total() == 0 {
            return Ok(());
        }
        let gas = cell.gas().clone();
        let counts = cell.particles().pn().counts().to_vec();
        // (from class, grown particle, number of particles, events per particle, process)
        let mut moves: Vec<(usize, Particle, u64, u64, usize)> = Vec::new();
        for (k, &count) in counts.iter().enumerate().rev() {
            if count == 0 {
                continue;
            }
            let Some(template) = cell.particles().pn().particle_of_class(k, t) else {
                continue;
            };
            for (pi, process) in self.processes.iter().enumerate() {
                if !process.is_deferred() {
                    continue;
                }
                let mu = process.particle_rate(t, &gas, &template) * dt;
                if !(mu > 0.0) {
                    continue;
                }
                let mut remaining = count;
                let mut pmf = (-mu).exp();
                let mut tail = 1.0;
                let mut m = 0u64;
                while remaining > 0 {
                    let p = if tail > pmf { pmf / tail } else { 1.0 };
                    let group = binomial_deviate(remaining, p.min(1.0), rng);
                    if m > 0 && group > 0 {
                        let mut grown = template.clone();
                        let done = process.perform_on_particle(t, &gas, &mut grown, &self.model, m);
                        if done > 0 {
                            moves.push((k, grown, group, done, pi));
                        }
                    }
                    remaining -= group;
                    tail -= pmf;
                    m += 1;
                    pmf *= mu / m as f64;
                }
            }
        }
        let mut promoted = 0u64;
        for (from, grown, n, done, pi) in moves {
            let removed = cell.particles_mut().pn_mut().remove_n(from, n);
            if removed == 0 {
                continue;
            }
            cell.adjust_gas(self.processes[pi].gas_stoichiometry(), (removed * done) as f64);
            if !grown.is_valid() {
                continue;
            }
            let k = grown.size_class();
            let pn = cell.particles_mut().pn_mut();
            if pn.accepts(k) {
                pn.add(k, removed);
            } else {
                for _ in 0..removed {
                    cell.particles_mut().add(grown.clone(), rng);
                }
                promoted += removed;
            }
        }
        if promoted > 0 {
            debug!("{promoted} particle-number particles promoted to the ensemble");
        }
        cell.particles_mut().pn_mut().recalc_sums();
        Ok(())
    }

    /// Processes the inflow and outflow streams of `cell` over the interval `dt` ending at `t`.
    pub fn do_particle_flow(
        &self,
        t: f64,
        dt: f64,
        cell: &mut Cell,
        geom: &LocalGeometry,
        rng: &mut dyn RngCore,
    ) {
        if !(dt > 0.0) {
            return;
        }
        let outflows = cell.outflows().to_vec();
        for outflow in outflows.iter() {
            let p = outflow.removal_probability(dt, geom);
            if !(p > 0.0) {
                continue;
            }
            cell.particles_mut().freeze_doubling();
            for i in (0..cell.particle_count()).rev() {
                if uniform01(rng) < p {
                    cell.particles_mut().remove(i);
                }
            }
            let counts = cell.particles().pn().counts().to_vec();
            for (k, &c) in counts.iter().enumerate() {
                if c > 0 {
                    let n = binomial_deviate(c, p, rng);
                    cell.particles_mut().pn_mut().remove_n(k, n);
                }
            }
            cell.particles_mut().unfreeze_doubling();
        }

        let inflows = cell.inflows().to_vec();
        for inflow in inflows.iter() {
            let mean_weight = inflow.mean_weight();
            if inflow.particles.is_empty() || !(mean_weight > 0.0) {
                continue;
            }
            let expected =
                inflow.rate * dt * geom.volume_scale() * inflow.number_density * cell.sample_volume() / mean_weight;
            let n = poisson_deviate(expected, rng);
            for _ in 0..n {
                let mut p = inflow.particles[uniform_index(inflow.particles.len(), rng)].clone();
                p.set_time(t);
                self.add_particle_to_cell(cell, p, rng);
            }
            if n > 0 {
                debug!("{n} particles flowed into the cell at t = {t:.4e} s");
            }
        }
    }

    /// Logs the process list and flags.
    pub fn log_summary(&self) {
        info!(
            "mechanism: {} processes, {} rate terms, weighted coagulation: {}, hybrid threshold: {}, deferred: {}",
            self.processes.len(),
            self.term_count,
            self.weighted_coag,
            self.hybrid_threshold,
            self.any_deferred
        );
        for (process, offset) in self.processes.iter().zip(self.offsets.iter()) {
            info!("  [{offset}] {} ({} terms)", process.name(), process.term_count());
        }
    }
}
