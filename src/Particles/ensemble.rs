//! # Ensemble
//!
//! ## Purpose
//! Fixed-capacity arena of computational particles for one cell. Particles are addressed by
//! index; removal moves the last particle into the freed slot, so an index is only stable
//! until the next removal.
//!
//! ## Capacity management
//! - the capacity is rounded to a power of two (it is the leaf count of the sum tree)
//! - adding to a full ensemble *contracts* it: a random particle is replaced by the new one
//!   (or the new one is dropped) and the sample volume shrinks by (cap-1)/cap
//! - once the ensemble has been three quarters full, falling below half capacity *doubles*
//!   it: every particle is copied and the sample volume doubles
//!
//! Both operations change `scaling()`, the factor the owning cell applies to its sample volume,
//! so particle number densities stay unbiased.
//!
//! ## Sums
//! Property sums live in a `SumTree` and are refreshed on every insertion, removal and update.
//! Small particles of the hybrid representation are counted in a `PnRegister`.
use crate::Particles::particle::{Particle, PropId, PropertyCache};
use crate::Particles::pn_register::PnRegister;
use crate::Particles::sum_tree::SumTree;
use crate::Utils::random::{uniform01, uniform_index};
use crate::Utils::serialization::{SerializationError, Versioned};
use log::{debug, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("ensemble capacity must be positive")]
    ZeroCapacity,
    #[error("{count} particles exceed ensemble capacity {capacity}")]
    Overfull { count: usize, capacity: usize },
    #[error("ensemble capacity {0} is above the largest supported 2^{max}", max = MAX_CAPACITY_LEVELS)]
    TooLarge(usize),
}

/// Largest capacity is 2^MAX_CAPACITY_LEVELS particles.
pub const MAX_CAPACITY_LEVELS: u32 = 40;

/// A particle chosen from the whole population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// index into the explicit particles
    Explicit(usize),
    /// size class in the particle-number register
    Pn(usize),
}

#[derive(Debug, Clone)]
pub struct Ensemble {
    particles: Vec<Particle>,
    tree: SumTree,
    pn: PnRegister,
    levels: u32,
    capacity: usize,
    scale: f64,
    // contraction
    cont_factor: f64,
    ncont: u64,
    cont_warned: bool,
    max_count: usize,
    // doubling
    ndble: u32,
    dble_active: bool,
    dble_cutoff: usize,
    dble_limit: usize,
    dble_on: bool,
}

impl Ensemble {
    pub fn new(capacity: usize) -> Result<Self, EnsembleError> {
        if capacity == 0 {
            return Err(EnsembleError::ZeroCapacity);
        }
        let levels = (capacity as f64).log2().round() as u32;
        if levels > MAX_CAPACITY_LEVELS {
            return Err(EnsembleError::TooLarge(capacity));
        }
        let capacity = 1usize << levels;
        let dble_slack = 1usize << levels.saturating_sub(5);
        Ok(Self {
            particles: Vec::with_capacity(capacity),
            tree: SumTree::new(capacity),
            pn: PnRegister::default(),
            levels,
            capacity,
            scale: 1.0,
            cont_factor: (capacity as f64 - 1.0) / capacity as f64,
            ncont: 0,
            cont_warned: false,
            max_count: 0,
            ndble: 0,
            dble_active: false,
            dble_cutoff: 3 * capacity / 4,
            dble_limit: (capacity / 2).saturating_sub(dble_slack),
            dble_on: true,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn levels(&self) -> u32 {
        self.levels
    }
    pub fn count(&self) -> usize {
        self.particles.len()
    }
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.particles.len() >= self.capacity
    }
    /// Explicit particles plus particle-number particles
    pub fn total_count(&self) -> u64 {
        self.particles.len() as u64 + self.pn.total()
    }
    pub fn max_count(&self) -> usize {
        self.max_count
    }
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }
    pub fn particle(&self, i: usize) -> Option<&Particle> {
        self.particles.get(i)
    }
    pub fn pn(&self) -> &PnRegister {
        &self.pn
    }
    pub fn pn_mut(&mut self) -> &mut PnRegister {
        &mut self.pn
    }

    /// Adds a particle, contracting the ensemble if it is full.
    /// Returns the index of the new particle, or None if contraction dropped it.
    pub fn add(&mut self, particle: Particle, rng: &mut dyn RngCore) -> Option<usize> {
        if !self.dble_active && self.particles.len() + 1 >= self.dble_cutoff {
            self.dble_active = true;
            debug!("ensemble doubling activated at {} particles", self.particles.len());
        }
        let cache = particle.properties();
        if self.particles.len() < self.capacity {
            self.particles.push(particle);
            let i = self.particles.len() - 1;
            self.tree.set(i, cache);
            self.max_count = self.max_count.max(self.particles.len());
            Some(i)
        } else {
            let i = uniform_index(self.capacity + 1, rng);
            self.ncont += 1;
            if !self.cont_warned && self.ncont as f64 / self.capacity as f64 > 0.01 {
                warn!(
                    "ensemble contracted {} times (capacity {}): results may carry a contraction bias",
                    self.ncont, self.capacity
                );
                self.cont_warned = true;
            }
            if i < self.capacity {
                self.particles[i] = particle;
                self.tree.set(i, cache);
                Some(i)
            } else {
                None
            }
        }
    }

    /// Removes particle `i`; the last particle takes its index.
    pub fn remove(&mut self, i: usize) {
        if i >= self.particles.len() {
            return;
        }
        self.particles.swap_remove(i);
        let last = self.particles.len();
        if i < last {
            let cache = self.particles[i].properties();
            self.tree.set(i, cache);
        }
        self.tree.clear_leaf(last);
        self.dble();
    }

    /// Drops every invalid particle and compacts the arena.
    pub fn remove_invalids(&mut self) {
        let before = self.particles.len();
        self.particles.retain(|p| p.is_valid());
        if self.particles.len() != before {
            self.rebuild_tree();
        }
        if self.particles.len() < self.capacity - self.dble_cutoff {
            self.dble_active = false;
        }
        self.dble();
    }

    pub fn replace(&mut self, i: usize, particle: Particle) {
        if i < self.particles.len() {
            let cache = particle.properties();
            self.particles[i] = particle;
            self.tree.set(i, cache);
        }
    }

    /// Applies `f` to particle `i` and refreshes its sums.
    pub fn modify<T, F: FnOnce(&mut Particle) -> T>(&mut self, i: usize, f: F) -> Option<T> {
        let particle = self.particles.get_mut(i)?;
        let out = f(particle);
        let cache = particle.properties();
        self.tree.set(i, cache);
        Some(out)
    }

    /// Refreshes the sums of particle `i` after it was changed through `modify`-less access.
    pub fn update(&mut self, i: usize) {
        if let Some(p) = self.particles.get(i) {
            let cache = p.properties();
            self.tree.set(i, cache);
        }
    }

    /// Replaces the whole population (surplus particles beyond capacity are ignored) and
    /// resets the scaling counters.
    pub fn set_particles(&mut self, particles: Vec<Particle>) {
        self.particles = particles;
        self.particles.truncate(self.capacity);
        self.rebuild_tree();
        self.reset_scaling();
        self.dble_active = self.particles.len() + 1 >= self.dble_cutoff;
        self.max_count = self.particles.len();
    }

    pub fn take_particles(&mut self) -> Vec<Particle> {
        let out = std::mem::take(&mut self.particles);
        self.tree.clear();
        out
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.tree.clear();
        self.pn.clear();
        self.reset_scaling();
        self.dble_active = false;
        self.max_count = 0;
    }

    fn rebuild_tree(&mut self) {
        self.tree.rebuild(self.particles.iter().map(|p| p.properties()));
    }

    // SELECTION

    pub fn select_uniform(&self, rng: &mut dyn RngCore) -> Option<usize> {
        if self.particles.is_empty() {
            None
        } else {
            Some(uniform_index(self.particles.len(), rng))
        }
    }

    /// Explicit particle chosen with probability proportional to property `id`.
    pub fn select(&self, id: PropId, rng: &mut dyn RngCore) -> Option<usize> {
        if id == PropId::Count {
            return self.select_uniform(rng);
        }
        let total = self.get_sum(id);
        if self.particles.is_empty() || !(total > 0.0) {
            return None;
        }
        let r = uniform01(rng) * total;
        Some(self.tree.select(id, r, self.particles.len()))
    }

    /// Particle chosen from explicit and particle-number particles together.
    pub fn select_combined(&self, id: PropId, rng: &mut dyn RngCore) -> Option<Selection> {
        let pn_sum = self.pn.get_sum(id);
        let ex_sum = self.get_sum(id);
        let total = pn_sum + ex_sum;
        if !(total > 0.0) {
            return None;
        }
        let r = uniform01(rng) * total;
        if r < pn_sum {
            self.pn.select(id, r).map(Selection::Pn)
        } else if self.particles.is_empty() {
            None
        } else {
            Some(Selection::Explicit(self.tree.select(id, r - pn_sum, self.particles.len())))
        }
    }

    // SUMS

    pub fn sums(&self) -> &PropertyCache {
        self.tree.head()
    }

    pub fn get_sum(&self, id: PropId) -> f64 {
        self.tree.head()[id.index()]
    }

    /// Sums over explicit and particle-number particles.
    pub fn combined_sums(&self) -> PropertyCache {
        let mut sums = *self.tree.head();
        if self.pn.total() > 0 {
            for (s, v) in sums.iter_mut().zip(self.pn.sums().iter()) {
                *s += v;
            }
        }
        sums
    }

    // SCALING

    pub fn scale(&self) -> f64 {
        self.scale
    }
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
    pub fn contraction_count(&self) -> u64 {
        self.ncont
    }
    pub fn doubling_count(&self) -> u32 {
        self.ndble
    }
    pub fn doubling_active(&self) -> bool {
        self.dble_active
    }

    /// Factor by which contractions and doublings have changed the represented volume.
    pub fn scaling(&self) -> f64 {
        self.scale * self.cont_factor.powf(self.ncont as f64) * 2f64.powi(self.ndble as i32)
    }

    pub fn reset_scaling(&mut self) {
        self.ncont = 0;
        self.ndble = 0;
        self.cont_warned = false;
    }

    pub fn freeze_doubling(&mut self) {
        self.dble_on = false;
    }

    pub fn unfreeze_doubling(&mut self) {
        self.dble_on = true;
        self.dble();
    }

    /// Copies every particle while the ensemble is below the doubling limit.
    /// An empty ensemble cannot be doubled and is left as it is.
    pub fn dble(&mut self) {
        if !(self.dble_on && self.dble_active) || self.particles.is_empty() {
            return;
        }
        let mut doubled = false;
        while self.particles.len() < self.dble_limit {
            let n = self.particles.len();
            self.particles.extend_from_within(..n);
            self.ndble += 1;
            self.pn.double();
            doubled = true;
        }
        if doubled {
            self.rebuild_tree();
            debug!(
                "ensemble doubled to {} particles (doublings: {})",
                self.particles.len(),
                self.ndble
            );
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleRecord {
    capacity: usize,
    particles: Vec<Particle>,
    pn: PnRegister,
    scale: f64,
    ncont: u64,
    cont_warned: bool,
    max_count: usize,
    ndble: u32,
    dble_active: bool,
    dble_on: bool,
}

impl Versioned for Ensemble {
    const OBJECT: &'static str = "ensemble";
    const VERSION: u32 = 0;
    type Record = EnsembleRecord;

    fn to_record(&self) -> EnsembleRecord {
        EnsembleRecord {
            capacity: self.capacity,
            particles: self.particles.clone(),
            pn: self.pn.clone(),
            scale: self.scale,
            ncont: self.ncont,
            cont_warned: self.cont_warned,
            max_count: self.max_count,
            ndble: self.ndble,
            dble_active: self.dble_active,
            dble_on: self.dble_on,
        }
    }

    fn from_record(record: EnsembleRecord) -> Result<Self, SerializationError> {
        let invalid = |reason: String| SerializationError::InvalidState {
            object: Self::OBJECT,
            reason,
        };
        let mut ensemble = Ensemble::new(record.capacity).map_err(|e| invalid(e.to_string()))?;
        if record.particles.len() > ensemble.capacity {
            return Err(invalid(
                EnsembleError::Overfull {
                    count: record.particles.len(),
                    capacity: ensemble.capacity,
                }
                .to_string(),
            ));
        }
        ensemble.particles = record.particles;
        ensemble.pn = record.pn;
        ensemble.pn.recalc_sums();
        ensemble.scale = record.scale;
        ensemble.ncont = record.ncont;
        ensemble.cont_warned = record.cont_warned;
        ensemble.max_count = record.max_count;
        ensemble.ndble = record.ndble;
        ensemble.dble_active = record.dble_active;
        ensemble.dble_on = record.dble_on;
        ensemble.rebuild_tree();
        Ok(ensemble)
    }
}
