//! Particle-number register for the hybrid representation.
//!
//! Particles smaller than the threshold size class are not stored as `Particle` objects:
//! the register keeps one count per size class `k` (units of the first component) and a
//! spherical template particle per class. Property sums are count-weighted template sums.
//! Class 0 holds no particles.
use crate::Particles::particle::{PROP_COUNT, PropId, Particle, PropertyCache};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PnRegister {
    counts: Vec<u64>,
    templates: Vec<Particle>,
    #[serde(skip)]
    class_props: Vec<PropertyCache>,
    #[serde(skip)]
    sums: PropertyCache,
    total: u64,
}

impl PnRegister {
    /// Installs the template particles; the threshold is `templates.len()`.
    /// Existing counts are discarded.
    pub fn initialise(&mut self, templates: Vec<Particle>) {
        self.counts = vec![0; templates.len()];
        self.class_props = templates.iter().map(|p| p.properties()).collect();
        if let Some(zero) = self.class_props.first_mut() {
            *zero = [0.0; PROP_COUNT];
        }
        self.templates = templates;
        self.total = 0;
        self.sums = [0.0; PROP_COUNT];
    }

    /// True once templates are installed
    pub fn is_active(&self) -> bool {
        self.templates.len() > 1
    }
    /// Smallest size class stored explicitly
    pub fn threshold(&self) -> usize {
        self.templates.len()
    }
    pub fn accepts(&self, k: usize) -> bool {
        k >= 1 && k < self.threshold()
    }
    pub fn count(&self, k: usize) -> u64 {
        self.counts.get(k).copied().unwrap_or(0)
    }
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }
    pub fn total(&self) -> u64 {
        self.total
    }
    pub fn template(&self, k: usize) -> Option<&Particle> {
        self.templates.get(k)
    }

    /// Adds `n` particles of class `k`. Returns false if the class is not held here.
    pub fn add(&mut self, k: usize, n: u64) -> bool {
        if !self.accepts(k) {
            return false;
        }
        self.counts[k] += n;
        self.total += n;
        self.add_to_sums(k, n as f64);
        true
    }

    /// Removes one particle of class `k`. Returns false if there is none.
    pub fn remove(&mut self, k: usize) -> bool {
        self.remove_n(k, 1) == 1
    }

    /// Removes up to `n` particles of class `k`; returns how many were removed.
    pub fn remove_n(&mut self, k: usize, n: u64) -> u64 {
        let available = self.count(k);
        let removed = n.min(available);
        if removed > 0 {
            self.counts[k] -= removed;
            self.total -= removed;
            self.add_to_sums(k, -(removed as f64));
        }
        removed
    }

    /// Fresh copy of a class-`k` particle stamped with time `t`.
    pub fn particle_of_class(&self, k: usize, t: f64) -> Option<Particle> {
        self.templates.get(k).map(|p| {
            let mut p = p.clone();
            p.set_time(t);
            p
        })
    }

    fn add_to_sums(&mut self, k: usize, n: f64) {
        if let Some(props) = self.class_props.get(k) {
            for (s, v) in self.sums.iter_mut().zip(props.iter()) {
                *s += n * v;
            }
        }
    }

    /// Recomputes property sums from counts, removing accumulated rounding.
    pub fn recalc_sums(&mut self) {
        if self.class_props.len() != self.templates.len() {
            self.class_props = self.templates.iter().map(|p| p.properties()).collect();
            if let Some(zero) = self.class_props.first_mut() {
                *zero = [0.0; PROP_COUNT];
            }
        }
        let mut sums = [0.0; PROP_COUNT];
        for (k, &c) in self.counts.iter().enumerate() {
            if c > 0 {
                for (s, v) in sums.iter_mut().zip(self.class_props[k].iter()) {
                    *s += c as f64 * v;
                }
            }
        }
        self.sums = sums;
        self.total = self.counts.iter().sum();
    }

    pub fn sums(&self) -> &PropertyCache {
        &self.sums
    }

    pub fn get_sum(&self, id: PropId) -> f64 {
        match id {
            PropId::Count => self.total as f64,
            _ => self.sums[id.index()].max(0.0),
        }
    }

    /// Size class whose cumulative `id`-sum interval contains `r`.
    pub fn select(&self, id: PropId, r: f64) -> Option<usize> {
        let mut r = r;
        let mut last = None;
        for (k, &c) in self.counts.iter().enumerate().skip(1) {
            if c == 0 {
                continue;
            }
            let w = c as f64 * self.class_props[k][id.index()];
            if r < w {
                return Some(k);
            }
            r -= w;
            last = Some(k);
        }
        last
    }

    /// Doubles every class count along with the ensemble sample volume.
    pub fn double(&mut self) {
        for c in self.counts.iter_mut() {
            *c *= 2;
        }
        self.recalc_sums();
    }

    pub fn clear(&mut self) {
        for c in self.counts.iter_mut() {
            *c = 0;
        }
        self.total = 0;
        self.sums = [0.0; PROP_COUNT];
    }
}
