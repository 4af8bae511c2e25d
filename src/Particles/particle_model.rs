//! Description of what particles are made of: components with molecular weight and
//! density, named tracker variables, and the aggregate fractal dimension.
use crate::Particles::particle::{Particle, Primary};
use crate::Utils::constants::NA;
use serde::{Deserialize, Serialize};

/// A particle component, e.g. carbon or TiO2 units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// molecular weight, kg/mol
    pub mol_wt: f64,
    /// bulk density, kg/m3
    pub density: f64,
}

impl Component {
    pub fn new(name: &str, mol_wt: f64, density: f64) -> Self {
        Self {
            name: name.to_string(),
            mol_wt,
            density,
        }
    }
    /// mass of one unit, kg
    pub fn unit_mass(&self) -> f64 {
        self.mol_wt / NA
    }
    /// volume of one unit, m3
    pub fn unit_volume(&self) -> f64 {
        self.mol_wt / (NA * self.density)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleModel {
    components: Vec<Component>,
    trackers: Vec<String>,
    fractal_dimension: f64,
}

impl Default for ParticleModel {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl ParticleModel {
    pub fn new(components: Vec<Component>, trackers: Vec<String>) -> Self {
        Self {
            components,
            trackers,
            fractal_dimension: 1.8,
        }
    }

    pub fn with_fractal_dimension(mut self, df: f64) -> Self {
        self.fractal_dimension = df;
        self
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }
    pub fn trackers(&self) -> &[String] {
        &self.trackers
    }
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }
    pub fn fractal_dimension(&self) -> f64 {
        self.fractal_dimension
    }
    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.name == name)
    }

    pub fn mass_of(&self, composition: &[f64]) -> f64 {
        self.components
            .iter()
            .zip(composition.iter())
            .map(|(c, x)| c.unit_mass() * x)
            .sum()
    }

    pub fn volume_of(&self, composition: &[f64]) -> f64 {
        self.components
            .iter()
            .zip(composition.iter())
            .map(|(c, x)| c.unit_volume() * x)
            .sum()
    }

    /// Particle with the given composition and tracker values; missing entries are zero.
    pub fn new_particle(&self, t: f64, composition: &[f64], values: &[f64], weight: f64) -> Particle {
        let mut comp = vec![0.0; self.component_count()];
        for (dst, src) in comp.iter_mut().zip(composition.iter()) {
            *dst = *src;
        }
        let mut vals = vec![0.0; self.tracker_count()];
        for (dst, src) in vals.iter_mut().zip(values.iter()) {
            *dst = *src;
        }
        Particle::new(Primary::new(comp, vals, self), t, weight)
    }

    /// Empty particle of unit weight
    pub fn create_particle(&self, t: f64) -> Particle {
        self.new_particle(t, &[], &[], 1.0)
    }

    /// Spherical particle of `k` units of the first component (a particle-number size class)
    pub fn size_class_particle(&self, t: f64, k: usize) -> Particle {
        self.new_particle(t, &[k as f64], &[], 1.0)
    }
}
