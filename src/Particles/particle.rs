//! # Particle and Primary
//!
//! A `Particle` is one computational particle: a `Primary` (composition, trackers and the
//! surface-volume description of the aggregate) plus bookkeeping used by the solver
//! (statistical weight, creation time, time of the last deferred update, coagulation count).
//!
//! The rate expressions only ever need a fixed set of particle properties. They are returned
//! together as a `PropertyCache` so the ensemble can keep their sums in a sum tree.
use crate::Particles::particle_model::ParticleModel;
use crate::Utils::constants::PI;
use crate::Utils::serialization::{SerializationError, Versioned};
use serde::{Deserialize, Serialize};

pub const PROP_COUNT: usize = 16;
pub type PropertyCache = [f64; PROP_COUNT];

/// Particle properties used by rate terms and property-weighted selection.
/// `W*` variants are multiplied by the statistical weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropId {
    Count = 0,
    Diameter,
    DiameterSq,
    InvDiameter,
    InvDiameterSq,
    InvSqrtMass,
    DiameterSqInvSqrtMass,
    Mass,
    Surface,
    Weight,
    WeightDiameter,
    WeightDiameterSq,
    WeightInvDiameter,
    WeightInvDiameterSq,
    WeightInvSqrtMass,
    WeightDiameterSqInvSqrtMass,
}

impl PropId {
    pub const ALL: [PropId; PROP_COUNT] = [
        PropId::Count,
        PropId::Diameter,
        PropId::DiameterSq,
        PropId::InvDiameter,
        PropId::InvDiameterSq,
        PropId::InvSqrtMass,
        PropId::DiameterSqInvSqrtMass,
        PropId::Mass,
        PropId::Surface,
        PropId::Weight,
        PropId::WeightDiameter,
        PropId::WeightDiameterSq,
        PropId::WeightInvDiameter,
        PropId::WeightInvDiameterSq,
        PropId::WeightInvSqrtMass,
        PropId::WeightDiameterSqInvSqrtMass,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// 2^(-1/3): surface ratio of two touching equal spheres to their coalesced sphere
const TWO_SPHERE_RATIO: f64 = 0.7937005259840998;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primary {
    composition: Vec<f64>,
    values: Vec<f64>,
    /// surface area, m2; never below the area of the volume-equivalent sphere
    surface: f64,
    mass: f64,
    volume: f64,
    sph_diameter: f64,
    coll_diameter: f64,
    fractal_dimension: f64,
}

impl Primary {
    /// Spherical primary of the given composition.
    pub fn new(composition: Vec<f64>, values: Vec<f64>, model: &ParticleModel) -> Self {
        let mut primary = Self {
            composition,
            values,
            surface: 0.0,
            mass: 0.0,
            volume: 0.0,
            sph_diameter: 0.0,
            coll_diameter: 0.0,
            fractal_dimension: model.fractal_dimension(),
        };
        primary.update_cache(model);
        primary
    }

    /// Recomputes mass, volume and diameters from composition and surface.
    pub fn update_cache(&mut self, model: &ParticleModel) {
        self.mass = model.mass_of(&self.composition);
        self.volume = model.volume_of(&self.composition);
        self.fractal_dimension = model.fractal_dimension();
        self.sph_diameter = if self.volume > 0.0 {
            (6.0 * self.volume / PI).cbrt()
        } else {
            0.0
        };
        let sph_surface = self.sph_surface();
        if !(self.surface >= sph_surface) {
            self.surface = sph_surface;
        }
        self.coll_diameter = if self.volume > 0.0 && self.surface > 0.0 {
            self.pri_diameter() * self.primary_count().powf(1.0 / self.fractal_dimension)
        } else {
            0.0
        };
    }

    pub fn composition(&self) -> &[f64] {
        &self.composition
    }
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    pub fn mass(&self) -> f64 {
        self.mass
    }
    pub fn volume(&self) -> f64 {
        self.volume
    }
    pub fn surface(&self) -> f64 {
        self.surface
    }
    pub fn sph_diameter(&self) -> f64 {
        self.sph_diameter
    }
    pub fn coll_diameter(&self) -> f64 {
        self.coll_diameter
    }
    /// surface of the volume-equivalent sphere
    pub fn sph_surface(&self) -> f64 {
        PI * self.sph_diameter * self.sph_diameter
    }
    /// average primary diameter 6V/S
    pub fn pri_diameter(&self) -> f64 {
        if self.surface > 0.0 {
            6.0 * self.volume / self.surface
        } else {
            0.0
        }
    }
    /// number of primaries S^3/(36 pi V^2), at least one
    pub fn primary_count(&self) -> f64 {
        if self.volume > 0.0 {
            (self.surface.powi(3) / (36.0 * PI * self.volume * self.volume)).max(1.0)
        } else {
            1.0
        }
    }

    /// 1 for a sphere, 0 for two equal spheres in point contact (or anything less sintered)
    pub fn sintering_level(&self) -> f64 {
        if self.surface <= 0.0 {
            return 1.0;
        }
        let level = (self.sph_surface() / self.surface - TWO_SPHERE_RATIO) / (1.0 - TWO_SPHERE_RATIO);
        level.clamp(0.0, 1.0)
    }

    pub fn set_surface(&mut self, surface: f64, model: &ParticleModel) {
        self.surface = surface;
        self.update_cache(model);
    }

    /// Applies `n` times the composition and tracker change, stopping before any component
    /// would go negative. Returns the number of changes actually applied.
    /// The surface follows the volume as (V'/V)^(2/3).
    pub fn adjust(&mut self, dcomp: &[f64], dvalues: &[f64], n: u64, model: &ParticleModel) -> u64 {
        let mut allowed = n;
        for (x, dx) in self.composition.iter().zip(dcomp.iter()) {
            if *dx < 0.0 {
                let max_steps = (*x / -dx).floor();
                if max_steps < allowed as f64 {
                    allowed = max_steps.max(0.0) as u64;
                }
            }
        }
        if allowed == 0 {
            return 0;
        }
        let old_volume = self.volume;
        let k = allowed as f64;
        for (x, dx) in self.composition.iter_mut().zip(dcomp.iter()) {
            *x += k * dx;
        }
        for (v, dv) in self.values.iter_mut().zip(dvalues.iter()) {
            *v += k * dv;
        }
        let new_volume = model.volume_of(&self.composition);
        if old_volume > 0.0 && new_volume > 0.0 {
            self.surface *= (new_volume / old_volume).powf(2.0 / 3.0);
        } else {
            self.surface = 0.0;
        }
        self.update_cache(model);
        allowed
    }

    /// Merges `other` into this primary. Surfaces add for an aggregate, otherwise the result
    /// coalesces into a sphere.
    pub fn coagulate(&mut self, other: &Primary, model: &ParticleModel, coalesce: bool) {
        if self.composition.len() < other.composition.len() {
            self.composition.resize(other.composition.len(), 0.0);
        }
        if self.values.len() < other.values.len() {
            self.values.resize(other.values.len(), 0.0);
        }
        for (x, y) in self.composition.iter_mut().zip(other.composition.iter()) {
            *x += y;
        }
        for (x, y) in self.values.iter_mut().zip(other.values.iter()) {
            *x += y;
        }
        self.surface = if coalesce { 0.0 } else { self.surface + other.surface };
        self.update_cache(model);
    }

    pub fn is_valid(&self) -> bool {
        self.mass > 0.0 && self.mass.is_finite() && self.composition.iter().all(|x| *x >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    primary: Primary,
    stat_weight: f64,
    create_time: f64,
    last_update_time: f64,
    coag_count: u32,
}

impl Particle {
    pub fn new(primary: Primary, t: f64, stat_weight: f64) -> Self {
        Self {
            primary,
            stat_weight,
            create_time: t,
            last_update_time: t,
            coag_count: 0,
        }
    }

    pub fn primary(&self) -> &Primary {
        &self.primary
    }
    pub fn primary_mut(&mut self) -> &mut Primary {
        &mut self.primary
    }
    pub fn composition(&self) -> &[f64] {
        self.primary.composition()
    }
    pub fn values(&self) -> &[f64] {
        self.primary.values()
    }
    pub fn coll_diameter(&self) -> f64 {
        self.primary.coll_diameter()
    }
    pub fn sph_diameter(&self) -> f64 {
        self.primary.sph_diameter()
    }
    pub fn mass(&self) -> f64 {
        self.primary.mass()
    }
    pub fn volume(&self) -> f64 {
        self.primary.volume()
    }
    pub fn surface_area(&self) -> f64 {
        self.primary.surface()
    }
    pub fn sph_surface(&self) -> f64 {
        self.primary.sph_surface()
    }
    pub fn sintering_level(&self) -> f64 {
        self.primary.sintering_level()
    }
    pub fn stat_weight(&self) -> f64 {
        self.stat_weight
    }
    pub fn set_stat_weight(&mut self, w: f64) {
        self.stat_weight = w;
    }
    pub fn create_time(&self) -> f64 {
        self.create_time
    }
    pub fn last_update_time(&self) -> f64 {
        self.last_update_time
    }
    pub fn set_time(&mut self, t: f64) {
        self.last_update_time = t;
    }
    pub fn coag_count(&self) -> u32 {
        self.coag_count
    }

    /// Amount of the first component rounded to whole units: the particle-number size class.
    pub fn size_class(&self) -> usize {
        self.composition().first().map_or(0, |x| x.max(0.0).round() as usize)
    }

    pub fn property(&self, id: PropId) -> f64 {
        self.properties()[id.index()]
    }

    pub fn properties(&self) -> PropertyCache {
        let d = self.coll_diameter();
        let m = self.mass();
        let w = self.stat_weight;
        let (inv_d, inv_d2) = if d > 0.0 { (1.0 / d, 1.0 / (d * d)) } else { (0.0, 0.0) };
        let inv_sqrt_m = if m > 0.0 { 1.0 / m.sqrt() } else { 0.0 };
        let d2 = d * d;
        [
            1.0,
            d,
            d2,
            inv_d,
            inv_d2,
            inv_sqrt_m,
            d2 * inv_sqrt_m,
            m,
            self.surface_area(),
            w,
            w * d,
            w * d2,
            w * inv_d,
            w * inv_d2,
            w * inv_sqrt_m,
            w * d2 * inv_sqrt_m,
        ]
    }

    /// Adds `other` to this particle (composition, trackers, surface).
    pub fn coagulate(&mut self, other: &Particle, model: &ParticleModel, coalesce: bool) {
        self.primary.coagulate(&other.primary, model, coalesce);
        self.coag_count += 1;
    }

    pub fn is_valid(&self) -> bool {
        self.primary.is_valid() && self.stat_weight > 0.0 && self.stat_weight.is_finite()
    }
}

impl Versioned for Particle {
    const OBJECT: &'static str = "particle";
    const VERSION: u32 = 0;
    type Record = Particle;

    fn to_record(&self) -> Particle {
        self.clone()
    }

    fn from_record(record: Particle) -> Result<Self, SerializationError> {
        Ok(record)
    }
}
