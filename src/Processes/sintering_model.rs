//! Sintering of aggregates: the surface area relaxes towards that of the volume-equivalent
//! sphere with a characteristic time that depends on temperature and primary diameter.
//!
//! - viscous flow: `tau = A dp exp(E / (R T))`
//! - grain-boundary diffusion: `tau = A T dp^4 exp(E / (R T))`
//!
//! `E` is an activation energy in J/mol. The primary diameter used is never below `dp_min`.
use crate::Particles::particle::Particle;
use crate::Particles::particle_model::ParticleModel;
use crate::Processes::process_api::ProcessError;
use crate::StochasticSolver::gas_state::GasState;
use crate::Utils::constants::R_G;
use crate::Utils::serialization::{SerializationError, Versioned};
use log::warn;
use serde::{Deserialize, Serialize};

/// Relative distance to the spherical surface below which sintering is complete
const SPHERE_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinteringType {
    ViscousFlow,
    GrainBoundaryDiffusion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinteringModel {
    enabled: bool,
    a: f64,
    e: f64,
    dp_min: f64,
    kind: SinteringType,
}

impl Default for SinteringModel {
    fn default() -> Self {
        Self {
            enabled: false,
            a: 0.0,
            e: 0.0,
            dp_min: 0.0,
            kind: SinteringType::ViscousFlow,
        }
    }
}

impl SinteringModel {
    /// Enabled model with pre-exponential factor `a`, activation energy `e` (J/mol) and
    /// minimum primary diameter `dp_min` (m).
    pub fn new(kind: SinteringType, a: f64, e: f64, dp_min: f64) -> Self {
        Self {
            enabled: true,
            a,
            e,
            dp_min,
            kind,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn enable(&mut self) {
        self.enabled = true;
    }
    pub fn disable(&mut self) {
        self.enabled = false;
    }
    pub fn a(&self) -> f64 {
        self.a
    }
    pub fn set_a(&mut self, a: f64) {
        self.a = a;
    }
    pub fn e(&self) -> f64 {
        self.e
    }
    pub fn set_e(&mut self, e: f64) {
        self.e = e;
    }
    pub fn dp_min(&self) -> f64 {
        self.dp_min
    }
    pub fn set_dp_min(&mut self, dp_min: f64) {
        self.dp_min = dp_min;
    }
    pub fn kind(&self) -> SinteringType {
        self.kind
    }
    pub fn set_kind(&mut self, kind: SinteringType) {
        self.kind = kind;
    }

    /// Characteristic sintering time at temperature `t` for primary diameter `dp`, s
    pub fn characteristic_time(&self, t: f64, dp: f64) -> f64 {
        let dp = dp.max(self.dp_min);
        let arrhenius = (self.e / (R_G * t)).exp();
        match self.kind {
            SinteringType::ViscousFlow => self.a * dp * arrhenius,
            SinteringType::GrainBoundaryDiffusion => self.a * t * dp.powi(4) * arrhenius,
        }
    }

    /// Characteristic time of a particle in the given gas, s
    pub fn sint_time(&self, gas: &GasState, particle: &Particle) -> f64 {
        self.characteristic_time(gas.temperature(), particle.primary().pri_diameter())
    }

    /// Rate of surface loss, m2/s; zero for a sphere or a disabled model.
    pub fn rate(&self, gas: &GasState, particle: &Particle) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let excess = (particle.surface_area() - particle.sph_surface()).max(0.0);
        if excess == 0.0 {
            return 0.0;
        }
        let tau = self.sint_time(gas, particle);
        if tau > 0.0 && tau.is_finite() { excess / tau } else { 0.0 }
    }

    /// Sinters `particle` for `dt` seconds. The excess surface decays exponentially; the
    /// step is cut into pieces no longer than the current characteristic time because that
    /// time shrinks as the primaries grow.
    pub fn perform(
        &self,
        dt: f64,
        gas: &GasState,
        particle: &mut Particle,
        model: &ParticleModel,
    ) -> Result<(), ProcessError> {
        if !self.enabled || !(dt > 0.0) {
            return Ok(());
        }
        let mut remaining = dt;
        while remaining > 0.0 {
            let sph = particle.sph_surface();
            let surface = particle.surface_area();
            if surface - sph <= SPHERE_TOLERANCE * sph {
                break;
            }
            let tau = self.sint_time(gas, particle);
            if !(tau > 0.0 && tau.is_finite()) {
                warn!("sintering time {tau} at T = {} K", gas.temperature());
                return Err(ProcessError::Sintering(format!(
                    "characteristic time {tau} is not a positive finite number"
                )));
            }
            let h = remaining.min(tau);
            let new_surface = sph + (surface - sph) * (-h / tau).exp();
            particle.primary_mut().set_surface(new_surface, model);
            remaining -= h;
        }
        Ok(())
    }
}

impl Versioned for SinteringModel {
    const OBJECT: &'static str = "sintering model";
    const VERSION: u32 = 0;
    type Record = SinteringModel;

    fn to_record(&self) -> SinteringModel {
        self.clone()
    }

    fn from_record(record: SinteringModel) -> Result<Self, SerializationError> {
        if record.enabled && !(record.a > 0.0) {
            return Err(SerializationError::InvalidState {
                object: Self::OBJECT,
                reason: format!("enabled model with pre-exponential factor {}", record.a),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Particles::particle_model::Component;
    use approx::assert_relative_eq;

    fn model() -> ParticleModel {
        ParticleModel::new(vec![Component::new("TiO2", 0.0799, 4230.0)], Vec::new())
    }

    fn aggregate(model: &ParticleModel) -> Particle {
        let mut p = model.new_particle(0.0, &[2000.0], &[], 1.0);
        let other = model.new_particle(0.0, &[2000.0], &[], 1.0);
        p.coagulate(&other, model, false);
        p
    }

    #[test]
    fn characteristic_times() {
        let visc = SinteringModel::new(SinteringType::ViscousFlow, 2.0, 1000.0, 1e-9);
        let t = 1500.0;
        assert_relative_eq!(
            visc.characteristic_time(t, 5e-9),
            2.0 * 5e-9 * (1000.0 / (R_G * t)).exp(),
            max_relative = 1e-12
        );
        // below dp_min the minimum diameter is used
        assert_relative_eq!(
            visc.characteristic_time(t, 1e-10),
            visc.characteristic_time(t, 1e-9),
            max_relative = 1e-12
        );
        let gbd = SinteringModel::new(SinteringType::GrainBoundaryDiffusion, 3.0, 2000.0, 0.0);
        assert_relative_eq!(
            gbd.characteristic_time(t, 4e-9),
            3.0 * t * 4e-9f64.powi(4) * (2000.0 / (R_G * t)).exp(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn rate_is_zero_for_spheres_and_disabled_models() {
        let m = model();
        let gas = GasState::inert(1500.0, 101325.0);
        let sphere = m.new_particle(0.0, &[4000.0], &[], 1.0);
        let sint = SinteringModel::new(SinteringType::ViscousFlow, 1e8, 0.0, 0.0);
        assert_eq!(sint.rate(&gas, &sphere), 0.0);
        let agg = aggregate(&m);
        assert!(sint.rate(&gas, &agg) > 0.0);
        assert_eq!(SinteringModel::default().rate(&gas, &agg), 0.0);
    }

    #[test]
    fn surface_relaxes_monotonically_to_sphere() {
        let m = model();
        let gas = GasState::inert(1500.0, 101325.0);
        let sint = SinteringModel::new(SinteringType::ViscousFlow, 1e3, 0.0, 0.0);
        let mut p = aggregate(&m);
        let sph = p.sph_surface();
        let mut last = p.surface_area();
        let tau = sint.sint_time(&gas, &p);
        for _ in 0..10 {
            sint.perform(0.2 * tau, &gas, &mut p, &m).unwrap();
            let s = p.surface_area();
            assert!(s <= last);
            assert!(s >= sph * (1.0 - 1e-12));
            last = s;
        }
        sint.perform(1000.0 * tau, &gas, &mut p, &m).unwrap();
        assert_relative_eq!(p.surface_area(), sph, max_relative = 1e-5);
        assert_relative_eq!(p.sintering_level(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn invalid_time_is_an_error() {
        let m = model();
        let gas = GasState::inert(1500.0, 101325.0);
        let sint = SinteringModel::new(SinteringType::ViscousFlow, 0.0, 0.0, 0.0);
        let mut p = aggregate(&m);
        let err = sint.perform(1.0, &gas, &mut p, &m).unwrap_err();
        assert_eq!(err.status(), -4);
    }

    #[test]
    fn versioned_round_trip() {
        let sint = SinteringModel::new(SinteringType::GrainBoundaryDiffusion, 5.0, 1e5, 2e-9);
        let bytes = sint.to_bytes().unwrap();
        assert_eq!(SinteringModel::from_bytes(&bytes).unwrap(), sint);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let sint = SinteringModel::new(SinteringType::ViscousFlow, 1e-14, 3.0e5, 1e-9);
        let mut bytes = sint.to_bytes().unwrap();
        bytes[0] = 9;
        match SinteringModel::from_bytes(&bytes) {
            Err(SerializationError::UnknownVersion { found, .. }) => assert_eq!(found, 9),
            other => panic!("expected unknown version error, got {:?}", other),
        }
    }
}
