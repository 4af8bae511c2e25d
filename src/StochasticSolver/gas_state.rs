//! Gas-phase conditions seen by the particle processes of a cell, and providers that
//! supply them as a function of time.
use crate::Utils::constants::{knudsen_length, viscosity_air};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Temperature (K), pressure (Pa) and species concentrations (mol/m3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasState {
    temperature: f64,
    pressure: f64,
    concentrations: DVector<f64>,
}

impl GasState {
    pub fn new(temperature: f64, pressure: f64, concentrations: DVector<f64>) -> Self {
        Self {
            temperature,
            pressure,
            concentrations,
        }
    }

    /// Gas without tracked species
    pub fn inert(temperature: f64, pressure: f64) -> Self {
        Self::new(temperature, pressure, DVector::zeros(0))
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }
    pub fn pressure(&self) -> f64 {
        self.pressure
    }
    pub fn set_temperature(&mut self, t: f64) {
        self.temperature = t;
    }
    pub fn set_pressure(&mut self, p: f64) {
        self.pressure = p;
    }
    pub fn concentrations(&self) -> &DVector<f64> {
        &self.concentrations
    }
    /// Same temperature and pressure with another composition
    pub fn with_concentrations(mut self, concentrations: DVector<f64>) -> Self {
        self.concentrations = concentrations;
        self
    }
    pub fn species_count(&self) -> usize {
        self.concentrations.len()
    }
    /// Concentration of species `i`; zero for species that are not tracked
    pub fn concentration(&self, i: usize) -> f64 {
        self.concentrations.get(i).copied().unwrap_or(0.0)
    }
    pub fn total_concentration(&self) -> f64 {
        self.concentrations.sum()
    }
    pub fn mole_fraction(&self, i: usize) -> f64 {
        let total = self.total_concentration();
        if total > 0.0 { self.concentration(i) / total } else { 0.0 }
    }

    /// Adds `dc` to species `i`, never going below zero.
    pub fn adjust_concentration(&mut self, i: usize, dc: f64) {
        if let Some(c) = self.concentrations.get_mut(i) {
            *c = (*c + dc).max(0.0);
        }
    }

    /// Viscosity of the carrier gas (air), Pa*s
    pub fn viscosity(&self) -> f64 {
        viscosity_air(self.temperature)
    }

    /// Twice the mean free path of the carrier gas, m
    pub fn knudsen_length(&self) -> f64 {
        knudsen_length(self.temperature, self.pressure)
    }

    /// Linear blend: `self` at f = 0, `other` at f = 1.
    pub fn interpolate(&self, other: &GasState, f: f64) -> GasState {
        let concentrations = if self.concentrations.len() == other.concentrations.len() {
            &self.concentrations * (1.0 - f) + &other.concentrations * f
        } else {
            self.concentrations.clone()
        };
        GasState {
            temperature: self.temperature + f * (other.temperature - self.temperature),
            pressure: self.pressure + f * (other.pressure - self.pressure),
            concentrations,
        }
    }
}

/// Source of gas-phase conditions for a cell at a given time.
pub trait GasProfile {
    fn gas_state_at(&self, t: f64) -> GasState;
}

#[derive(Debug, Clone)]
pub struct ConstantGasProfile {
    state: GasState,
}

impl ConstantGasProfile {
    pub fn new(state: GasState) -> Self {
        Self { state }
    }
}

impl GasProfile for ConstantGasProfile {
    fn gas_state_at(&self, _t: f64) -> GasState {
        self.state.clone()
    }
}

/// Piecewise-linear profile through time-stamped gas states, held constant outside the table.
#[derive(Debug, Clone)]
pub struct TabulatedGasProfile {
    points: Vec<(f64, GasState)>,
}

impl TabulatedGasProfile {
    /// None if `points` is empty.
    pub fn new(mut points: Vec<(f64, GasState)>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(Self { points })
    }

    pub fn points(&self) -> &[(f64, GasState)] {
        &self.points
    }
}

impl GasProfile for TabulatedGasProfile {
    fn gas_state_at(&self, t: f64) -> GasState {
        // first point strictly after t
        let upper = self.points.partition_point(|(ti, _)| *ti <= t);
        if upper == 0 {
            return self.points[0].1.clone();
        }
        if upper == self.points.len() {
            return self.points[upper - 1].1.clone();
        }
        let (t0, g0) = &self.points[upper - 1];
        let (t1, g1) = &self.points[upper];
        let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        g0.interpolate(g1, f)
    }
}
