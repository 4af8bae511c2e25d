//! # Utils Module
//!
//! ## Purpose
//! Small building blocks shared by the particle, process and solver modules.
//!
//! ## Main Components
//! - `constants`: physical constants and gas-phase property correlations used by rate kernels
//! - `random`: uniform, exponential, Poisson and binomial deviates drawn from a caller-owned RNG
//! - `serialization`: versioned binary persistence of particles, ensembles and model parameters
//! - `logger`: one-call initialisation of the `simplelog` backend for binaries and examples
pub mod constants;
pub mod logger;
pub mod random;
pub mod serialization;
