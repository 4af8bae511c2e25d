//! # Particles Module
//!
//! ## Purpose
//! Representation of the particle population of one cell.
//!
//! ## Main Structures
//! - `particle_model::ParticleModel`: components, trackers and aggregate geometry parameters
//! - `particle::Particle` / `particle::Primary`: one computational particle and its cached properties
//! - `sum_tree::SumTree`: O(log n) property sums and property-weighted selection
//! - `pn_register::PnRegister`: count-only storage of small particles (hybrid representation)
//! - `ensemble::Ensemble`: fixed-capacity particle arena with doubling/contraction scaling
pub mod ensemble;
pub mod particle;
pub mod particle_model;
pub mod pn_register;
pub mod sum_tree;
