//! # StochasticSolver Module
//!
//! ## Purpose
//! Time integration of the particle population of a cell by direct simulation: exponential
//! waiting times between jump events, operator splitting for deferred processes, adaptive
//! inception weights.
//!
//! ## Main Structures
//! - `gas_state::GasState`: temperature, pressure and species concentrations seen by the particles
//! - `gas_state::GasProfile`: gas state as a function of time (constant or tabulated)
//! - `cell::Cell`: ensemble plus gas state, inception weight and particle streams
//! - `weight_scaling::InceptionWeighting`: incepting weight as a function of ensemble fill
//! - `solver::Solver`: the stochastic stepping loop
pub mod cell;
pub mod gas_state;
pub mod solver;
mod solver_tests;
pub mod weight_scaling;
