//! # Processes Module
//!
//! ## Purpose
//! Everything that changes the particle population of a cell.
//!
//! ## Main Structures
//! - `process_api::ParticleProcess`: process interface, `process_api::Process` the closed set of variants
//! - `inception::Inception`: birth of new particles from gas-phase species
//! - `surface_reaction::SurfaceReaction` / `surface_reaction::ActiveSitesReaction`: per-particle growth and oxidation
//! - `coagulation::Coagulation`: particle pairs merging, majorant kernels and fictitious events
//! - `sintering_model::SinteringModel` and `sintering::Sintering`: relaxation of aggregates towards spheres
//! - `transport::Transport`, `transport::Inflow`, `transport::Outflow`: particles leaving and entering a cell
//! - `mechanism::Mechanism`: the ordered process list shared read-only by all cells of a run
pub mod coagulation;
mod coagulation_tests;
pub mod inception;
pub mod mechanism;
mod mechanism_tests;
pub mod process_api;
pub mod sintering;
pub mod sintering_model;
pub mod surface_reaction;
pub mod transport;
