#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod Particles;
#[allow(non_snake_case)]
pub mod Processes;
#[allow(non_snake_case)]
pub mod StochasticSolver;
#[allow(non_snake_case)]
pub mod Utils;
pub mod settings;
