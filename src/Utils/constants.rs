//! Physical constants fixed for all rate kernels, and simple gas property correlations.

/// Avogadro's number, 1/mol
pub const NA: f64 = 6.02214179e23;
/// Boltzmann constant, J/K
pub const KB: f64 = 1.3806504e-23;
/// Universal gas constant, J/(mol K)
pub const R_G: f64 = 8.314472;
pub const PI: f64 = std::f64::consts::PI;

/// Free-molecular collision constant sqrt(pi*KB/2)
pub const CFM: f64 = 4.656952412155298e-12;
/// Majorant factor for the free-molecular kernel
pub const CFMMAJ: f64 = 1.4178;
/// Slip-flow collision constant 2*KB/3
pub const CSF: f64 = 2.0 * KB / 3.0;
/// Knudsen length factor: twice the mean free path of air is KNUDSEN_K * T / P, m
pub const KNUDSEN_K: f64 = 4.74151636e-5;
/// Cunningham slip correction factor
pub const CUNNINGHAM_A: f64 = 1.257;
/// Free-molecular enhancement factor (van der Waals)
pub const EFM: f64 = 2.2;

/// Dynamic viscosity of air by Sutherland's law, Pa*s
pub fn viscosity_air(t: f64) -> f64 {
    1.458e-6 * t * t.sqrt() / (t + 110.4)
}

/// Twice the mean free path of air molecules at temperature `t` (K) and pressure `p` (Pa), m
pub fn knudsen_length(t: f64, p: f64) -> f64 {
    if p > 0.0 { KNUDSEN_K * t / p } else { 0.0 }
}

/// Mean free path of air molecules, m
pub fn mean_free_path_air(t: f64, p: f64) -> f64 {
    0.5 * knudsen_length(t, p)
}
