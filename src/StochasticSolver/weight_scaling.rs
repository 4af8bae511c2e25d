//! Adaptive inception weighting: as the ensemble fills, new particles are incepted with a
//! growing statistical weight so that the ensemble does not overflow.
//!
//! Below `n_min` computational particles the weight is `w_min`; above, it follows the
//! selected function from `w_min` at `n_min` to `w_max` at the ensemble capacity (and keeps
//! growing beyond it if contraction lets the count go further).
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightScalingFn {
    Linear,
    Quadratic,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InceptionWeighting {
    pub w_min: f64,
    pub w_max: f64,
    /// particle count at which the weight starts to grow
    pub n_min: f64,
    pub function: WeightScalingFn,
}

impl InceptionWeighting {
    pub fn new(w_min: f64, w_max: f64, n_min: f64, function: WeightScalingFn) -> Self {
        Self {
            w_min,
            w_max,
            n_min,
            function,
        }
    }

    /// Incepting weight for `n` computational particles in an ensemble of `capacity`
    pub fn weight(&self, n: f64, capacity: f64) -> f64 {
        let (w_min, w_max, n_min) = (self.w_min, self.w_max, self.n_min);
        if n <= n_min || capacity <= n_min {
            return w_min;
        }
        let span = capacity - n_min;
        let x = n - n_min;
        match self.function {
            WeightScalingFn::Linear => w_min + (w_max - w_min) * x / span,
            WeightScalingFn::Quadratic => w_min + (w_max - w_min) * (x / span).powi(2),
            WeightScalingFn::Exponential => w_min * ((w_max / w_min).ln() * x / span).exp(),
        }
    }
}
