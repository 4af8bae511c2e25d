//! Random deviates used by the stochastic solver.
//!
//! Every function takes the caller's generator by reference; there is no global RNG state.
//! Each cell owns its own stream, so two cells never share a generator.
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Binomial, Distribution, Exp, Poisson};

/// Generator type used by solvers, examples and tests.
pub type RngType = ChaCha8Rng;

/// Creates a reproducible generator from a seed.
pub fn seeded_rng(seed: u64) -> RngType {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniform deviate in [0, 1)
pub fn uniform01(rng: &mut dyn RngCore) -> f64 {
    rng.r#gen::<f64>()
}

/// Uniform index in [0, n); n must be positive
pub fn uniform_index(n: usize, rng: &mut dyn RngCore) -> usize {
    rng.gen_range(0..n)
}

/// Waiting time of a Poisson process with the given total rate.
/// A zero (or negative after rounding) rate never fires: the result is infinite.
pub fn exponential_deviate(rate: f64, rng: &mut dyn RngCore) -> f64 {
    match Exp::new(rate) {
        Ok(exp) if rate > 0.0 => exp.sample(rng),
        _ => f64::INFINITY,
    }
}

/// Poisson deviate with mean `mu`; zero for a non-positive or non-finite mean.
pub fn poisson_deviate(mu: f64, rng: &mut dyn RngCore) -> u64 {
    if !(mu > 0.0) || !mu.is_finite() {
        return 0;
    }
    match Poisson::new(mu) {
        Ok(poisson) => {
            let k: f64 = poisson.sample(rng);
            k as u64
        }
        Err(_) => 0,
    }
}

/// Number of successes out of `n` trials with probability `p`.
pub fn binomial_deviate(n: u64, p: f64, rng: &mut dyn RngCore) -> u64 {
    if n == 0 || !(p > 0.0) {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    match Binomial::new(n, p) {
        Ok(binomial) => binomial.sample(rng),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_zero_rate_is_infinite() {
        let mut rng = seeded_rng(1);
        assert!(exponential_deviate(0.0, &mut rng).is_infinite());
        assert!(exponential_deviate(-1e-300, &mut rng).is_infinite());
    }

    #[test]
    fn test_exponential_mean() {
        let mut rng = seeded_rng(7);
        let rate = 4.0;
        let n = 200_000;
        let mean: f64 = (0..n).map(|_| exponential_deviate(rate, &mut rng)).sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 0.25, max_relative = 0.01);
    }

    #[test]
    fn test_poisson_mean_small_and_large() {
        let mut rng = seeded_rng(11);
        for &mu in [0.3, 5.0, 40.0, 1000.0].iter() {
            let n = 50_000;
            let samples: Vec<f64> = (0..n).map(|_| poisson_deviate(mu, &mut rng) as f64).collect();
            let mean = samples.iter().sum::<f64>() / n as f64;
            let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
            assert_relative_eq!(mean, mu, max_relative = 0.03);
            assert_relative_eq!(var, mu, max_relative = 0.08);
        }
        assert_eq!(poisson_deviate(0.0, &mut rng), 0);
        assert_eq!(poisson_deviate(f64::NAN, &mut rng), 0);
    }

    #[test]
    fn test_binomial_limits() {
        let mut rng = seeded_rng(3);
        assert_eq!(binomial_deviate(10, 0.0, &mut rng), 0);
        assert_eq!(binomial_deviate(10, 1.0, &mut rng), 10);
        let n = 20_000;
        let mean = (0..n).map(|_| binomial_deviate(1000, 0.9, &mut rng) as f64).sum::<f64>() / n as f64;
        assert_relative_eq!(mean, 900.0, max_relative = 0.01);
        assert!((0..100).all(|_| binomial_deviate(40, 0.5, &mut rng) <= 40));
    }

    #[test]
    fn test_binomial_mean_and_variance() {
        let mut rng = seeded_rng(5);
        for &(trials, p) in [(30u64, 0.2), (1000, 0.5), (5000, 0.03)].iter() {
            let n = 20_000;
            let samples: Vec<f64> = (0..n).map(|_| binomial_deviate(trials, p, &mut rng) as f64).collect();
            let mean = samples.iter().sum::<f64>() / n as f64;
            let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
            let expected_mean = trials as f64 * p;
            assert_relative_eq!(mean, expected_mean, max_relative = 0.02);
            assert_relative_eq!(var, expected_mean * (1.0 - p), max_relative = 0.08);
        }
    }
}
