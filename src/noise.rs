//! Seeded noise injectors.
//!
//! Samples are visited in memory order with a single `StdRng`, so the same
//! input, parameters and seed always produce the same buffer.

use ndarray::Array3;
use rand::prelude::*;
use rand_distr::{Distribution, Normal, Poisson};

/// Largest accepted Poisson scale (expected counts per intensity unit).
pub const MAX_POISSON_SCALE: f32 = 1.0e6;

/// Add zero-mean Gaussian noise with standard deviation `sigma`.
pub(crate) fn add_gaussian_noise(data: &Array3<f32>, sigma: f32, seed: u64) -> Array3<f32> {
    if sigma == 0.0 {
        return data.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = match Normal::new(0.0f32, sigma) {
        Ok(normal) => normal,
        Err(_) => return data.clone(),
    };
    data.mapv(|v| v + normal.sample(&mut rng))
}

/// Replace each sample `v` by `Poisson(v * scale) / scale`.
///
/// The variance grows with intensity, as photon-counting noise does.
/// Samples at or below zero carry no signal and are left unchanged.
pub(crate) fn add_poisson_noise(data: &Array3<f32>, scale: f32, seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = scale as f64;
    data.mapv(|v| {
        let lambda = v as f64 * scale;
        if lambda <= 0.0 || !lambda.is_finite() {
            return v;
        }
        match Poisson::new(lambda) {
            Ok(poisson) => {
                let count: f64 = poisson.sample(&mut rng);
                (count / scale) as f32
            }
            Err(_) => v,
        }
    })
}

/// Set a `fraction` of the samples to `low` or `high` with equal probability.
pub(crate) fn add_salt_and_pepper(
    data: &Array3<f32>,
    fraction: f32,
    (low, high): (f32, f32),
    seed: u64,
) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let fraction = fraction.clamp(0.0, 1.0) as f64;
    data.mapv(|v| {
        if !rng.gen_bool(fraction) {
            return v;
        }
        if rng.gen_bool(0.5) { high } else { low }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat(value: f32) -> Array3<f32> {
        Array3::from_elem((1, 64, 64), value)
    }

    fn mean_and_std(data: &Array3<f32>) -> (f32, f32) {
        let n = data.len() as f32;
        let mean = data.sum() / n;
        let var = data.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn gaussian_noise_is_reproducible() {
        let a = add_gaussian_noise(&flat(100.0), 10.0, 42);
        let b = add_gaussian_noise(&flat(100.0), 10.0, 42);
        let c = add_gaussian_noise(&flat(100.0), 10.0, 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn gaussian_noise_matches_requested_sigma() {
        let noisy = add_gaussian_noise(&flat(100.0), 10.0, 7);
        let (mean, std) = mean_and_std(&noisy);
        assert_relative_eq!(mean, 100.0, epsilon = 1.0);
        assert_relative_eq!(std, 10.0, epsilon = 1.0);
    }

    #[test]
    fn zero_sigma_is_identity() {
        let data = flat(5.0);
        assert_eq!(add_gaussian_noise(&data, 0.0, 1), data);
    }

    #[test]
    fn poisson_variance_grows_with_intensity() {
        let (_, low_std) = mean_and_std(&add_poisson_noise(&flat(10.0), 1.0, 3));
        let (high_mean, high_std) = mean_and_std(&add_poisson_noise(&flat(1000.0), 1.0, 3));
        assert!(high_std > low_std);
        assert_relative_eq!(high_mean, 1000.0, epsilon = 5.0);
        assert_relative_eq!(high_std, 1000.0f32.sqrt(), epsilon = 3.0);
    }

    #[test]
    fn poisson_leaves_non_positive_samples() {
        let data = flat(0.0);
        assert_eq!(add_poisson_noise(&data, 1.0, 3), data);
    }

    #[test]
    fn salt_and_pepper_hits_requested_fraction() {
        let data = flat(50.0);
        let noisy = add_salt_and_pepper(&data, 0.2, (0.0, 100.0), 11);
        let hits = noisy.iter().filter(|&&v| v != 50.0).count() as f32 / data.len() as f32;
        assert_relative_eq!(hits, 0.2, epsilon = 0.03);
        assert!(noisy.iter().all(|&v| v == 0.0 || v == 50.0 || v == 100.0));
        assert!(noisy.iter().any(|&v| v == 0.0));
        assert!(noisy.iter().any(|&v| v == 100.0));
    }

    #[test]
    fn salt_and_pepper_extremes() {
        let data = flat(50.0);
        assert_eq!(add_salt_and_pepper(&data, 0.0, (0.0, 100.0), 1), data);
        assert!(
            add_salt_and_pepper(&data, 1.0, (0.0, 100.0), 1)
                .iter()
                .all(|&v| v == 0.0 || v == 100.0)
        );
    }
}
