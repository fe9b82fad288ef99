use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::dataset::InMemoryDataset;
use crate::{MlErr, Result};

const CENTER_BOX: f32 = 10.0;

/// Generates isotropic gaussian blobs, one per class.
///
/// Class centers are drawn uniformly from `[-10, 10)` on every feature and sample `i` belongs
/// to class `i % n_classes`, so classes are balanced.
///
/// # Arguments
/// * `n_samples` - The amount of samples to generate.
/// * `n_features` - The width of every sample.
/// * `n_classes` - The amount of blobs.
/// * `spread` - The standard deviation of every blob.
/// * `rng` - A random number generator.
pub fn blobs<R: Rng + ?Sized>(
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    spread: f32,
    rng: &mut R,
) -> Result<InMemoryDataset> {
    if n_samples == 0 || n_features == 0 || n_classes == 0 {
        return Err(MlErr::invalid_config(
            "blobs need at least one sample, feature and class",
        ));
    }

    if spread.is_nan() || spread < 0.0 {
        return Err(MlErr::invalid_config(format!(
            "blob spread must be non negative, got {spread}"
        )));
    }

    let noise = Normal::new(0.0, spread)
        .map_err(|e| MlErr::invalid_config(format!("invalid blob spread {spread}: {e}")))?;
    let box_ = Uniform::new(-CENTER_BOX, CENTER_BOX)
        .map_err(|e| MlErr::invalid_config(e.to_string()))?;

    let centers = Array2::from_shape_simple_fn((n_classes, n_features), || box_.sample(rng));
    let labels: Vec<_> = (0..n_samples).map(|i| i % n_classes).collect();
    let xs = Array2::from_shape_fn((n_samples, n_features), |(i, j)| {
        centers[[labels[i], j]] + noise.sample(rng)
    });

    InMemoryDataset::new(xs, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn blobs_are_balanced_and_shaped() {
        let mut rng = StdRng::seed_from_u64(1);
        let ds = blobs(30, 4, 3, 0.5, &mut rng).unwrap();

        assert_eq!(ds.len(), 30);
        assert_eq!(ds.feature_size(), 4);
        assert_eq!(ds.n_classes(), 3);
        for class in 0..3 {
            assert_eq!(ds.labels().iter().filter(|&&y| y == class).count(), 10);
        }
    }

    #[test]
    fn blobs_are_reproducible_with_a_seed() {
        let a = blobs(10, 2, 2, 1.0, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = blobs(10, 2, 2, 1.0, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.features(), b.features());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(blobs(0, 2, 2, 1.0, &mut rng).is_err());
        assert!(blobs(10, 2, 2, -1.0, &mut rng).is_err());
        assert!(matches!(
            blobs(10, 2, 2, f32::NAN, &mut rng),
            Err(MlErr::InvalidConfig(msg)) if msg.contains("spread")
        ));
        assert!(blobs(10, 2, 2, 0.0, &mut rng).is_ok());
    }
}
