use ndarray::{ArrayView1, ArrayViewMut1, Zip};

use super::{Optimizer, optimizer::check_sizes};
use crate::{Device, Result};

/// Gradient descent optimization algorithm.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f32,
    device: Device,
}

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    ///
    /// # Arguments
    /// * `learning_rate` - The *length* of the steps taken on `update_params`.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            device: Device::Cpu,
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

impl Optimizer for GradientDescent {
    /// Makes a step in the opposite direction of the gradient, with a length of `learning_rate`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad, params, None)?;

        let lr = self.learning_rate;
        let zip = Zip::from(ArrayViewMut1::from(params)).and(ArrayView1::from(grad));
        match self.device {
            Device::Cpu => zip.for_each(|w, g| *w -= lr * g),
            Device::Parallel => zip.par_for_each(|w, g| *w -= lr * g),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut sgd = GradientDescent::new(0.5);
        let mut params = [1.0, -1.0, 0.0];

        sgd.update_params(&[2.0, -2.0, 0.0], &mut params).unwrap();
        assert_eq!(params, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn parallel_matches_cpu() {
        let grad = [0.25; 64];
        let mut cpu = [1.0; 64];
        let mut par = [1.0; 64];

        GradientDescent::new(0.1).update_params(&grad, &mut cpu).unwrap();
        GradientDescent::new(0.1)
            .with_device(Device::Parallel)
            .update_params(&grad, &mut par)
            .unwrap();
        assert_eq!(cpu, par);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        assert!(GradientDescent::new(0.1).update_params(&[1.0], &mut []).is_err());
    }
}
