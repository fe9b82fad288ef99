use ndarray::{Array2, ArrayView2};

use super::loss::LossFn;
use crate::Result;

/// A differentiable model that owns its parameters as one flat buffer.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    fn params(&self) -> &[f32];

    fn params_mut(&mut self) -> &mut [f32];

    /// Computes the model's output for a batch, one row per sample.
    ///
    /// # Errors
    /// `MlErr::ShapeMismatch` if `x` does not have the width the model expects.
    fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss over a batch and **adds** it, scaled by `weight`, to
    /// `grad`. Parameters are left untouched.
    ///
    /// # Arguments
    /// * `x` - The batch features.
    /// * `y` - The batch labels.
    /// * `loss_fn` - The loss function.
    /// * `weight` - A factor applied to the gradient, used to combine gradients of sub-batches.
    /// * `grad` - A buffer of `size` values the gradient is accumulated on.
    ///
    /// # Returns
    /// The (unweighted) mean loss of the batch.
    fn backprop<L: LossFn>(
        &self,
        x: ArrayView2<f32>,
        y: &[usize],
        loss_fn: &L,
        weight: f32,
        grad: &mut [f32],
    ) -> Result<f32>;
}
