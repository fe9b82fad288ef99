use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A loss over a batch of scores and their class labels.
pub trait LossFn {
    /// Returns the mean loss over the rows of `y_pred`.
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32>;

    /// Returns the derivative of `loss` with respect to every entry of `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>>;
}
