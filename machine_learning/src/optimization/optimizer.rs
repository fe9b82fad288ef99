use crate::{MlErr, Result};

/// An optimization algorithm, it moves the parameters of a model given their gradient.
pub trait Optimizer {
    /// Updates `params` in place with one step of the algorithm.
    ///
    /// # Errors
    /// `MlErr::ShapeMismatch` if `grad` and `params` (or the optimizer's own state) differ in size.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }
}

pub(super) fn check_sizes(grad: &[f32], params: &[f32], state: Option<usize>) -> Result<()> {
    if grad.len() != params.len() {
        return Err(MlErr::ShapeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    match state {
        Some(len) if len != params.len() => Err(MlErr::ShapeMismatch {
            what: "optimizer state",
            got: len,
            expected: params.len(),
        }),
        _ => Ok(()),
    }
}
