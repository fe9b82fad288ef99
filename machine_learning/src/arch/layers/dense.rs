use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `act_fn(x · Wᵀ + b)`.
///
/// The layer holds no parameters itself, it views a slice of `(in + 1) * out` parameters as a
/// weight matrix of shape `(out, in)` followed by a bias vector of `out` values. Gradients are laid
/// out the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation, `None` leaves the layer affine.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            act_fn,
            size: (dim.0 + 1) * dim.1,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<&ActFn> {
        self.act_fn.as_ref()
    }

    /// Computes the affine part of the layer, `x · Wᵀ + b`.
    ///
    /// # Errors
    /// `MlErr::ShapeMismatch` if `x` has not `in` columns or `params` has not `size` values.
    pub fn preactivate(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::ShapeMismatch {
                what: "input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w.t(), 0.0, &mut z);
        z += &b;
        Ok(z)
    }

    /// Applies the activation function to a preactivation.
    pub fn activate(&self, z: &Array2<f32>) -> Array2<f32> {
        match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        }
    }

    pub fn forward(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.preactivate(params, x)?;
        Ok(match &self.act_fn {
            Some(act_fn) => z.mapv_into(|z| act_fn.f(z)),
            None => z,
        })
    }

    /// Accumulates into `grad` the gradient of this layer given the delta of its output.
    ///
    /// # Arguments
    /// * `grad` - This layer's slice of the gradient buffer, added to (not overwritten).
    /// * `x` - The input the layer saw on the forward pass.
    /// * `z` - The preactivation computed on the forward pass.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the preactivation, ready to be fed to
    /// `Dense::propagate`.
    pub fn backward(
        &self,
        grad: &mut [f32],
        x: ArrayView2<f32>,
        z: ArrayView2<f32>,
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != z.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "output delta",
                got: d.len(),
                expected: z.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &d.t(), &x, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));
        Ok(d)
    }

    /// Propagates a preactivation delta to this layer's input, `d · W`.
    pub fn propagate(&self, params: &[f32], d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let w_size = self.split(params.len())?;
        let (w_raw, b_raw) = params.split_at(w_size);
        let w = ArrayView2::from_shape((self.dim.1, self.dim.0), w_raw)
            .map_err(|_| self.mismatch("parameters", params.len()))?;
        let b = ArrayView1::from(b_raw);
        Ok((w, b))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let len = grad.len();
        let w_size = self.split(len)?;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape((self.dim.1, self.dim.0), dw_raw)
            .map_err(|_| self.mismatch("gradient", len))?;
        let db = ArrayViewMut1::from(db_raw);
        Ok((dw, db))
    }

    /// Checks a slice length against this layer's size and returns the amount of weights.
    fn split(&self, len: usize) -> Result<usize> {
        if len != self.size {
            return Err(self.mismatch("layer parameters", len));
        }

        Ok(self.size - self.dim.1)
    }

    fn mismatch(&self, what: &'static str, got: usize) -> MlErr {
        MlErr::ShapeMismatch {
            what,
            got,
            expected: self.size,
        }
    }
}
