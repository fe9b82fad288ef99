use std::mem;

use log::debug;
use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, ParamInit, activations::ActFn, layers::Dense, loss::LossFn};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The model owns one flat parameter buffer, each layer views its own contiguous slice of it.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
    params: Vec<f32>,
}

impl Sequential {
    /// Creates a new `Sequential` with every parameter set to zero.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if there are no layers, `MlErr::ShapeMismatch` if the outputs of a
    /// layer do not match the inputs of the next one.
    pub fn new<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Dense>,
    {
        let layers: Vec<_> = layers.into_iter().collect();
        if layers.is_empty() {
            return Err(MlErr::invalid_config("a model needs at least one layer"));
        }

        for pair in layers.windows(2) {
            let (out, next_in) = (pair[0].dim().1, pair[1].dim().0);
            if out != next_in {
                return Err(MlErr::ShapeMismatch {
                    what: "layer inputs",
                    got: next_in,
                    expected: out,
                });
            }
        }

        let size = layers.iter().map(Dense::size).sum();
        Ok(Self {
            layers,
            params: vec![0.0; size],
        })
    }

    /// Creates a new `Sequential` initializing each layer's parameters with `init`.
    pub fn with_init<I, R>(layers: I, init: ParamInit, rng: &mut R) -> Result<Self>
    where
        I: IntoIterator<Item = Dense>,
        R: Rng + ?Sized,
    {
        let mut model = Self::new(layers)?;
        let mut rest = model.params.as_mut_slice();
        for layer in &model.layers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            let (fan_in, fan_out) = layer.dim();
            init.fill(head, fan_in, fan_out, rng)?;
            rest = tail;
        }

        debug!(size = model.params.len(), layers = model.layers.len(); "initialized model");
        Ok(model)
    }

    /// Creates a new `Sequential` over existing parameters.
    ///
    /// # Errors
    /// `MlErr::ShapeMismatch` if `params` does not have as many values as the layers need.
    pub fn from_params<I>(layers: I, params: Vec<f32>) -> Result<Self>
    where
        I: IntoIterator<Item = Dense>,
    {
        let mut model = Self::new(layers)?;
        if params.len() != model.params.len() {
            return Err(MlErr::ShapeMismatch {
                what: "parameters",
                got: params.len(),
                expected: model.params.len(),
            });
        }

        model.params = params;
        Ok(model)
    }

    /// Builds the two layer classifier `relu(x · W1ᵀ + b1) · W2ᵀ + b2`.
    ///
    /// # Arguments
    /// * `input` - The amount of input features.
    /// * `hidden` - The width of the hidden layer.
    /// * `classes` - The amount of output logits.
    /// * `init` - The parameter initialization.
    /// * `rng` - A random number generator.
    pub fn feedforward<R: Rng + ?Sized>(
        input: usize,
        hidden: usize,
        classes: usize,
        init: ParamInit,
        rng: &mut R,
    ) -> Result<Self> {
        if input == 0 || hidden == 0 || classes == 0 {
            return Err(MlErr::invalid_config(format!(
                "layer sizes must be positive, got {input}/{hidden}/{classes}"
            )));
        }

        let layers = [
            Dense::new((input, hidden), Some(ActFn::relu())),
            Dense::new((hidden, classes), None),
        ];

        Self::with_init(layers, init, rng)
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Returns the slice of parameters of the `i`-th layer.
    pub fn layer_params(&self, i: usize) -> Option<&[f32]> {
        self.layer_slices().nth(i).map(|(_, params)| params)
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.dim().0)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.dim().1)
    }

    fn layer_slices(&self) -> impl Iterator<Item = (&Dense, &[f32])> {
        let mut rest = self.params.as_slice();
        self.layers.iter().map(move |layer| {
            let (head, tail) = rest.split_at(layer.size());
            rest = tail;
            (layer, head)
        })
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut slices = self.layer_slices();
        let Some((first, params)) = slices.next() else {
            return Err(MlErr::invalid_config("a model needs at least one layer"));
        };

        let mut a = first.forward(params, x)?;
        for (layer, params) in slices {
            a = layer.forward(params, a.view())?;
        }

        Ok(a)
    }

    fn backprop<L: LossFn>(
        &self,
        x: ArrayView2<f32>,
        y: &[usize],
        loss_fn: &L,
        weight: f32,
        grad: &mut [f32],
    ) -> Result<f32> {
        if grad.len() != self.params.len() {
            return Err(MlErr::ShapeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: self.params.len(),
            });
        }

        // zs[i] and outputs[i] are the preactivation and output of layer i.
        let mut zs: Vec<Array2<f32>> = Vec::with_capacity(self.layers.len());
        let mut outputs: Vec<Array2<f32>> = Vec::with_capacity(self.layers.len());
        for (i, (layer, params)) in self.layer_slices().enumerate() {
            let input = if i == 0 { x.view() } else { outputs[i - 1].view() };
            let z = layer.preactivate(params, input)?;
            outputs.push(layer.activate(&z));
            zs.push(z);
        }

        let Some(y_pred) = outputs.last() else {
            return Err(MlErr::invalid_config("a model needs at least one layer"));
        };

        let loss = loss_fn.loss(y_pred.view(), y)?;
        let mut d = loss_fn.loss_prime(y_pred.view(), y)?;
        if weight != 1.0 {
            d *= weight;
        }

        let mut grads = Vec::with_capacity(self.layers.len());
        let mut rest = grad;
        for layer in &self.layers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            grads.push(head);
            rest = tail;
        }

        let slices: Vec<_> = self.layer_slices().collect();
        for (i, ((layer, params), grad)) in slices.into_iter().zip(grads).enumerate().rev() {
            let input = if i == 0 { x.view() } else { outputs[i - 1].view() };
            let delta = layer.backward(grad, input, zs[i].view(), d)?;
            if i == 0 {
                break;
            }

            d = layer.propagate(params, delta.view())?;
        }

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::loss::CrossEntropy;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    fn zero_model() -> Sequential {
        Sequential::feedforward(
            4,
            3,
            2,
            ParamInit::Const { value: 0.0 },
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap()
    }

    #[test]
    fn feedforward_has_the_expected_layout() {
        let model = zero_model();

        assert_eq!(model.size(), 3 * 4 + 3 + 2 * 3 + 2);
        assert_eq!(model.input_size(), 4);
        assert_eq!(model.output_size(), 2);
        assert_eq!(model.layer_params(0).unwrap().len(), 15);
        assert_eq!(model.layer_params(1).unwrap().len(), 8);
        assert!(model.layer_params(2).is_none());
    }

    #[test]
    fn mismatched_layers_are_rejected() {
        let layers = [Dense::new((4, 3), None), Dense::new((2, 1), None)];
        assert!(matches!(
            Sequential::new(layers).unwrap_err(),
            MlErr::ShapeMismatch { got: 2, expected: 3, .. }
        ));

        assert!(Sequential::new(Vec::new()).is_err());
        assert!(Sequential::from_params([Dense::new((1, 1), None)], vec![0.0; 3]).is_err());
    }

    #[test]
    fn zero_model_outputs_its_output_bias() {
        let layers = [
            Dense::new((2, 2), Some(ActFn::relu())),
            Dense::new((2, 2), None),
        ];
        let mut params = vec![0.0; 12];
        params[10] = 0.5;
        params[11] = -0.5;
        let model = Sequential::from_params(layers, params).unwrap();

        let logits = model.forward(array![[3.0, -7.0]].view()).unwrap();
        assert_eq!(logits, array![[0.5, -0.5]]);
    }

    #[test]
    fn backprop_leaves_params_and_weights_the_gradient() {
        let model = Sequential::feedforward(
            4,
            3,
            2,
            ParamInit::FanInUniform,
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();
        let x = array![[0.1, 0.2, 0.3, 0.4], [-1.0, 0.0, 1.0, 2.0]];
        let y = [1, 0];

        let mut full = vec![0.0; model.size()];
        let loss = model.backprop(x.view(), &y, &CrossEntropy, 1.0, &mut full).unwrap();
        let mut half = vec![0.0; model.size()];
        let half_loss = model.backprop(x.view(), &y, &CrossEntropy, 0.5, &mut half).unwrap();

        assert_eq!(loss, half_loss);
        assert!(full.iter().any(|&g| g != 0.0));
        for (f, h) in full.iter().zip(&half) {
            assert!((f * 0.5 - h).abs() < 1e-6);
        }
    }

    #[test]
    fn backprop_through_hidden_layers_matches_the_forward_loss() {
        let layers = [
            Dense::new((3, 5), Some(ActFn::relu())),
            Dense::new((5, 4), Some(ActFn::sigmoid(1.0))),
            Dense::new((4, 2), None),
        ];
        let model =
            Sequential::with_init(layers, ParamInit::FanInUniform, &mut StdRng::seed_from_u64(5))
                .unwrap();
        let x = array![[0.3, -0.2, 1.0], [1.5, 0.5, -0.5], [0.0, 2.0, 0.1]];
        let y = [0, 1, 1];

        let mut grad = vec![0.0; model.size()];
        let loss = model.backprop(x.view(), &y, &CrossEntropy, 1.0, &mut grad).unwrap();
        let logits = model.forward(x.view()).unwrap();

        assert!((loss - CrossEntropy.loss(logits.view(), &y).unwrap()).abs() < 1e-6);
        assert!(model.layer_params(0).is_some());
        assert!(grad[..model.layers()[0].size()].iter().any(|&g| g != 0.0));
    }

    #[test]
    fn backprop_rejects_a_wrong_gradient_buffer() {
        let model = zero_model();
        let mut grad = vec![0.0; 3];
        let err = model
            .backprop(Array2::zeros((1, 4)).view(), &[0], &CrossEntropy, 1.0, &mut grad)
            .unwrap_err();
        assert!(matches!(err, MlErr::ShapeMismatch { what: "gradient", .. }));
    }
}
