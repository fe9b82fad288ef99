use serde::{Deserialize, Serialize};

use crate::{Device, MlErr, Result, arch::ParamInit, data::LastBatch, optimization::Adam};

/// The specification of an activation function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu,
    Sigmoid { amp: f32 },
}

/// The specification of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
}

impl LayerSpec {
    pub fn dim(&self) -> (usize, usize) {
        match *self {
            LayerSpec::Dense { dim, .. } => dim,
        }
    }
}

/// The specification of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

/// The specification of an optimizer, the learning rate lives in `TrainingConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent,
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        OptimizerSpec::Adam {
            beta1: Adam::BETA1,
            beta2: Adam::BETA2,
            epsilon: Adam::EPSILON,
        }
    }
}

/// Every knob of a training run. Missing fields take their default value when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub n_class: usize,
    pub n_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub log_every_n_steps: usize,
    pub shuffle: bool,
    pub last_batch: LastBatch,
    pub device: Device,
    pub seed: Option<u64>,
    pub optimizer: OptimizerSpec,
    pub init: ParamInit,
    /// Overrides the two layer network described by the sizes above.
    pub model: Option<ModelSpec>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            input_size: 784,
            hidden_size: 500,
            n_class: 10,
            n_epochs: 2,
            batch_size: 100,
            learning_rate: 0.001,
            log_every_n_steps: 100,
            shuffle: true,
            last_batch: LastBatch::Keep,
            device: Device::Cpu,
            seed: None,
            optimizer: OptimizerSpec::default(),
            init: ParamInit::default(),
            model: None,
        }
    }
}

impl TrainingConfig {
    /// Returns the model to train, either the explicit one or
    /// `Dense(input, hidden, relu) -> Dense(hidden, n_class)`.
    pub fn model_spec(&self) -> ModelSpec {
        if let Some(model) = &self.model {
            return model.clone();
        }

        ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (self.input_size, self.hidden_size),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dense {
                    dim: (self.hidden_size, self.n_class),
                    act_fn: None,
                },
            ],
        }
    }

    /// Checks every value is inside its domain.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("input_size", self.input_size),
            ("hidden_size", self.hidden_size),
            ("n_class", self.n_class),
            ("n_epochs", self.n_epochs),
            ("batch_size", self.batch_size),
            ("log_every_n_steps", self.log_every_n_steps),
        ];

        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(MlErr::invalid_config(format!("{name} must be positive")));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MlErr::invalid_config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if let OptimizerSpec::Adam {
            beta1,
            beta2,
            epsilon,
        } = self.optimizer
        {
            let unit = 0.0..1.0;
            if !unit.contains(&beta1) || !unit.contains(&beta2) || epsilon <= 0.0 {
                return Err(MlErr::invalid_config(format!(
                    "adam needs betas in [0, 1) and a positive epsilon, got {beta1}/{beta2}/{epsilon}"
                )));
            }
        }

        let ModelSpec::Sequential { layers } = self.model_spec();
        let (Some(first), Some(last)) = (layers.first(), layers.last()) else {
            return Err(MlErr::invalid_config("the model has no layers"));
        };

        if first.dim().0 != self.input_size || last.dim().1 != self.n_class {
            return Err(MlErr::invalid_config(format!(
                "the model maps {} features to {} classes, expected {} to {}",
                first.dim().0,
                last.dim().1,
                self.input_size,
                self.n_class
            )));
        }

        Ok(())
    }
}
