use std::num::NonZeroUsize;

use log::info;
use rand::{SeedableRng, rngs::StdRng};

use super::Trainer;
use crate::{
    MlErr, Result,
    arch::{Model, Sequential, activations::ActFn, layers::Dense, loss::CrossEntropy},
    config::{ActFnSpec, LayerSpec, ModelSpec, OptimizerSpec, TrainingConfig},
    data::{DataLoader, Dataset},
    optimization::{Adam, GradientDescent, Optimizer},
};

/// The trainer every `TrainingConfig` resolves to.
pub type ConfiguredTrainer = Trainer<Sequential, Box<dyn Optimizer + Send>, CrossEntropy>;

/// Builds `Trainer`s and `DataLoader`s given a configuration.
///
/// Every random decision (parameter initialization, shuffling) is drawn from the builder's own
/// generator, so a seeded builder yields reproducible runs.
pub struct TrainerBuilder {
    rng: StdRng,
}

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    ///
    /// # Arguments
    /// * `seed` - An optional seed, `None` seeds from the operating system.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Self::generate_rng(seed),
        }
    }

    /// Builds a new `Trainer` following a configuration.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if the configuration does not validate.
    pub fn build(&mut self, config: &TrainingConfig) -> Result<ConfiguredTrainer> {
        config.validate()?;

        let model = self.resolve_model(config)?;
        let optimizer = self.resolve_optimizer(config, model.size());
        let (epochs, log_every) = Self::counts(config)?;

        info!(
            params = model.size(),
            layers = model.layers().len();
            "built trainer"
        );

        let trainer = Trainer::new(model, optimizer, CrossEntropy, epochs, log_every);
        Ok(trainer.with_device(config.device))
    }

    /// Builds a `DataLoader` over `dataset` with the batching options of a configuration.
    pub fn loader<'d, D: Dataset>(
        &mut self,
        config: &TrainingConfig,
        dataset: &'d D,
    ) -> Result<DataLoader<'d, D, StdRng>> {
        let batch_size = NonZeroUsize::new(config.batch_size)
            .ok_or_else(|| MlErr::invalid_config("batch_size must be positive"))?;

        let rng = StdRng::from_rng(&mut self.rng);
        let loader = DataLoader::new_with_rng(dataset, batch_size, rng)
            .shuffle(config.shuffle)
            .last_batch(config.last_batch);

        Ok(loader)
    }

    /// Gives access to the builder's generator, to draw other random data of the same run from it.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn resolve_model(&mut self, config: &TrainingConfig) -> Result<Sequential> {
        match config.model_spec() {
            ModelSpec::Sequential { layers } => {
                let layers: Vec<_> = layers
                    .into_iter()
                    .map(|spec| self.resolve_layer(spec))
                    .collect();

                Sequential::with_init(layers, config.init, &mut self.rng)
            }
        }
    }

    fn resolve_layer(&self, spec: LayerSpec) -> Dense {
        match spec {
            LayerSpec::Dense { dim, act_fn } => {
                let act_fn = act_fn.map(|spec| self.resolve_act_fn(spec));
                Dense::new(dim, act_fn)
            }
        }
    }

    fn resolve_act_fn(&self, spec: ActFnSpec) -> ActFn {
        match spec {
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
        }
    }

    fn resolve_optimizer(
        &self,
        config: &TrainingConfig,
        len: usize,
    ) -> Box<dyn Optimizer + Send> {
        let lr = config.learning_rate;

        match config.optimizer {
            OptimizerSpec::Adam {
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, lr, beta1, beta2, epsilon).with_device(config.device)),
            OptimizerSpec::GradientDescent => {
                Box::new(GradientDescent::new(lr).with_device(config.device))
            }
        }
    }

    fn counts(config: &TrainingConfig) -> Result<(NonZeroUsize, NonZeroUsize)> {
        let epochs = NonZeroUsize::new(config.n_epochs)
            .ok_or_else(|| MlErr::invalid_config("n_epochs must be positive"))?;
        let log_every = NonZeroUsize::new(config.log_every_n_steps)
            .ok_or_else(|| MlErr::invalid_config("log_every_n_steps must be positive"))?;

        Ok((epochs, log_every))
    }

    fn generate_rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
