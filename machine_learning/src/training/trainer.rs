use std::num::NonZeroUsize;

use log::{debug, info, trace};
use rand::Rng;

use super::{Progress, Reporter};
use crate::{
    Device, MlErr, Result,
    arch::{Model, loss::LossFn},
    data::{Batch, DataLoader, Dataset},
    optimization::Optimizer,
};

/// Where a `Trainer` is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has been trained yet.
    Ready,
    /// At the start of an epoch, starting at 1.
    Epoch(usize),
    /// Processing a step of an epoch, both starting at 1.
    Step { epoch: usize, step: usize },
    Done,
}

/// Trains a model with minibatches: for every batch it computes the loss gradient into its own
/// buffer and lets the optimizer update the model's parameters.
pub struct Trainer<M, O, L> {
    model: M,
    optimizer: O,
    loss_fn: L,
    grad: Vec<f32>,
    epochs: NonZeroUsize,
    log_every: NonZeroUsize,
    device: Device,
    phase: Phase,
}

impl<M: Model, O: Optimizer, L: LossFn> Trainer<M, O, L> {
    /// Creates a new `Trainer`.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `optimizer` - The optimizer, sized for the model's parameters.
    /// * `loss_fn` - The loss function.
    /// * `epochs` - The amount of passes over the training data.
    /// * `log_every` - Report progress every this amount of steps.
    pub fn new(
        model: M,
        optimizer: O,
        loss_fn: L,
        epochs: NonZeroUsize,
        log_every: NonZeroUsize,
    ) -> Self {
        Self {
            grad: vec![0.0; model.size()],
            model,
            optimizer,
            loss_fn,
            epochs,
            log_every,
            device: Device::default(),
            phase: Phase::Ready,
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl<M, O, L> Trainer<M, O, L>
where
    M: Model + Sync,
    O: Optimizer,
    L: LossFn + Sync,
{
    /// Runs every epoch over fresh passes of `loader`, reporting progress every `log_every` steps.
    ///
    /// # Returns
    /// The mean batch loss of each epoch.
    ///
    /// # Errors
    /// `MlErr::EmptyDataset` if a pass of the loader has no batches, otherwise forwards the errors
    /// of the batches, the gradient computation and the optimizer.
    pub fn train<D, R, P>(
        &mut self,
        loader: &mut DataLoader<'_, D, R>,
        reporter: &mut P,
    ) -> Result<Vec<f32>>
    where
        D: Dataset,
        R: Rng,
        P: Reporter + ?Sized,
    {
        let steps = loader.num_batches();
        if steps == 0 {
            return Err(MlErr::EmptyDataset {
                what: "training loader",
            });
        }

        let epochs = self.epochs.get();
        info!(
            epochs = epochs,
            steps = steps,
            params = self.model.size(),
            device:? = self.device;
            "training started"
        );

        let mut losses = Vec::with_capacity(epochs);
        for epoch in 1..=epochs {
            self.phase = Phase::Epoch(epoch);

            let mut total = 0.0;
            for (i, batch) in loader.iter().enumerate() {
                let step = i + 1;
                self.phase = Phase::Step { epoch, step };

                let loss = self.step(&batch?)?;
                total += loss;
                trace!(epoch = epoch, step = step, loss = loss; "step");

                if step % self.log_every == 0 {
                    reporter.report(&Progress {
                        epoch,
                        epochs,
                        step,
                        steps,
                        loss,
                    });
                }
            }

            let mean = total / steps as f32;
            debug!(epoch = epoch, loss = mean; "epoch finished");
            losses.push(mean);
        }

        self.phase = Phase::Done;
        info!("training finished");
        Ok(losses)
    }

    /// Makes one optimization step over a batch.
    ///
    /// # Returns
    /// The loss of the batch before the update.
    pub fn step(&mut self, batch: &Batch) -> Result<f32> {
        self.grad.fill(0.0);

        let loss = self.device.backprop(
            &self.model,
            batch.x.view(),
            &batch.y,
            &self.loss_fn,
            &mut self.grad,
        )?;

        self.optimizer
            .update_params(&self.grad, self.model.params_mut())?;

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::{ParamInit, Sequential, loss::CrossEntropy},
        data::InMemoryDataset,
        optimization::{Adam, GradientDescent},
    };
    use ndarray::Array2;
    use rand::{SeedableRng, rngs::StdRng};

    fn dataset(n: usize) -> InMemoryDataset {
        let xs = Array2::from_shape_fn((n, 2), |(i, j)| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            sign * (1.0 + j as f32) + (i as f32 * 0.01)
        });
        let ys = (0..n).map(|i| i % 2).collect();
        InMemoryDataset::new(xs, ys).unwrap()
    }

    fn trainer(epochs: usize, log_every: usize) -> Trainer<Sequential, Adam, CrossEntropy> {
        let mut rng = StdRng::seed_from_u64(5);
        let model = Sequential::feedforward(2, 8, 2, ParamInit::FanInUniform, &mut rng).unwrap();
        let optimizer = Adam::with_defaults(model.size(), 0.01);
        Trainer::new(
            model,
            optimizer,
            CrossEntropy,
            NonZeroUsize::new(epochs).unwrap(),
            NonZeroUsize::new(log_every).unwrap(),
        )
    }

    #[test]
    fn progress_is_reported_every_k_steps() {
        let ds = dataset(20);
        let mut loader = DataLoader::new(&ds, NonZeroUsize::new(3).unwrap()).seeded(1);
        let mut trainer = trainer(2, 2);
        let mut reports: Vec<Progress> = Vec::new();

        assert_eq!(trainer.phase(), Phase::Ready);
        let losses = trainer.train(&mut loader, &mut reports).unwrap();

        // 7 steps per epoch (6 full batches and one of 2), reported at steps 2, 4 and 6.
        assert_eq!(losses.len(), 2);
        assert_eq!(reports.len(), 6);
        assert!(reports.iter().all(|p| p.steps == 7 && p.epochs == 2 && p.step % 2 == 0));
        assert_eq!((reports[3].epoch, reports[3].step), (2, 2));
        assert_eq!(trainer.phase(), Phase::Done);
    }

    #[test]
    fn training_reduces_the_loss() {
        let ds = dataset(40);
        let mut loader = DataLoader::new(&ds, NonZeroUsize::new(8).unwrap())
            .seeded(2)
            .shuffle(true);
        let mut trainer = trainer(20, 100);

        let losses = trainer.train(&mut loader, &mut Vec::<Progress>::new()).unwrap();
        assert!(losses.last().unwrap() < losses.first().unwrap());
    }

    #[test]
    fn step_updates_the_parameters() {
        let ds = dataset(4);
        let mut loader = DataLoader::new(&ds, NonZeroUsize::new(4).unwrap());
        let batch = loader.iter().next().unwrap().unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let model = Sequential::feedforward(2, 3, 2, ParamInit::FanInUniform, &mut rng).unwrap();
        let before = model.params().to_vec();
        let mut trainer = Trainer::new(
            model,
            GradientDescent::new(0.1),
            CrossEntropy,
            NonZeroUsize::MIN,
            NonZeroUsize::MIN,
        );

        let loss = trainer.step(&batch).unwrap();
        assert!(loss > 0.0);
        assert_ne!(trainer.model().params(), before.as_slice());
    }

    #[test]
    fn empty_loaders_are_rejected() {
        let ds = dataset(2);
        let mut loader = DataLoader::new(&ds, NonZeroUsize::new(3).unwrap())
            .last_batch(crate::data::LastBatch::Drop);
        let mut trainer = trainer(1, 1);

        let err = trainer.train(&mut loader, &mut Vec::<Progress>::new()).unwrap_err();
        assert!(matches!(err, MlErr::EmptyDataset { .. }));
        assert_eq!(trainer.phase(), Phase::Ready);
    }

    #[test]
    fn out_of_range_labels_stop_training() {
        let xs = Array2::zeros((4, 2));
        let ds = InMemoryDataset::new(xs, vec![0, 1, 2, 1]).unwrap();
        let mut loader = DataLoader::new(&ds, NonZeroUsize::new(2).unwrap());
        let mut trainer = trainer(1, 1);

        let err = trainer.train(&mut loader, &mut Vec::<Progress>::new()).unwrap_err();
        assert!(matches!(err, MlErr::LabelOutOfRange { label: 2, classes: 2 }));
    }
}
