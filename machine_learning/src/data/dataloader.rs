use std::num::NonZeroUsize;

use ndarray::Array2;
use rand::{
    Rng, SeedableRng,
    rngs::{StdRng, ThreadRng},
    seq::SliceRandom,
};
use serde::{Deserialize, Serialize};

use super::dataset::{Batch, Dataset};
use crate::{MlErr, Result};

/// What to do with the last batch of a pass when the dataset length isn't a multiple of the
/// batch size.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastBatch {
    /// Emit the short batch, a pass yields `ceil(len / batch_size)` batches.
    #[default]
    Keep,
    /// Discard the short batch, a pass yields `floor(len / batch_size)` batches.
    Drop,
}

/// Produces passes of fixed-size batches over a dataset.
///
/// Every call to `iter` starts a fresh pass that covers each sample at most once, in
/// identity order or, when shuffling, in a new uniform random permutation.
#[derive(Debug)]
pub struct DataLoader<'d, D, R = ThreadRng> {
    dataset: &'d D,
    batch_size: NonZeroUsize,
    shuffle: bool,
    last_batch: LastBatch,
    rng: R,
}

impl<'d, D: Dataset> DataLoader<'d, D> {
    /// Creates a new non shuffling `DataLoader` that keeps the last short batch, shuffling (once
    /// enabled) with the thread local generator.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to draw samples from.
    /// * `batch_size` - The amount of samples per batch.
    pub fn new(dataset: &'d D, batch_size: NonZeroUsize) -> Self {
        Self::new_with_rng(dataset, batch_size, rand::rng())
    }
}

impl<'d, D: Dataset, R: Rng> DataLoader<'d, D, R> {
    /// Creates a new non shuffling `DataLoader` that shuffles (once enabled) with `rng`.
    pub fn new_with_rng(dataset: &'d D, batch_size: NonZeroUsize, rng: R) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle: false,
            last_batch: LastBatch::default(),
            rng,
        }
    }

    /// Replaces the random number generator used for shuffling.
    pub fn with_rng<S: Rng>(self, rng: S) -> DataLoader<'d, D, S> {
        DataLoader {
            dataset: self.dataset,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            last_batch: self.last_batch,
            rng,
        }
    }

    /// Seeds the shuffling so that passes are reproducible.
    pub fn seeded(self, seed: u64) -> DataLoader<'d, D, StdRng> {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn last_batch(mut self, last_batch: LastBatch) -> Self {
        self.last_batch = last_batch;
        self
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    #[inline]
    pub fn dataset(&self) -> &'d D {
        self.dataset
    }

    /// Returns the amount of batches every pass yields.
    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        let batch_size = self.batch_size.get();

        match self.last_batch {
            LastBatch::Keep => len.div_ceil(batch_size),
            LastBatch::Drop => len / batch_size,
        }
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&mut self) -> Batches<'d, D> {
        let len = self.dataset.len();
        let batch_size = self.batch_size.get();

        let mut order: Vec<_> = (0..len).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }

        if self.last_batch == LastBatch::Drop {
            order.truncate(len - len % batch_size);
        }

        Batches {
            dataset: self.dataset,
            order,
            batch_size,
            cursor: 0,
        }
    }
}

/// A single pass of batches. Batches are gathered lazily, one per `next` call.
#[derive(Debug)]
pub struct Batches<'d, D> {
    dataset: &'d D,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl<D: Dataset> Iterator for Batches<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        Some(gather(self.dataset, indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl<D: Dataset> ExactSizeIterator for Batches<'_, D> {}

/// Copies the samples at `indices` into a new batch.
fn gather<D: Dataset>(dataset: &D, indices: &[usize]) -> Result<Batch> {
    let width = dataset.feature_size();
    let mut x = Array2::zeros((indices.len(), width));
    let mut y = Vec::with_capacity(indices.len());

    for (mut row, &index) in x.rows_mut().into_iter().zip(indices) {
        let sample = dataset.get(index)?;
        if sample.x.len() != width {
            return Err(MlErr::ShapeMismatch {
                what: "sample features",
                got: sample.x.len(),
                expected: width,
            });
        }

        row.assign(&sample.x);
        y.push(sample.y);
    }

    Ok(Batch { x, y })
}
