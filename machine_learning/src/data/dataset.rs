use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// A single supervised sample: a borrowed feature row and its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<'a> {
    pub x: ArrayView1<'a, f32>,
    pub y: usize,
}

/// A collection of samples with a known length and random positional access.
///
/// A `Dataset` only provides access to samples, it does not decide how they are
/// ordered or batched.
pub trait Dataset {
    /// Returns the amount of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the width of every feature row.
    fn feature_size(&self) -> usize;

    /// Fetches a sample by index.
    ///
    /// # Errors
    /// Returns `MlErr::IndexOutOfBounds` if `index` is not in `[0, len)`.
    fn get(&self, index: usize) -> Result<Sample<'_>>;
}

/// A dataset held in memory as a feature matrix of shape `(len, feature_size)` plus one label
/// per row. Immutable after construction.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    xs: Array2<f32>,
    ys: Vec<usize>,
}

impl InMemoryDataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Errors
    /// `MlErr::ShapeMismatch` if the amount of feature rows and labels differ.
    pub fn new(xs: Array2<f32>, ys: Vec<usize>) -> Result<Self> {
        if xs.nrows() != ys.len() {
            return Err(MlErr::ShapeMismatch {
                what: "labels",
                got: ys.len(),
                expected: xs.nrows(),
            });
        }

        Ok(Self { xs, ys })
    }

    /// Creates a new dataset from a row-major feature buffer.
    ///
    /// # Arguments
    /// * `data` - The features, `width` values per sample.
    /// * `width` - The amount of features of each sample.
    /// * `ys` - The labels.
    ///
    /// # Errors
    /// `MlErr::ShapeMismatch` if `data` can't be split in rows of `width` values or the
    /// amount of rows and labels differ.
    pub fn from_vec(data: Vec<f32>, width: usize, ys: Vec<usize>) -> Result<Self> {
        if width == 0 {
            return Err(MlErr::invalid_config("feature width must be positive"));
        }

        if data.len() % width != 0 {
            return Err(MlErr::ShapeMismatch {
                what: "feature buffer",
                got: data.len(),
                expected: ys.len() * width,
            });
        }

        let rows = data.len() / width;
        let xs = Array2::from_shape_vec((rows, width), data).map_err(|_| MlErr::ShapeMismatch {
            what: "feature buffer",
            got: rows * width,
            expected: ys.len() * width,
        })?;

        Self::new(xs, ys)
    }

    #[inline]
    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.xs.view()
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.ys
    }

    /// Returns the amount of classes the labels span, that is, the highest label plus one.
    pub fn n_classes(&self) -> usize {
        self.ys.iter().max().map_or(0, |&max| max + 1)
    }

    /// Builds a new dataset holding copies of the given rows, in the given order.
    ///
    /// # Errors
    /// `MlErr::IndexOutOfBounds` if any index is outside of the dataset.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let len = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(MlErr::IndexOutOfBounds { index, len });
        }

        let xs = self.xs.select(Axis(0), indices);
        let ys = indices.iter().map(|&i| self.ys[i]).collect();
        Ok(Self { xs, ys })
    }

    /// Shuffles the samples and splits them in two datasets, the first one holding
    /// `round(len * ratio)` samples.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if `ratio` is not inside `(0, 1)`.
    pub fn split<R: Rng + ?Sized>(&self, ratio: f32, rng: &mut R) -> Result<(Self, Self)> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(MlErr::invalid_config(format!(
                "split ratio must be inside (0, 1), got {ratio}"
            )));
        }

        let mut order: Vec<_> = (0..self.len()).collect();
        order.shuffle(rng);

        let cut = (self.len() as f32 * ratio).round() as usize;
        let (head, tail) = order.split_at(cut);
        Ok((self.subset(head)?, self.subset(tail)?))
    }
}

impl Dataset for InMemoryDataset {
    #[inline]
    fn len(&self) -> usize {
        self.ys.len()
    }

    #[inline]
    fn feature_size(&self) -> usize {
        self.xs.ncols()
    }

    fn get(&self, index: usize) -> Result<Sample<'_>> {
        let len = self.len();
        if index >= len {
            return Err(MlErr::IndexOutOfBounds { index, len });
        }

        Ok(Sample {
            x: self.xs.row(index),
            y: self.ys[index],
        })
    }
}

/// An owned batch of samples, one row of `x` per label in `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Array2<f32>,
    pub y: Vec<usize>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}
