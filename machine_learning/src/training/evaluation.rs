use std::fmt::{self, Display};

use log::debug;
use ndarray::{ArrayView1, Axis};

use crate::{MlErr, Result, arch::Model, data::Batch};

/// The outcome of an evaluation: how many predictions hit their label out of how many were made.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    pub fn new(correct: usize, total: usize) -> Self {
        Self { correct, total }
    }

    /// Accounts for one more prediction.
    pub fn record(&mut self, hit: bool) {
        self.correct += usize::from(hit);
        self.total += 1;
    }

    /// Returns `100 * correct / total`.
    ///
    /// # Errors
    /// `MlErr::EmptyDataset` if nothing was evaluated.
    pub fn percentage(&self) -> Result<f64> {
        if self.total == 0 {
            return Err(MlErr::EmptyDataset {
                what: "evaluation set",
            });
        }

        Ok(100.0 * self.correct as f64 / self.total as f64)
    }
}

impl Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentage() {
            Ok(pct) => write!(f, "accuracy: {pct:.2}"),
            Err(_) => write!(f, "accuracy: n/a"),
        }
    }
}

/// Returns the index of the highest value, the first one on ties. `None` if `row` is empty.
pub fn argmax(row: ArrayView1<f32>) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, max)) if v <= max => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Counts how many samples the model classifies correctly.
///
/// The model is only borrowed, evaluating never touches its parameters.
///
/// # Arguments
/// * `model` - The model to evaluate.
/// * `batches` - The evaluation batches, usually one pass of a non shuffling loader.
///
/// # Errors
/// Forwards the errors of the batches and of the forward pass.
pub fn evaluate<M, I>(model: &M, batches: I) -> Result<Accuracy>
where
    M: Model,
    I: IntoIterator<Item = Result<Batch>>,
{
    let mut accuracy = Accuracy::default();

    for batch in batches {
        let batch = batch?;
        let logits = model.forward(batch.x.view())?;

        for (row, &label) in logits.axis_iter(Axis(0)).zip(&batch.y) {
            accuracy.record(argmax(row) == Some(label));
        }
    }

    debug!(correct = accuracy.correct, total = accuracy.total; "evaluation finished");
    Ok(accuracy)
}
