use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax cross entropy over raw logits, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    pub fn new() -> Self {
        Self
    }

    fn check(y_pred: ArrayView2<f32>, y: &[usize]) -> Result<()> {
        if y_pred.nrows() == 0 {
            return Err(MlErr::EmptyDataset { what: "loss batch" });
        }

        if y_pred.nrows() != y.len() {
            return Err(MlErr::ShapeMismatch {
                what: "labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        let classes = y_pred.ncols();
        match y.iter().find(|&&label| label >= classes) {
            Some(&label) => Err(MlErr::LabelOutOfRange { label, classes }),
            None => Ok(()),
        }
    }
}

/// `log(Σ exp(row))`, shifted by the row maximum so large logits don't overflow.
fn log_sum_exp(row: ArrayView1<f32>) -> f32 {
    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    max + row.fold(0.0, |acc, &v| acc + (v - max).exp()).ln()
}

/// Row-wise softmax of a batch of logits.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut probs = logits.to_owned();
    for mut row in probs.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }

    probs
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32> {
        Self::check(y_pred, y)?;

        let total: f32 = y_pred
            .axis_iter(Axis(0))
            .zip(y)
            .map(|(row, &label)| log_sum_exp(row) - row[label])
            .sum();

        Ok(total / y.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>> {
        Self::check(y_pred, y)?;

        let n = y.len() as f32;
        let mut d = softmax(y_pred);
        Zip::from(d.rows_mut()).and(y).for_each(|mut row, &label| {
            row[label] -= 1.0;
            row /= n;
        });

        Ok(d)
    }
}
