use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
};

/// Where the arithmetic of a training step runs.
///
/// The training loop itself always runs on the calling thread, the device only decides how each
/// gradient and each parameter update is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Everything runs on the calling thread.
    #[default]
    Cpu,
    /// Batches are split in row chunks whose gradients are computed on the rayon pool.
    Parallel,
}

impl Device {
    /// Accumulates into `grad` the gradient of the mean loss over a batch.
    ///
    /// # Returns
    /// The mean loss of the batch.
    pub fn backprop<M, L>(
        self,
        model: &M,
        x: ArrayView2<f32>,
        y: &[usize],
        loss_fn: &L,
        grad: &mut [f32],
    ) -> Result<f32>
    where
        M: Model + Sync,
        L: LossFn + Sync,
    {
        match self {
            Device::Cpu => model.backprop(x, y, loss_fn, 1.0, grad),
            Device::Parallel => parallel_backprop(model, x, y, loss_fn, grad),
        }
    }
}

/// Splits the batch in one chunk per rayon thread; chunk `c` of `n_c` rows contributes its
/// gradient weighted by `n_c / n` so the sum equals the gradient of the whole batch.
fn parallel_backprop<M, L>(
    model: &M,
    x: ArrayView2<f32>,
    y: &[usize],
    loss_fn: &L,
    grad: &mut [f32],
) -> Result<f32>
where
    M: Model + Sync,
    L: LossFn + Sync,
{
    let n = y.len();
    if n == 0 || x.nrows() != n {
        // Lets the model report the error.
        return model.backprop(x, y, loss_fn, 1.0, grad);
    }

    if grad.len() != model.size() {
        return Err(MlErr::ShapeMismatch {
            what: "gradient",
            got: grad.len(),
            expected: model.size(),
        });
    }

    let chunk = n.div_ceil(rayon::current_num_threads()).max(1);
    let chunks: Vec<_> = x.axis_chunks_iter(Axis(0), chunk).zip(y.chunks(chunk)).collect();

    let partials = chunks
        .into_par_iter()
        .map(|(x, y)| {
            let weight = y.len() as f32 / n as f32;
            let mut partial = vec![0.0; model.size()];
            let loss = model.backprop(x, y, loss_fn, weight, &mut partial)?;
            Ok((loss * weight, partial))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut loss = 0.0;
    for (partial_loss, partial) in partials {
        loss += partial_loss;
        grad.iter_mut().zip(&partial).for_each(|(g, p)| *g += p);
    }

    Ok(loss)
}
