use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// How the parameters of a layer are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamInit {
    /// Every parameter is set to `value`.
    Const { value: f32 },
    /// Uniform in `[low, high)`.
    Uniform { low: f32, high: f32 },
    /// Uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    #[default]
    FanInUniform,
    /// Uniform in `[-sqrt(6/(fan_in + fan_out)), sqrt(6/(fan_in + fan_out)))`.
    XavierUniform,
    Normal { mean: f32, std_dev: f32 },
}

impl ParamInit {
    /// Fills `params` with freshly drawn values.
    ///
    /// # Arguments
    /// * `params` - The parameters of a single layer.
    /// * `fan_in` - The number of inputs of the layer.
    /// * `fan_out` - The number of outputs of the layer.
    /// * `rng` - A random number generator.
    ///
    /// # Errors
    /// `MlErr::InvalidConfig` if the resulting distribution is invalid.
    pub fn fill<R: Rng + ?Sized>(
        &self,
        params: &mut [f32],
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<()> {
        match *self {
            ParamInit::Const { value } => params.fill(value),
            ParamInit::Uniform { low, high } => sample_into(params, uniform(low, high)?, rng),
            ParamInit::FanInUniform => {
                let range = 1. / (fan_in.max(1) as f32).sqrt();
                sample_into(params, uniform(-range, range)?, rng);
            }
            ParamInit::XavierUniform => {
                let range = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
                sample_into(params, uniform(-range, range)?, rng);
            }
            ParamInit::Normal { mean, std_dev } => {
                if std_dev.is_nan() || std_dev < 0.0 {
                    return Err(MlErr::invalid_config(format!(
                        "normal init needs a non negative std dev, got {std_dev}"
                    )));
                }

                let normal = Normal::new(mean, std_dev).map_err(|e| {
                    MlErr::invalid_config(format!("normal init with std dev {std_dev}: {e}"))
                })?;
                sample_into(params, normal, rng);
            }
        }

        Ok(())
    }
}

fn uniform(low: f32, high: f32) -> Result<Uniform<f32>> {
    Uniform::new(low, high)
        .map_err(|e| MlErr::invalid_config(format!("uniform init in [{low}, {high}): {e}")))
}

fn sample_into<D, R>(params: &mut [f32], distribution: D, rng: &mut R)
where
    D: Distribution<f32>,
    R: Rng + ?Sized,
{
    params
        .iter_mut()
        .for_each(|p| *p = distribution.sample(rng));
}
