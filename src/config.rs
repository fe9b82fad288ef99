use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::info;
use machine_learning::{
    config::TrainingConfig,
    data::{self, CsvOptions, InMemoryDataset, MnistSplit},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_TEST_RATIO: f32 = 0.2;
const DEFAULT_SPREAD: f32 = 1.0;

fn default_test_ratio() -> f32 {
    DEFAULT_TEST_RATIO
}

fn default_spread() -> f32 {
    DEFAULT_SPREAD
}

/// Where the samples of a run come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetConfig {
    /// A directory holding the four MNIST IDX files.
    Mnist { dir: PathBuf },
    /// A labelled table, split in train and test sets.
    Csv {
        path: PathBuf,
        #[serde(default)]
        options: CsvOptions,
        #[serde(default = "default_test_ratio")]
        test_ratio: f32,
    },
    /// Gaussian blobs, one per class, as wide as the model's input.
    Synthetic {
        samples: usize,
        #[serde(default = "default_spread")]
        spread: f32,
        #[serde(default = "default_test_ratio")]
        test_ratio: f32,
    },
    /// Samples written in the config itself, trained and evaluated on the same set.
    Inline {
        data: Vec<f32>,
        x_size: usize,
        labels: Vec<usize>,
    },
}

impl DatasetConfig {
    /// Loads the train and test sets.
    pub fn load<R: Rng + ?Sized>(
        &self,
        training: &TrainingConfig,
        rng: &mut R,
    ) -> anyhow::Result<(InMemoryDataset, InMemoryDataset)> {
        let sets = match self {
            DatasetConfig::Mnist { dir } => {
                let context = || format!("loading MNIST from {}", dir.display());
                let train = data::load_mnist(dir, MnistSplit::Train).with_context(context)?;
                let test = data::load_mnist(dir, MnistSplit::Test).with_context(context)?;
                (train, test)
            }
            DatasetConfig::Csv {
                path,
                options,
                test_ratio,
            } => {
                let table = data::load_csv(path, *options)
                    .with_context(|| format!("loading {}", path.display()))?;
                table.split(1.0 - test_ratio, rng)?
            }
            DatasetConfig::Synthetic {
                samples,
                spread,
                test_ratio,
            } => {
                let blobs = data::blobs(
                    *samples,
                    training.input_size,
                    training.n_class,
                    *spread,
                    rng,
                )?;
                blobs.split(1.0 - test_ratio, rng)?
            }
            DatasetConfig::Inline {
                data,
                x_size,
                labels,
            } => {
                let set = InMemoryDataset::from_vec(data.clone(), *x_size, labels.clone())?;
                (set.clone(), set)
            }
        };

        info!(
            train = sets.0.labels().len(),
            test = sets.1.labels().len();
            "dataset ready"
        );

        Ok(sets)
    }
}

/// Where the progress lines of a training run go.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressOutput {
    #[default]
    Stdout,
    /// Through the logger, at info level.
    Log,
}

/// The configuration file of the binary: the training knobs plus the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub training: TrainingConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub progress: ProgressOutput,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            dataset: DatasetConfig::Mnist {
                dir: PathBuf::from("data/mnist"),
            },
            progress: ProgressOutput::default(),
        }
    }
}

impl RunConfig {
    /// Reads a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;

        Ok(config)
    }
}
