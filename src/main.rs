mod config;

use std::{env, num::NonZeroUsize};

use anyhow::Context;
use log::info;
use machine_learning::{
    data::DataLoader,
    training::{LogReporter, StdoutReporter, TrainerBuilder, evaluate},
};

use config::{ProgressOutput, RunConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => RunConfig::from_file(path)?,
        None => {
            info!("no config file given, using the default MNIST run");
            RunConfig::default()
        }
    };

    let RunConfig {
        training,
        dataset,
        progress,
    } = config;
    let mut builder = TrainerBuilder::new(training.seed);
    let (train_set, test_set) = dataset.load(&training, builder.rng())?;

    let mut trainer = builder.build(&training)?;
    let mut loader = builder.loader(&training, &train_set)?;
    let losses = match progress {
        ProgressOutput::Stdout => trainer.train(&mut loader, &mut StdoutReporter),
        ProgressOutput::Log => trainer.train(&mut loader, &mut LogReporter),
    }
    .context("training failed")?;
    info!(final_loss:? = losses.last(); "training done");

    let batch_size = NonZeroUsize::new(training.batch_size).context("batch_size is zero")?;
    let mut test_loader = DataLoader::new(&test_set, batch_size);
    let accuracy = evaluate(trainer.model(), test_loader.iter())?;
    accuracy.percentage().context("nothing to evaluate")?;
    println!("{accuracy}");

    Ok(())
}
