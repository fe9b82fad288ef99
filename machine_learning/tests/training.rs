use std::num::NonZeroUsize;

use ndarray::{Array2, array};
use rand::{SeedableRng, rngs::StdRng};

use machine_learning::{
    Device, MlErr, Result,
    arch::{
        Model, ParamInit, Sequential,
        loss::{CrossEntropy, LossFn},
    },
    config::{OptimizerSpec, TrainingConfig},
    data::{self, DataLoader, Dataset, InMemoryDataset, LastBatch},
    optimization::{Adam, Optimizer},
    training::{Accuracy, Progress, TrainerBuilder, evaluate},
};

fn mk_model(input: usize, hidden: usize, classes: usize, seed: u64) -> Sequential {
    let mut rng = StdRng::seed_from_u64(seed);
    Sequential::feedforward(input, hidden, classes, ParamInit::FanInUniform, &mut rng).unwrap()
}

fn mk_config(seed: u64, device: Device) -> TrainingConfig {
    TrainingConfig {
        input_size: 2,
        hidden_size: 16,
        n_class: 3,
        n_epochs: 10,
        batch_size: 16,
        learning_rate: 0.01,
        log_every_n_steps: 5,
        device,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn zero_model_on_zero_input_gives_zero_logits() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0);
    let model = Sequential::feedforward(784, 20, 10, ParamInit::Const { value: 0.0 }, &mut rng)?;

    let logits = model.forward(Array2::zeros((1, 784)).view())?;
    assert_eq!(logits.dim(), (1, 10));
    assert!(logits.iter().all(|&v| v == 0.0));

    Ok(())
}

#[test]
fn forward_is_deterministic() -> Result<()> {
    let model = mk_model(5, 7, 3, 1);
    let x = Array2::from_shape_fn((4, 5), |(i, j)| (i as f32 - j as f32) / 3.0);

    assert_eq!(model.forward(x.view())?, model.forward(x.view())?);
    Ok(())
}

#[test]
fn wrong_input_width_is_a_shape_mismatch() {
    let model = mk_model(5, 7, 3, 1);
    let err = model.forward(Array2::zeros((2, 4)).view()).unwrap_err();
    assert!(matches!(err, MlErr::ShapeMismatch { got: 4, expected: 5, .. }));
}

#[test]
fn analytic_gradient_matches_finite_differences() -> Result<()> {
    const H: f32 = 1e-3;

    let model = mk_model(3, 4, 3, 9);
    let x = array![[0.5, -1.0, 2.0], [1.5, 0.3, -0.7], [-0.2, 0.8, 0.1]];
    let y = [2, 0, 1];

    let mut grad = vec![0.0; model.size()];
    model.backprop(x.view(), &y, &CrossEntropy, 1.0, &mut grad)?;

    let loss_at = |params: Vec<f32>| -> Result<f32> {
        let model = Sequential::from_params(model.layers().to_vec(), params)?;
        let logits = model.forward(x.view())?;
        CrossEntropy.loss(logits.view(), &y)
    };

    for i in 0..model.size() {
        let mut plus = model.params().to_vec();
        let mut minus = plus.clone();
        plus[i] += H;
        minus[i] -= H;

        let numeric = (loss_at(plus)? - loss_at(minus)?) / (2.0 * H);
        assert!(
            (numeric - grad[i]).abs() < 5e-3,
            "param {i}: numeric {numeric}, analytic {}",
            grad[i]
        );
    }

    Ok(())
}

#[test]
fn cross_entropy_is_never_negative() -> Result<()> {
    let model = mk_model(3, 5, 4, 2);
    let x = Array2::from_shape_fn((8, 3), |(i, j)| ((i * 3 + j) as f32).sin() * 4.0);
    let logits = model.forward(x.view())?;

    for label in 0..4 {
        let y = vec![label; 8];
        assert!(CrossEntropy.loss(logits.view(), &y)? >= 0.0);
    }

    Ok(())
}

#[test]
fn adam_first_step_moves_each_parameter_by_lr() -> Result<()> {
    const LR: f32 = 1e-3;

    let mut model = mk_model(4, 6, 3, 3);
    let x = Array2::from_shape_fn((5, 4), |(i, j)| (i + j) as f32 / 4.0);
    let y = [0, 1, 2, 1, 0];

    let mut grad = vec![0.0; model.size()];
    model.backprop(x.view(), &y, &CrossEntropy, 1.0, &mut grad)?;

    let before = model.params().to_vec();
    let mut adam = Adam::with_defaults(model.size(), LR);
    adam.update_params(&grad, model.params_mut())?;

    for ((b, a), g) in before.iter().zip(model.params()).zip(&grad) {
        let delta = a - b;
        if g.abs() > 1e-4 {
            assert!((delta.abs() - LR).abs() < 1e-5);
            assert_eq!(delta.signum(), -g.signum());
        } else if *g == 0.0 {
            assert_eq!(delta, 0.0);
        }
    }

    Ok(())
}

#[test]
fn wine_sized_dataset_yields_thirty_batches() -> Result<()> {
    let ds = InMemoryDataset::new(Array2::zeros((178, 13)), vec![0; 178])?;
    let mut loader = DataLoader::new(&ds, NonZeroUsize::new(6).unwrap())
        .seeded(0)
        .shuffle(true)
        .last_batch(LastBatch::Keep);

    let sizes = loader
        .iter()
        .map(|batch| batch.map(|b| b.len()))
        .collect::<Result<Vec<_>>>()?;

    assert_eq!(sizes.len(), 30);
    assert!(sizes[..29].iter().all(|&n| n == 6));
    assert_eq!(sizes[29], 4);
    Ok(())
}

#[test]
fn accuracy_reports_percentages() -> Result<()> {
    let accuracy = Accuracy::new(9376, 10000);
    assert!((accuracy.percentage()? - 93.76).abs() < 1e-9);
    assert_eq!(accuracy.to_string(), "accuracy: 93.76");

    let empty = Accuracy::default();
    assert!(matches!(empty.percentage(), Err(MlErr::EmptyDataset { .. })));
    Ok(())
}

#[test]
fn evaluating_nothing_is_an_error() -> Result<()> {
    let model = mk_model(2, 3, 2, 0);
    let accuracy = evaluate(&model, std::iter::empty())?;

    assert_eq!(accuracy.total, 0);
    assert!(accuracy.percentage().is_err());
    Ok(())
}

#[test]
fn blobs_are_learned_end_to_end() -> Result<()> {
    let config = mk_config(4, Device::Cpu);
    let mut builder = TrainerBuilder::new(config.seed);

    let blobs = data::blobs(600, 2, 3, 0.3, builder.rng())?;
    let (train, test) = blobs.split(0.8, builder.rng())?;

    let mut trainer = builder.build(&config)?;
    let mut loader = builder.loader(&config, &train)?;
    let mut reports: Vec<Progress> = Vec::new();
    let losses = trainer.train(&mut loader, &mut reports)?;

    assert_eq!(losses.len(), config.n_epochs);
    assert!(losses.last() < losses.first());
    // 480 samples in batches of 16: 30 steps per epoch, reported every 5.
    assert_eq!(reports.len(), config.n_epochs * 6);

    let mut test_loader = DataLoader::new(&test, NonZeroUsize::new(50).unwrap());
    let accuracy = evaluate(trainer.model(), test_loader.iter())?;
    assert_eq!(accuracy.total, test.len());
    assert!(accuracy.percentage()? > 85.0, "{accuracy}");

    Ok(())
}

#[test]
fn cpu_and_parallel_devices_agree() -> Result<()> {
    let mut runs = Vec::new();

    for device in [Device::Cpu, Device::Parallel] {
        let config = TrainingConfig {
            n_epochs: 3,
            ..mk_config(8, device)
        };
        let mut builder = TrainerBuilder::new(config.seed);
        let blobs = data::blobs(200, 2, 3, 1.0, builder.rng())?;

        let mut trainer = builder.build(&config)?;
        let mut loader = builder.loader(&config, &blobs)?;
        let losses = trainer.train(&mut loader, &mut Vec::<Progress>::new())?;
        runs.push((losses, trainer.into_model()));
    }

    let (cpu_losses, cpu_model) = &runs[0];
    let (par_losses, par_model) = &runs[1];
    for (c, p) in cpu_losses.iter().zip(par_losses) {
        assert!((c - p).abs() < 1e-3, "cpu {c}, parallel {p}");
    }
    for (c, p) in cpu_model.params().iter().zip(par_model.params()) {
        assert!((c - p).abs() < 1e-2);
    }

    Ok(())
}

#[test]
fn gradient_descent_can_be_configured() -> Result<()> {
    let config = TrainingConfig {
        optimizer: OptimizerSpec::GradientDescent,
        learning_rate: 0.01,
        ..mk_config(1, Device::Cpu)
    };
    let mut builder = TrainerBuilder::new(config.seed);
    let blobs = data::blobs(120, 2, 3, 0.5, builder.rng())?;

    let mut trainer = builder.build(&config)?;
    let mut loader = builder.loader(&config, &blobs)?;
    let losses = trainer.train(&mut loader, &mut Vec::<Progress>::new())?;

    assert!(losses.last() < losses.first());
    assert_eq!(blobs.len(), 120);
    Ok(())
}
