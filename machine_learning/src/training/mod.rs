mod builder;
mod evaluation;
mod progress;
mod trainer;

pub use builder::{ConfiguredTrainer, TrainerBuilder};
pub use evaluation::{Accuracy, argmax, evaluate};
pub use progress::{LogReporter, Progress, Reporter, StdoutReporter};
pub use trainer::{Phase, Trainer};
