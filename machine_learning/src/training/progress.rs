use std::fmt::{self, Display};

use log::info;

/// A snapshot of a training run, taken every few steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// The current epoch, starting at 1.
    pub epoch: usize,
    pub epochs: usize,
    /// The current step inside the epoch, starting at 1.
    pub step: usize,
    /// The amount of steps per epoch.
    pub steps: usize,
    /// The loss of the batch of this step.
    pub loss: f32,
}

impl Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch: {}/{}, step: {}/{}, loss: {:.4}",
            self.epoch, self.epochs, self.step, self.steps, self.loss
        )
    }
}

/// Receives the progress of a training run.
pub trait Reporter {
    fn report(&mut self, progress: &Progress);
}

/// Prints every report on its own line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&mut self, progress: &Progress) {
        println!("{progress}");
    }
}

/// Forwards every report to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, progress: &Progress) {
        info!("{progress}");
    }
}

/// Collects the reports, useful to inspect a run after it finished.
impl Reporter for Vec<Progress> {
    fn report(&mut self, progress: &Progress) {
        self.push(*progress);
    }
}
