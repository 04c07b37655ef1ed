//! The classifier capability the trainer drives.
//!
//! The trainer only ever talks to a model through [`Model`]: it asks for
//! classifications, hands over labeled frames, and kicks off training.  How
//! the model turns frames into features and features into probabilities is
//! its own business.

use std::fmt;

use crate::frame::Frame;

// ════════════════════════════════════════════════════════════════════════════
// Label
// ════════════════════════════════════════════════════════════════════════════

/// The two gesture classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Buy,
    Sell,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Buy, Label::Sell];

    /// Class index used for model outputs and training targets.
    pub fn index(self) -> usize {
        match self {
            Label::Buy  => 0,
            Label::Sell => 1,
        }
    }

    pub fn from_index(i: usize) -> Option<Label> {
        Label::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Label::Buy  => "BUY",
            Label::Sell => "SELL",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Prediction / TrainingProgress
// ════════════════════════════════════════════════════════════════════════════

/// One entry of a classification result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub label:       Label,
    pub probability: f32,
}

/// Find the probability reported for `label`, if any.
pub fn probability_of(predictions: &[Prediction], label: Label) -> Option<f32> {
    predictions.iter().find(|p| p.label == label).map(|p| p.probability)
}

/// Progress report emitted once per training epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingProgress {
    /// Epochs completed so far (1-based once reported).
    pub epoch:  usize,
    pub epochs: usize,
    pub loss:   f32,
}

impl fmt::Display for TrainingProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} loss {:.3}", self.epoch, self.epochs, self.loss)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Model trait
// ════════════════════════════════════════════════════════════════════════════

/// Classifier capabilities consumed by [`crate::machine::TrainerMachine`].
///
/// Futures returned here are driven on a single-threaded runtime and need
/// not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Model {
    /// Probabilities for the frame; expected to cover every [`Label`].
    async fn classify(&mut self, frame: &Frame) -> anyhow::Result<Vec<Prediction>>;

    /// Store `frame` as a training example for `label`.
    fn sample(&mut self, label: Label, frame: &Frame) -> anyhow::Result<()>;

    /// Fit to every stored sample, calling `on_progress` as work completes.
    async fn train(&mut self, on_progress: &mut dyn FnMut(TrainingProgress)) -> anyhow::Result<()>;
}
