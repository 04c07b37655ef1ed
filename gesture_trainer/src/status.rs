//! Human-readable status label for the current trainer state.

use crate::machine::{Mode, TrainerState};
use crate::model::Label;

/// The status line shown to the user.
///
/// Total over every state; `capture_target` is the configured per-class
/// capture count used as the denominator while capturing.
pub fn label_for(state: &TrainerState, capture_target: usize) -> String {
    let count = state.capture_count.unwrap_or(0);
    match state.mode {
        Mode::WaitingForFrame | Mode::WaitingForModel => "Loading".to_string(),
        Mode::PendingCaptureBuy  => "Buy - Get Ready".to_string(),
        Mode::CapturingBuy       => format!("Buy - Capturing... ({}/{})", count, capture_target),
        Mode::PendingCaptureSell => "Sell - Get Ready".to_string(),
        Mode::CapturingSell      => format!("Sell - Capturing... ({}/{})", count, capture_target),
        Mode::Training => match &state.training_progress {
            Some(progress) => format!("Training... ({})", progress),
            None           => "Training...".to_string(),
        },
        Mode::Classifying => match (state.buy_probability, state.sell_probability) {
            (Some(buy), Some(sell)) => {
                let side = if buy > sell { Label::Buy } else { Label::Sell };
                format!("{} ({:.2})", side, buy.max(sell))
            }
            _ => "Classifying...".to_string(),
        },
    }
}
