//! Error types.

use std::path::PathBuf;

use crate::model::Label;

/// Failure of a single `on_frame` step.
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    /// The classification result did not include a probability for a label.
    #[error("classification result has no {0} probability")]
    MissingLabel(Label),

    /// The model's classify, sample, or train call failed.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Failure loading an [`crate::config::AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field:  &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_label_display() {
        let err = TrainerError::MissingLabel(Label::Sell);
        assert_eq!(err.to_string(), "classification result has no SELL probability");
    }

    #[test]
    fn collaborator_error_is_transparent() {
        let err = TrainerError::from(anyhow::anyhow!("camera unplugged"));
        assert_eq!(err.to_string(), "camera unplugged");
    }
}
