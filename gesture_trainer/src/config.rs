//! Configuration for the trainer, the built-in model, and the simulated
//! frame source.
//!
//! Loaded from TOML.  Every field has a default, so an empty file (or no file
//! at all) yields the standard 200-capture / 5-second-pause setup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ════════════════════════════════════════════════════════════════════════════
// Defaults
// ════════════════════════════════════════════════════════════════════════════

/// Samples captured per class before moving on.
pub const CAPTURE_COUNT:       usize = 200;
/// Frames skipped after each capture (capture 1 of every N+1 frames).
pub const CAPTURE_SKIP_COUNT:  usize = 1;
/// Frames skipped after each classification.
pub const CLASSIFY_SKIP_COUNT: usize = 20;
/// Pause before each capture phase, in milliseconds.
pub const CAPTURE_DELAY_MS:    u64   = 5000;

// ════════════════════════════════════════════════════════════════════════════
// MachineConfig
// ════════════════════════════════════════════════════════════════════════════

/// Counts and delays that shape the capture → train → classify sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub capture_count:       usize,
    pub capture_skip_count:  usize,
    pub classify_skip_count: usize,
    pub capture_delay_ms:    u64,
}

impl MachineConfig {
    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay_ms)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            capture_count:       CAPTURE_COUNT,
            capture_skip_count:  CAPTURE_SKIP_COUNT,
            classify_skip_count: CLASSIFY_SKIP_COUNT,
            capture_delay_ms:    CAPTURE_DELAY_MS,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ModelConfig
// ════════════════════════════════════════════════════════════════════════════

/// Knobs for [`crate::linear::LinearModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Frames are downsampled to this grid before classification.
    pub feature_width:  usize,
    pub feature_height: usize,
    /// Full-batch passes over the captured samples.
    pub epochs:         usize,
    pub learning_rate:  f64,
}

impl ModelConfig {
    pub fn feature_len(&self) -> usize { self.feature_width * self.feature_height }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            feature_width:  16,
            feature_height: 12,
            epochs:         40,
            learning_rate:  0.05,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SourceConfig
// ════════════════════════════════════════════════════════════════════════════

/// Simulated camera parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub width:  usize,
    pub height: usize,
    pub fps:    u32,
    /// Per-pixel noise amplitude, 0.0–1.0.
    pub noise:  f32,
    /// Fixed RNG seed; random when absent.
    pub seed:   Option<u64>,
}

impl SourceConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.fps.max(1) as u64)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            width:  160,
            height: 120,
            fps:    30,
            noise:  0.15,
            seed:   None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub machine: MachineConfig,
    pub model:   ModelConfig,
    pub source:  SourceConfig,
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Reject values the trainer cannot run with.
    ///
    /// A zero capture count would skip both capture phases and train on an
    /// empty sample set; a zero feature grid leaves the model no inputs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machine.capture_count == 0 {
            return Err(ConfigError::Invalid { field: "machine.capture_count", reason: "must be at least 1" });
        }
        if self.model.feature_len() == 0 {
            return Err(ConfigError::Invalid { field: "model.feature_width/feature_height", reason: "must be at least 1" });
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
