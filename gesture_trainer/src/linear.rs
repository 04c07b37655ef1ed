//! Built-in classifier: a linear head over downsampled luminance.
//!
//! Captured frames are reduced to a small grayscale grid and stored in a
//! two-dimensional [`SampleBuffer`] (features, class index).  Training fits a
//! single `Linear` layer with AdamW on cross-entropy, one full batch per
//! epoch, yielding to the runtime between epochs so progress can be shown.

use anyhow::Context;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{linear, loss, ops, AdamW, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use sample_buffer::SampleBuffer;
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::frame::Frame;
use crate::model::{Label, Model, Prediction, TrainingProgress};

/// Sample buffer dimension holding `[N, F]` feature rows.
const FEATURES: usize = 0;
/// Sample buffer dimension holding `[N]` class indices.
const TARGETS:  usize = 1;

pub struct LinearModel {
    config:  ModelConfig,
    device:  Device,
    samples: SampleBuffer,
    /// `None` until the first successful `train`.
    head:    Option<Linear>,
}

impl LinearModel {
    pub fn new(config: ModelConfig) -> Self {
        Self::with_device(config, Device::Cpu)
    }

    pub fn with_device(config: ModelConfig, device: Device) -> Self {
        LinearModel {
            config,
            device,
            samples: SampleBuffer::new(2),
            head:    None,
        }
    }

    pub fn samples(&self) -> &SampleBuffer { &self.samples }

    pub fn is_trained(&self) -> bool { self.head.is_some() }

    fn features(&self, frame: &Frame) -> anyhow::Result<Tensor> {
        let values = frame.downsample(self.config.feature_width, self.config.feature_height);
        Ok(Tensor::from_vec(values, (self.config.feature_len(),), &self.device)?)
    }
}

impl Model for LinearModel {
    async fn classify(&mut self, frame: &Frame) -> anyhow::Result<Vec<Prediction>> {
        let Some(head) = &self.head else {
            // Untrained: every class is equally likely.
            let p = 1.0 / Label::ALL.len() as f32;
            return Ok(Label::ALL.iter().map(|&label| Prediction { label, probability: p }).collect());
        };

        let x = self.features(frame)?.unsqueeze(0)?;
        let logits = head.forward(&x)?;
        let probs = ops::softmax(&logits, D::Minus1)?.squeeze(0)?.to_vec1::<f32>()?;

        Ok(probs.into_iter()
            .enumerate()
            .filter_map(|(i, probability)| {
                Label::from_index(i).map(|label| Prediction { label, probability })
            })
            .collect())
    }

    fn sample(&mut self, label: Label, frame: &Frame) -> anyhow::Result<()> {
        let x = self.features(frame)?;
        let y = Tensor::new(label.index() as u32, &self.device)?;
        self.samples.add(&[x, y])?;
        Ok(())
    }

    async fn train(&mut self, on_progress: &mut dyn FnMut(TrainingProgress)) -> anyhow::Result<()> {
        let x = self.samples.get(FEATURES).context("no samples captured")?.clone();
        let y = self.samples.get(TARGETS).context("no samples captured")?.clone();
        let epochs = self.config.epochs;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let head = linear(self.config.feature_len(), Label::ALL.len(), vb.pp("head"))?;
        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: self.config.learning_rate,
                ..Default::default()
            },
        )?;

        info!(samples = self.samples.len(), epochs, "training linear head");
        for epoch in 1..=epochs {
            let logits = head.forward(&x)?;
            let loss = loss::cross_entropy(&logits, &y)?;
            optimizer.backward_step(&loss)?;

            let loss = loss.to_scalar::<f32>()?;
            debug!(epoch, loss, "epoch complete");
            on_progress(TrainingProgress { epoch, epochs, loss });
            tokio::task::yield_now().await;
        }

        self.head = Some(head);
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
