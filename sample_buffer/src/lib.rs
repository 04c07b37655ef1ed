//! # sample_buffer
//!
//! Accumulates fixed-arity tuples of per-sample tensors into one growing
//! tensor per dimension.
//!
//! Each call to [`SampleBuffer::add`] supplies exactly one tensor per
//! dimension, each describing a *single* sample (no batch axis).  The buffer
//! inserts the sample axis and concatenates along it, so after `n` adds every
//! dimension holds a tensor whose leading size is `n`.
//!
//! Only one generation is ever retained: the previous accumulated tensor of
//! each dimension is dropped as soon as its replacement has been built, so
//! live memory tracks the current accumulated size rather than the number of
//! `add` calls ever made.
//!
//! ```rust,no_run
//! use candle_core::{Device, Tensor};
//! use sample_buffer::SampleBuffer;
//!
//! let device = Device::Cpu;
//! let mut buffer = SampleBuffer::new(2);
//!
//! let features = Tensor::new(&[0.1f32, 0.9, 0.4], &device).unwrap();
//! let label    = Tensor::new(1u32, &device).unwrap();
//! buffer.add(&[features, label]).unwrap();
//!
//! assert_eq!(buffer.get(0).unwrap().dims(), &[1, 3]);
//! assert_eq!(buffer.get(1).unwrap().dims(), &[1]);
//! ```

use candle_core::Tensor;
use tracing::trace;

/// Axis along which samples are accumulated.
pub const SAMPLE_AXIS: usize = 0;

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SampleBufferError {
    /// `add` was called with the wrong number of tensors.
    #[error("expected {expected} values, received {received}")]
    Arity { expected: usize, received: usize },

    /// `get` was called for a dimension that holds no data.
    #[error("dimension {dimension} has no accumulated data")]
    Index { dimension: usize },

    /// Concatenation or reshaping failed inside the tensor backend.
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, SampleBufferError>;

// ════════════════════════════════════════════════════════════════════════════
// SampleBuffer
// ════════════════════════════════════════════════════════════════════════════

/// Growing per-dimension sample storage.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    dimensions: usize,
    /// `None` until the first successful `add`.
    data:       Option<Vec<Tensor>>,
    samples:    usize,
}

impl SampleBuffer {
    pub fn new(dimensions: usize) -> Self {
        SampleBuffer { dimensions, data: None, samples: 0 }
    }

    pub fn dimensions(&self) -> usize { self.dimensions }

    /// Number of samples accumulated so far.
    pub fn len(&self) -> usize { self.samples }

    pub fn is_empty(&self) -> bool { self.samples == 0 }

    /// Append one sample to every dimension.
    ///
    /// `sample[d]` is the new value for dimension `d`, without the sample
    /// axis.  Every replacement tensor is built before any is installed, so
    /// a failure of any kind leaves the buffer exactly as it was.
    pub fn add(&mut self, sample: &[Tensor]) -> Result<()> {
        if sample.len() != self.dimensions {
            return Err(SampleBufferError::Arity {
                expected: self.dimensions,
                received: sample.len(),
            });
        }

        let next = match &self.data {
            None => sample.iter()
                .map(|value| value.unsqueeze(SAMPLE_AXIS))
                .collect::<candle_core::Result<Vec<_>>>()?,
            Some(current) => current.iter()
                .zip(sample)
                .map(|(previous, value)| {
                    let value = value.unsqueeze(SAMPLE_AXIS)?;
                    Tensor::cat(&[previous, &value], SAMPLE_AXIS)
                })
                .collect::<candle_core::Result<Vec<_>>>()?,
        };

        // Release the previous generation now that the replacement exists.
        let previous = self.data.replace(next);
        drop(previous);

        self.samples += 1;
        trace!(samples = self.samples, dimensions = self.dimensions, "sample appended");
        Ok(())
    }

    /// The accumulated tensor for `dimension`, shaped `[len, ..sample shape]`.
    pub fn get(&self, dimension: usize) -> Result<&Tensor> {
        self.data
            .as_ref()
            .and_then(|data| data.get(dimension))
            .ok_or(SampleBufferError::Index { dimension })
    }

    /// Drop every accumulated tensor.
    pub fn clear(&mut self) {
        self.data = None;
        self.samples = 0;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
