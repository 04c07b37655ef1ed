//! Frames and frame sources.
//!
//! The public interface is [`Frame`] delivered over a bounded channel.
//! Consumers don't need to know whether frames came from a camera or the
//! simulator.  Sources never block on a busy consumer: when the channel is
//! full the frame is dropped, which is how frames are withheld from the
//! trainer while one of its steps is still in flight.

use std::sync::mpsc::{Receiver as StdReceiver, TryRecvError};
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{debug, trace};

use crate::config::SourceConfig;

// ════════════════════════════════════════════════════════════════════════════
// Frame
// ════════════════════════════════════════════════════════════════════════════

/// One captured image, packed ARGB (0xAARRGGBB) in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width:  usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Frame {
    /// A frame filled with one color.
    pub fn solid(width: usize, height: usize, color: u32) -> Self {
        Frame { width, height, pixels: vec![color; width * height] }
    }

    /// Per-pixel luminance in 0.0–1.0 (Rec. 601 weights).
    pub fn luminance(&self) -> Vec<f32> {
        self.pixels.iter().map(|&p| luma(p)).collect()
    }

    /// Box-filter the luminance down to `w × h` cells.
    ///
    /// Each output cell averages the source pixels that fall inside it, so
    /// the result is independent of the source resolution.
    pub fn downsample(&self, w: usize, h: usize) -> Vec<f32> {
        let mut sums   = vec![0.0f32; w * h];
        let mut counts = vec![0u32;   w * h];
        if self.width == 0 || self.height == 0 || w == 0 || h == 0 {
            return sums;
        }
        for y in 0..self.height {
            let cy = y * h / self.height;
            for x in 0..self.width {
                let cx = x * w / self.width;
                let cell = cy * w + cx;
                sums[cell]   += luma(self.pixels[y * self.width + x]);
                counts[cell] += 1;
            }
        }
        for (sum, &count) in sums.iter_mut().zip(&counts) {
            if count > 0 { *sum /= count as f32; }
        }
        sums
    }
}

fn luma(p: u32) -> f32 {
    let r = ((p >> 16) & 0xFF) as f32;
    let g = ((p >>  8) & 0xFF) as f32;
    let b = ( p        & 0xFF) as f32;
    (0.299 * r + 0.587 * g + 0.114 * b) / 255.0
}

// ════════════════════════════════════════════════════════════════════════════
// FrameSource trait: unified interface for camera and simulation
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`Frame`]s over a channel.
pub trait FrameSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<Frame>);
}

/// Spawn a frame source on its own thread and return the receiving end.
///
/// `capacity` bounds how many frames may wait for the consumer.
pub fn spawn_frame_source<F: FrameSource>(source: F, capacity: usize) -> Receiver<Frame> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

/// Offer a frame without blocking.  Returns false once the consumer is gone.
fn offer(tx: &Sender<Frame>, frame: Frame) -> bool {
    match tx.try_send(frame) {
        Ok(())                       => true,
        Err(TrySendError::Full(_))   => { trace!("consumer busy, frame dropped"); true }
        Err(TrySendError::Closed(_)) => false,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Pose / SimInput
// ════════════════════════════════════════════════════════════════════════════

/// Hand pose shown to the simulated camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pose {
    /// No hand in view.
    #[default]
    None,
    /// Palm turned away from the camera (the BUY gesture).
    PalmAway,
    /// Palm facing the camera (the SELL gesture).
    PalmFacing,
}

/// Raw input for the simulated camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    Hold(Pose),
    Release,
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// SimFrameSource: synthetic camera (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Frame source that paints noisy frames with a hand-shaped blob.
///
/// The blob's placement and shape depend on the [`Pose`] most recently
/// received on `rx`, which lets a keyboard (or an autopilot) stand in for a
/// real hand in front of a camera.
pub struct SimFrameSource {
    pub config: SourceConfig,
    pub rx:     StdReceiver<SimInput>,
}

impl FrameSource for SimFrameSource {
    fn run(self: Box<Self>, tx: Sender<Frame>) {
        let SimFrameSource { config, rx } = *self;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        let interval = config.frame_interval();
        let mut pose = Pose::None;
        let mut next = Instant::now();

        loop {
            loop {
                match rx.try_recv() {
                    Ok(SimInput::Hold(p))   => pose = p,
                    Ok(SimInput::Release)   => pose = Pose::None,
                    Ok(SimInput::Quit)      => return,
                    Err(TryRecvError::Empty)        => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            let frame = render_pose(&config, pose, &mut rng);
            if !offer(&tx, frame) {
                debug!("frame consumer closed, simulated camera stopping");
                return;
            }

            next += interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
    }
}

/// Paint one simulated frame.
pub fn render_pose<R: Rng>(config: &SourceConfig, pose: Pose, rng: &mut R) -> Frame {
    const BACKGROUND: f32 = 0.25;
    const HAND:       f32 = 0.9;

    let (w, h) = (config.width, config.height);
    let mut frame = Frame::solid(w, h, 0);

    for y in 0..h {
        for x in 0..w {
            let fx = x as f32 / w.max(1) as f32;
            let fy = y as f32 / h.max(1) as f32;
            let base = if in_hand(pose, fx, fy) { HAND } else { BACKGROUND };
            let jitter = (rng.gen::<f32>() - 0.5) * 2.0 * config.noise;
            frame.pixels[y * w + x] = gray((base + jitter).clamp(0.0, 1.0));
        }
    }
    frame
}

/// Whether normalised coordinate (`fx`, `fy`) is covered by the hand.
fn in_hand(pose: Pose, fx: f32, fy: f32) -> bool {
    match pose {
        Pose::None => false,
        // Back of the hand: a solid block on the left, knuckles up.
        Pose::PalmAway => fx > 0.10 && fx < 0.45 && fy > 0.25 && fy < 0.85,
        // Open palm: a block on the right with spread fingers above it.
        Pose::PalmFacing => {
            let palm    = fx > 0.55 && fx < 0.90 && fy > 0.45 && fy < 0.85;
            let fingers = fy > 0.15 && fy <= 0.45
                && fx > 0.55 && fx < 0.90
                && ((fx - 0.55) / 0.07) as u32 % 2 == 0;
            palm || fingers
        }
    }
}

fn gray(v: f32) -> u32 {
    let c = (v * 255.0) as u32;
    0xFF000000 | (c << 16) | (c << 8) | c
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
