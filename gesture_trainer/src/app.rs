//! Application loops.
//!
//! [`run`] opens the visualizer and lets the keyboard pose the simulated
//! hand; [`run_headless`] has an [`Autopilot`] pose it instead and stops
//! after a fixed number of classifications.  Both feed frames to a
//! [`TrainerMachine`] one at a time, reacting to published state while a
//! step is suspended.

use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace};

use crate::config::AppConfig;
use crate::frame::{spawn_frame_source, Frame, Pose, SimFrameSource, SimInput};
use crate::linear::LinearModel;
use crate::machine::{Mode, TrainerMachine, TrainerState};
use crate::model::Label;
use crate::status::label_for;
use crate::visualizer::Visualizer;

/// Redraw cadence for the window.
const RENDER_INTERVAL: Duration = Duration::from_millis(16);

// ════════════════════════════════════════════════════════════════════════════
// run(): windowed
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application with a window.
///
/// The frame source runs on its own thread; this loop owns the machine and
/// the window.  While `on_frame` is suspended (pauses, training) the window
/// keeps redrawing from the machine's status channel.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let mut frames = spawn_frame_source(SimFrameSource { config: cfg.source.clone(), rx: sim_rx }, 1);

    let mut vis = Visualizer::new(sim_tx)?;
    let mut machine = TrainerMachine::new(LinearModel::new(cfg.model.clone()), cfg.machine.clone());
    let mut status = machine.subscribe();
    let target = cfg.machine.capture_count;

    let mut ticker = interval(RENDER_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut latest: Option<Frame> = None;

    while vis.poll_input() {
        tokio::select! {
            next = frames.recv() => {
                let Some(frame) = next else { break };
                {
                    let step = machine.on_frame(&frame);
                    tokio::pin!(step);
                    loop {
                        tokio::select! {
                            result = &mut step => { result?; break; }
                            _ = ticker.tick() => {
                                if !vis.poll_input() { return Ok(()); }
                                let state = status.borrow_and_update().clone();
                                vis.render(Some(&frame), &state, &label_for(&state, target));
                            }
                        }
                    }
                }
                latest = Some(frame);
            }
            _ = ticker.tick() => {}
        }

        vis.render(latest.as_ref(), machine.state(), &machine.label());
    }

    info!("window closed");
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Autopilot: poses the simulated hand from the trainer's state
// ════════════════════════════════════════════════════════════════════════════

/// Chooses the simulated pose for each phase.
///
/// Capture phases get the matching gesture; while classifying the pose
/// alternates after every classification so both classes are exercised.
#[derive(Debug, Default)]
pub struct Autopilot {
    classified: usize,
    shown:      Pose,
}

impl Autopilot {
    pub fn pose_for(&self, state: &TrainerState) -> Pose {
        match (state.mode, state.mode.gesture()) {
            (_, Some(Label::Buy))  => Pose::PalmAway,
            (_, Some(Label::Sell)) => Pose::PalmFacing,
            (Mode::Classifying, None) if self.classified % 2 == 0 => Pose::PalmAway,
            (Mode::Classifying, None) => Pose::PalmFacing,
            _ => Pose::None,
        }
    }

    /// Send the pose for `state` if it differs from what is shown.
    pub fn steer(&mut self, state: &TrainerState, tx: &Sender<SimInput>) {
        let pose = self.pose_for(state);
        if pose != self.shown {
            self.shown = pose;
            let input = match pose {
                Pose::None => SimInput::Release,
                p          => SimInput::Hold(p),
            };
            if tx.send(input).is_err() {
                trace!(?pose, "simulated camera gone, pose not sent");
            }
        }
    }

    pub fn record_classification(&mut self) { self.classified += 1; }

    pub fn shown(&self) -> Pose { self.shown }
}

/// One classification made during a headless run.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    /// Pose the simulated hand was showing.
    pub shown: Pose,
    pub label: String,
    pub buy:   f32,
    pub sell:  f32,
}

// ════════════════════════════════════════════════════════════════════════════
// run_headless(): no window
// ════════════════════════════════════════════════════════════════════════════

/// Capture, train, then classify `classifications` frames without a window.
pub async fn run_headless(cfg: AppConfig, classifications: usize) -> anyhow::Result<Vec<Classification>> {
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let mut frames = spawn_frame_source(SimFrameSource { config: cfg.source.clone(), rx: sim_rx }, 1);

    let mut machine = TrainerMachine::new(LinearModel::new(cfg.model.clone()), cfg.machine.clone());
    let mut status = machine.subscribe();
    let mut pilot = Autopilot::default();
    let mut results = Vec::with_capacity(classifications);

    while results.len() < classifications {
        let Some(frame) = frames.recv().await else { break };
        let before = machine.state().clone();
        {
            let step = machine.on_frame(&frame);
            tokio::pin!(step);
            loop {
                tokio::select! {
                    result = &mut step => { result?; break; }
                    Ok(()) = status.changed() => {
                        let state = status.borrow_and_update().clone();
                        pilot.steer(&state, &sim_tx);
                    }
                }
            }
        }

        let state = machine.state();
        if before.mode == Mode::Classifying && before.skip_count == 0 {
            let (buy, sell) = (state.buy_probability.unwrap_or(0.0), state.sell_probability.unwrap_or(0.0));
            let label = machine.label();
            info!(shown = ?pilot.shown(), %label, "classified");
            results.push(Classification { shown: pilot.shown(), label, buy, sell });
            pilot.record_classification();
        }
        pilot.steer(state, &sim_tx);
    }

    if sim_tx.send(SimInput::Quit).is_err() {
        trace!("simulated camera already stopped");
    }
    Ok(results)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
