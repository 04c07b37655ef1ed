//! Capture → train → classify state machine.
//!
//! `TrainerMachine` owns the [`TrainerState`] and the [`Model`].  Every
//! incoming frame goes through [`TrainerMachine::on_frame`], which decides
//! whether to skip it, capture it as a labeled sample, wait, train, or
//! classify it.  The machine publishes a copy of its state on a `watch`
//! channel after every change so a renderer can follow along while a step
//! is suspended in a pause or in training.
//!
//! `on_frame` takes `&mut self`, so a second frame cannot be processed until
//! the previous step has finished, pauses and training included.

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::config::MachineConfig;
use crate::error::TrainerError;
use crate::frame::Frame;
use crate::model::{probability_of, Label, Model, TrainingProgress};
use crate::status;

// ════════════════════════════════════════════════════════════════════════════
// Mode
// ════════════════════════════════════════════════════════════════════════════

/// Lifecycle position, in order.  `Classifying` repeats forever.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    WaitingForFrame,
    WaitingForModel,
    PendingCaptureBuy,
    CapturingBuy,
    PendingCaptureSell,
    CapturingSell,
    Training,
    Classifying,
}

impl Mode {
    /// The label whose gesture the user should be holding, if any.
    pub fn gesture(self) -> Option<Label> {
        match self {
            Mode::PendingCaptureBuy  | Mode::CapturingBuy  => Some(Label::Buy),
            Mode::PendingCaptureSell | Mode::CapturingSell => Some(Label::Sell),
            _ => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TrainerState
// ════════════════════════════════════════════════════════════════════════════

/// Everything the machine knows.  Fields not relevant to `mode` are `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainerState {
    pub mode:              Mode,
    /// Samples captured in the current phase; `Some` only while pending or capturing.
    pub capture_count:     Option<usize>,
    /// Frames still to be ignored before the next unit of work.
    pub skip_count:        usize,
    pub buy_probability:   Option<f32>,
    pub sell_probability:  Option<f32>,
    /// Most recent report; `Some` only while training.
    pub training_progress: Option<TrainingProgress>,
}

// ════════════════════════════════════════════════════════════════════════════
// TrainerMachine
// ════════════════════════════════════════════════════════════════════════════

pub struct TrainerMachine<M> {
    model:  M,
    config: MachineConfig,
    state:  TrainerState,
    status: watch::Sender<TrainerState>,
}

impl<M: Model> TrainerMachine<M> {
    pub fn new(model: M, config: MachineConfig) -> Self {
        let state = TrainerState::default();
        let (status, _) = watch::channel(state.clone());
        TrainerMachine { model, config, state, status }
    }

    pub fn state(&self)  -> &TrainerState  { &self.state }
    pub fn config(&self) -> &MachineConfig { &self.config }
    pub fn model(&self)  -> &M             { &self.model }

    /// Receive a copy of the state after every change.
    pub fn subscribe(&self) -> watch::Receiver<TrainerState> {
        self.status.subscribe()
    }

    /// Status line for the current state.
    pub fn label(&self) -> String {
        status::label_for(&self.state, self.config.capture_count)
    }

    /// Consume one frame.
    ///
    /// Model failures propagate unchanged.  A failing model call is always
    /// the last thing a transition does, and the two transitions that change
    /// state before awaiting the model (warm-up and training) put the state
    /// back the way it was, so the next frame starts the same transition
    /// again.
    pub async fn on_frame(&mut self, frame: &Frame) -> Result<(), TrainerError> {
        if self.state.skip_count > 0 {
            self.state.skip_count -= 1;
            trace!(remaining = self.state.skip_count, "frame skipped");
            self.publish();
            return Ok(());
        }

        match self.state.mode {
            Mode::WaitingForFrame => self.warm_up(frame).await,
            Mode::CapturingBuy    => self.capture(Label::Buy, frame).await,
            Mode::CapturingSell   => self.capture(Label::Sell, frame).await,
            Mode::Classifying     => self.classify(frame).await,
            Mode::WaitingForModel
            | Mode::PendingCaptureBuy
            | Mode::PendingCaptureSell
            | Mode::Training => Ok(()),
        }
    }

    // ── transitions ──────────────────────────────────────────────────────

    async fn warm_up(&mut self, frame: &Frame) -> Result<(), TrainerError> {
        let before = self.state.clone();
        self.enter(Mode::WaitingForModel);

        // Throwaway prediction so the model does any lazy setup now.
        if let Err(err) = self.model.classify(frame).await {
            warn!(error = %err, "warm-up classification failed");
            self.restore(before);
            return Err(err.into());
        }

        self.state.capture_count = Some(0);
        self.enter(Mode::PendingCaptureBuy);
        sleep(self.config.capture_delay()).await;
        self.enter(Mode::CapturingBuy);
        Ok(())
    }

    async fn capture(&mut self, label: Label, frame: &Frame) -> Result<(), TrainerError> {
        let captured = self.state.capture_count.unwrap_or(0);
        if captured >= self.config.capture_count {
            return match label {
                Label::Buy  => { self.pause_before_sell().await; Ok(()) }
                Label::Sell => self.train().await,
            };
        }

        if let Err(err) = self.model.sample(label, frame) {
            warn!(%label, error = %err, "sample failed");
            return Err(err.into());
        }
        self.state.capture_count = Some(captured + 1);
        self.state.skip_count = self.config.capture_skip_count;
        debug!(%label, captured = captured + 1, "sample captured");
        self.publish();
        Ok(())
    }

    async fn pause_before_sell(&mut self) {
        self.state.capture_count = Some(0);
        self.enter(Mode::PendingCaptureSell);
        sleep(self.config.capture_delay()).await;
        self.enter(Mode::CapturingSell);
    }

    async fn train(&mut self) -> Result<(), TrainerError> {
        let before = self.state.clone();
        self.state.capture_count = None;
        self.enter(Mode::Training);

        let state  = &mut self.state;
        let status = &self.status;
        let result = self.model.train(&mut |progress| {
            state.training_progress = Some(progress);
            status.send_replace(state.clone());
        }).await;

        if let Err(err) = result {
            warn!(error = %err, "training failed");
            self.restore(before);
            return Err(err.into());
        }

        self.state.training_progress = None;
        self.enter(Mode::Classifying);
        Ok(())
    }

    async fn classify(&mut self, frame: &Frame) -> Result<(), TrainerError> {
        let predictions = match self.model.classify(frame).await {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "classification failed");
                return Err(err.into());
            }
        };
        let buy = probability_of(&predictions, Label::Buy)
            .ok_or(TrainerError::MissingLabel(Label::Buy))?;
        let sell = probability_of(&predictions, Label::Sell)
            .ok_or(TrainerError::MissingLabel(Label::Sell))?;

        self.state.buy_probability  = Some(buy);
        self.state.sell_probability = Some(sell);
        self.state.skip_count = self.config.classify_skip_count;
        debug!(buy, sell, "frame classified");
        self.publish();
        Ok(())
    }

    // ── bookkeeping ──────────────────────────────────────────────────────

    fn enter(&mut self, mode: Mode) {
        info!(from = ?self.state.mode, to = ?mode, "mode transition");
        self.state.mode = mode;
        self.publish();
    }

    fn restore(&mut self, before: TrainerState) {
        self.state = before;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.state.clone());
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Prediction;
    use std::time::Duration;
    use tokio::time::Instant;

    /// In-memory model that records what the machine asks of it.
    #[derive(Default)]
    struct ScriptedModel {
        classify_calls: usize,
        samples:        Vec<Label>,
        trained:        bool,
        /// Sample count seen when `train` was called.
        trained_on:     Option<usize>,
        predictions:    Vec<Prediction>,
        fail_classify:  bool,
        fail_sample:    bool,
        fail_train:     bool,
    }

    impl Model for ScriptedModel {
        async fn classify(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Prediction>> {
            self.classify_calls += 1;
            if self.fail_classify { anyhow::bail!("classify failed"); }
            Ok(self.predictions.clone())
        }

        fn sample(&mut self, label: Label, _frame: &Frame) -> anyhow::Result<()> {
            if self.fail_sample { anyhow::bail!("sample failed"); }
            self.samples.push(label);
            Ok(())
        }

        async fn train(&mut self, on_progress: &mut dyn FnMut(TrainingProgress)) -> anyhow::Result<()> {
            if self.fail_train { anyhow::bail!("train failed"); }
            self.trained_on = Some(self.samples.len());
            for epoch in 1..=3 {
                on_progress(TrainingProgress { epoch, epochs: 3, loss: 1.0 / epoch as f32 });
                tokio::task::yield_now().await;
            }
            self.trained = true;
            Ok(())
        }
    }

    fn frame() -> Frame { Frame::solid(2, 2, 0xFF000000) }

    fn predictions(buy: f32, sell: f32) -> Vec<Prediction> {
        vec![
            Prediction { label: Label::Buy,  probability: buy  },
            Prediction { label: Label::Sell, probability: sell },
        ]
    }

    fn small_config() -> MachineConfig {
        MachineConfig { capture_count: 3, ..MachineConfig::default() }
    }

    fn machine_in(state: TrainerState, model: ScriptedModel, config: MachineConfig) -> TrainerMachine<ScriptedModel> {
        let mut m = TrainerMachine::new(model, config);
        m.state = state;
        m.publish();
        m
    }

    /// Run one step and return the first published state matching `pred`
    /// seen while the step was suspended.
    async fn observe_during<F>(machine: &mut TrainerMachine<ScriptedModel>, pred: F) -> TrainerState
    where
        F: FnMut(&TrainerState) -> bool,
    {
        let mut status = machine.subscribe();
        let f = frame();
        let step = machine.on_frame(&f);
        tokio::pin!(step);
        let seen = tokio::select! {
            biased;
            seen = status.wait_for(pred) => TrainerState::clone(&seen.unwrap()),
            res = &mut step => panic!("step finished before the state was seen: {:?}", res.err()),
        };
        step.await.unwrap();
        seen
    }

    /// Feed frames until `mode` is reached.
    async fn drive_until(machine: &mut TrainerMachine<ScriptedModel>, mode: Mode) -> usize {
        let mut frames = 0;
        while machine.state().mode != mode {
            machine.on_frame(&frame()).await.unwrap();
            frames += 1;
            assert!(frames < 10_000, "never reached {:?}", mode);
        }
        frames
    }

    // ── skip gate ─────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn skip_gate_does_no_mode_work() {
        let state = TrainerState { mode: Mode::Classifying, skip_count: 2, ..TrainerState::default() };
        let mut m = machine_in(state, ScriptedModel::default(), MachineConfig::default());

        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().skip_count, 1);
        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().skip_count, 0);
        assert_eq!(m.model().classify_calls, 0);
    }

    // ── warm-up ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn warm_up_pauses_then_starts_buy_capture() {
        let mut m = TrainerMachine::new(ScriptedModel::default(), MachineConfig::default());
        let start = Instant::now();
        m.on_frame(&frame()).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(5000));
        assert_eq!(m.state().mode, Mode::CapturingBuy);
        assert_eq!(m.state().capture_count, Some(0));
        assert_eq!(m.model().classify_calls, 1);
        assert!(m.model().samples.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn warm_up_shows_get_ready() {
        let mut m = TrainerMachine::new(ScriptedModel::default(), MachineConfig::default());
        let seen = observe_during(&mut m, |s| s.mode == Mode::PendingCaptureBuy).await;
        assert_eq!(seen.capture_count, Some(0));
        assert_eq!(status::label_for(&seen, 200), "Buy - Get Ready");
    }

    #[tokio::test(start_paused = true)]
    async fn frames_during_waiting_modes_do_nothing() {
        for mode in [Mode::WaitingForModel, Mode::PendingCaptureBuy, Mode::PendingCaptureSell, Mode::Training] {
            let state = TrainerState { mode, ..TrainerState::default() };
            let mut m = machine_in(state.clone(), ScriptedModel::default(), MachineConfig::default());
            m.on_frame(&frame()).await.unwrap();
            assert_eq!(m.state(), &state);
            assert_eq!(m.model().classify_calls, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_warm_up_restores_and_retries() {
        let model = ScriptedModel { fail_classify: true, ..ScriptedModel::default() };
        let mut m = TrainerMachine::new(model, MachineConfig::default());

        let err = m.on_frame(&frame()).await.unwrap_err();
        assert!(matches!(err, TrainerError::Collaborator(_)));
        assert_eq!(m.state(), &TrainerState::default());

        m.model.fail_classify = false;
        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().mode, Mode::CapturingBuy);
        assert_eq!(m.model().classify_calls, 2);
    }

    // ── capture ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn captures_exactly_200_buy_samples_then_pauses() {
        let mut m = TrainerMachine::new(ScriptedModel::default(), MachineConfig::default());
        m.on_frame(&frame()).await.unwrap();

        while m.state().capture_count < Some(200) {
            m.on_frame(&frame()).await.unwrap();
        }
        assert_eq!(m.model().samples.len(), 200);
        assert!(m.model().samples.iter().all(|&l| l == Label::Buy));
        assert_eq!(m.state().mode, Mode::CapturingBuy);

        // One trailing skip, then the transition frame.
        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().skip_count, 0);

        let start = Instant::now();
        let seen = observe_during(&mut m, |s| s.mode == Mode::PendingCaptureSell).await;
        assert_eq!(seen.capture_count, Some(0));
        assert_eq!(m.state().mode, Mode::CapturingSell);
        assert_eq!(m.state().capture_count, Some(0));
        assert!(start.elapsed() >= Duration::from_millis(5000));
        assert_eq!(m.model().samples.len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn captures_exactly_200_sell_samples_then_trains() {
        let state = TrainerState { mode: Mode::CapturingSell, capture_count: Some(0), ..TrainerState::default() };
        let mut m = machine_in(state, ScriptedModel::default(), MachineConfig::default());

        while m.state().capture_count < Some(200) {
            m.on_frame(&frame()).await.unwrap();
        }
        assert_eq!(m.model().samples.len(), 200);
        assert!(m.model().samples.iter().all(|&l| l == Label::Sell));
        assert_eq!(m.state().mode, Mode::CapturingSell);
        assert_eq!(m.model().trained_on, None);

        // One trailing skip, then the transition frame.
        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().mode, Mode::CapturingSell);

        let seen = observe_during(&mut m, |s| s.mode == Mode::Training).await;
        assert_eq!(seen.capture_count, None);
        assert_eq!(m.model().trained_on, Some(200));
        assert_eq!(m.model().samples.len(), 200);
        assert_eq!(m.state().mode, Mode::Classifying);
    }

    #[tokio::test(start_paused = true)]
    async fn one_frame_skipped_between_captures() {
        let state = TrainerState { mode: Mode::CapturingBuy, capture_count: Some(0), ..TrainerState::default() };
        let mut m = machine_in(state, ScriptedModel::default(), MachineConfig::default());

        let mut skips = Vec::new();
        for _ in 0..10 {
            m.on_frame(&frame()).await.unwrap();
            skips.push(m.state().skip_count);
        }
        assert_eq!(skips, vec![1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(m.model().samples.len(), 5);
        assert_eq!(m.state().capture_count, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sample_leaves_state_untouched() {
        let state = TrainerState { mode: Mode::CapturingSell, capture_count: Some(2), ..TrainerState::default() };
        let model = ScriptedModel { fail_sample: true, ..ScriptedModel::default() };
        let mut m = machine_in(state.clone(), model, MachineConfig::default());

        let err = m.on_frame(&frame()).await.unwrap_err();
        assert_eq!(err.to_string(), "sample failed");
        assert_eq!(m.state(), &state);
    }

    // ── training ──────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn full_run_reaches_classifying() {
        let mut m = TrainerMachine::new(ScriptedModel::default(), small_config());
        drive_until(&mut m, Mode::CapturingSell).await;
        while m.state().capture_count < Some(3) {
            m.on_frame(&frame()).await.unwrap();
        }
        m.on_frame(&frame()).await.unwrap(); // trailing skip

        let seen = observe_during(&mut m, |s| s.training_progress.is_some()).await;
        assert_eq!(seen.mode, Mode::Training);
        assert_eq!(seen.capture_count, None);

        assert_eq!(m.state().mode, Mode::Classifying);
        assert_eq!(m.state().training_progress, None);
        assert!(m.model().trained);
        assert_eq!(
            m.model().samples,
            vec![Label::Buy, Label::Buy, Label::Buy, Label::Sell, Label::Sell, Label::Sell]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn training_progress_tracks_latest_report() {
        let state = TrainerState { mode: Mode::CapturingSell, capture_count: Some(3), ..TrainerState::default() };
        let mut m = machine_in(state, ScriptedModel::default(), small_config());

        let seen = observe_during(&mut m, |s| {
            s.training_progress.map(|p| p.epoch) == Some(3)
        }).await;
        assert_eq!(status::label_for(&seen, 3), "Training... (3/3 loss 0.333)");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_training_restores_capture_state() {
        let state = TrainerState { mode: Mode::CapturingSell, capture_count: Some(3), ..TrainerState::default() };
        let model = ScriptedModel { fail_train: true, ..ScriptedModel::default() };
        let mut m = machine_in(state.clone(), model, small_config());

        let err = m.on_frame(&frame()).await.unwrap_err();
        assert!(matches!(err, TrainerError::Collaborator(_)));
        assert_eq!(m.state(), &state);

        m.model.fail_train = false;
        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().mode, Mode::Classifying);
    }

    // ── classify ──────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn classify_stores_probabilities_and_throttles() {
        let state = TrainerState { mode: Mode::Classifying, ..TrainerState::default() };
        let model = ScriptedModel { predictions: predictions(0.7, 0.3), ..ScriptedModel::default() };
        let mut m = machine_in(state, model, MachineConfig::default());

        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.state().buy_probability, Some(0.7));
        assert_eq!(m.state().sell_probability, Some(0.3));
        assert_eq!(m.state().skip_count, 20);
        assert_eq!(m.label(), "BUY (0.70)");

        for _ in 0..20 { m.on_frame(&frame()).await.unwrap(); }
        assert_eq!(m.model().classify_calls, 1);
        m.on_frame(&frame()).await.unwrap();
        assert_eq!(m.model().classify_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_sell_probability_is_an_error() {
        let state = TrainerState {
            mode:             Mode::Classifying,
            buy_probability:  Some(0.6),
            sell_probability: Some(0.4),
            ..TrainerState::default()
        };
        let model = ScriptedModel {
            predictions: vec![Prediction { label: Label::Buy, probability: 0.9 }],
            ..ScriptedModel::default()
        };
        let mut m = machine_in(state.clone(), model, MachineConfig::default());

        let err = m.on_frame(&frame()).await.unwrap_err();
        assert!(matches!(err, TrainerError::MissingLabel(Label::Sell)));
        assert_eq!(m.state(), &state);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_latest_state() {
        let state = TrainerState { mode: Mode::Classifying, ..TrainerState::default() };
        let model = ScriptedModel { predictions: predictions(0.2, 0.8), ..ScriptedModel::default() };
        let mut m = machine_in(state, model, MachineConfig::default());
        let rx = m.subscribe();

        m.on_frame(&frame()).await.unwrap();
        assert_eq!(rx.borrow().sell_probability, Some(0.8));
        assert_eq!(&*rx.borrow(), m.state());
    }
}
