//! # gesture_trainer
//!
//! Teaches a classifier two hand gestures from a live camera feed, then
//! labels every later frame as BUY or SELL.
//!
//! ## Phases
//!
//! | Mode | What happens per frame | Status label |
//! |---|---|---|
//! | `WaitingForFrame` | first frame arrives | `Loading` |
//! | `WaitingForModel` | model warm-up classify | `Loading` |
//! | `PendingCaptureBuy` | pause before capture | `Buy - Get Ready` |
//! | `CapturingBuy` | store frame as BUY | `Buy - Capturing... (n/200)` |
//! | `PendingCaptureSell` | pause before capture | `Sell - Get Ready` |
//! | `CapturingSell` | store frame as SELL | `Sell - Capturing... (n/200)` |
//! | `Training` | fit the model | `Training... (e/E loss l)` |
//! | `Classifying` | classify, then skip frames | `BUY (0.93)` |
//!
//! ## Simulation keyboard shortcuts
//!
//! | Key | Pose |
//! |---|---|
//! | `B` / hold | Palm away (buy gesture) |
//! | `S` / hold | Palm facing (sell gesture) |
//! | `Q` / `Esc` | Quit |
//!
//! Run with `--headless` to let an autopilot pose the simulated hand.

pub mod config;
pub mod error;
pub mod frame;
pub mod model;
pub mod linear;
pub mod machine;
pub mod status;
pub mod visualizer;
pub mod app;
