//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  [latest camera frame, scaled]   │  pose     │
//! │                                  │  hint     │
//! │                                  │           │
//! ├──────────────────────────────────────────────┤
//! │  status label                                │
//! │  key legend                                  │
//! └──────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing::trace;

use crate::frame::{Frame, Pose, SimInput};
use crate::machine::TrainerState;
use crate::model::Label;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:       usize = 800;
pub const WIN_H:       usize = 540;
const PREVIEW_W:       usize = 600;
const PREVIEW_H:       usize = 450;
const SIDE_X:          usize = PREVIEW_W + 16;
const STATUS_Y:        usize = PREVIEW_H;
const BG_COLOR:        u32   = 0xFF1A1A2E;
const SIDE_BG:         u32   = 0xFF16213E;
const TEXT_BG:         u32   = 0xFF0F3460;
const BUY_COLOR:       u32   = 0xFF4CD964;
const SELL_COLOR:      u32   = 0xFFFF5A5F;
const PROB_BAR_H:      usize = 12;

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
    sim_tx: Sender<SimInput>,
    /// Pose last sent to the simulated camera.
    held:   Pose,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> anyhow::Result<Self> {
        let window = Window::new(
            "Gesture Trainer: BUY / SELL",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
            held: Pose::None,
        })
    }

    /// Poll keyboard input and forward pose changes to the simulated camera.
    /// Returns false when the window should close.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        if self.window.is_key_pressed(Key::Q, KeyRepeat::No)
            || self.window.is_key_pressed(Key::Escape, KeyRepeat::No)
        {
            if self.sim_tx.send(SimInput::Quit).is_err() {
                trace!("simulated camera already stopped");
            }
            return false;
        }

        let pose = if self.window.is_key_down(Key::B) {
            Pose::PalmAway
        } else if self.window.is_key_down(Key::S) {
            Pose::PalmFacing
        } else {
            Pose::None
        };
        if pose != self.held {
            self.held = pose;
            let input = match pose {
                Pose::None => SimInput::Release,
                p          => SimInput::Hold(p),
            };
            if self.sim_tx.send(input).is_err() {
                trace!(?pose, "simulated camera gone, pose not sent");
            }
        }
        true
    }

    /// Render one frame.
    pub fn render(&mut self, frame: Option<&Frame>, state: &TrainerState, label: &str) {
        self.buf.fill(BG_COLOR);

        // ── Camera preview ────────────────────────────────────────────────
        if let Some(frame) = frame {
            self.draw_frame(frame);
        }

        // ── Side panel ────────────────────────────────────────────────────
        self.fill_rect(PREVIEW_W, 0, WIN_W - PREVIEW_W, PREVIEW_H, SIDE_BG);
        match state.mode.gesture() {
            Some(Label::Buy) => {
                self.draw_label("BUY", SIDE_X, 20, 3, BUY_COLOR);
                self.draw_label("HOLD B", SIDE_X, 50, 2, 0xFFEEEEEE);
                self.draw_label("PALM AWAY", SIDE_X, 66, 2, 0xFFEEEEEE);
            }
            Some(Label::Sell) => {
                self.draw_label("SELL", SIDE_X, 20, 3, SELL_COLOR);
                self.draw_label("HOLD S", SIDE_X, 50, 2, 0xFFEEEEEE);
                self.draw_label("PALM FACING", SIDE_X, 66, 2, 0xFFEEEEEE);
            }
            None => {}
        }
        if let (Some(buy), Some(sell)) = (state.buy_probability, state.sell_probability) {
            self.draw_probability("BUY",  buy,  120, BUY_COLOR);
            self.draw_probability("SELL", sell, 160, SELL_COLOR);
        }

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        self.draw_label(label, 12, STATUS_Y + 16, 4, 0xFFEEEEEE);

        // ── Key legend ────────────────────────────────────────────────────
        self.draw_label(
            "B=palm away (buy)  S=palm facing (sell)  Q/Esc=quit",
            12, WIN_H - 16, 2, 0xFF888888,
        );

        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── Camera frame ──────────────────────────────────────────────────────

    fn draw_frame(&mut self, frame: &Frame) {
        if frame.width == 0 || frame.height == 0 { return; }
        for y in 0..PREVIEW_H {
            let sy = y * frame.height / PREVIEW_H;
            for x in 0..PREVIEW_W {
                let sx = x * frame.width / PREVIEW_W;
                self.buf[y * WIN_W + x] = frame.pixels[sy * frame.width + sx];
            }
        }
    }

    fn draw_probability(&mut self, name: &str, p: f32, y: usize, color: u32) {
        let bar_w = WIN_W - SIDE_X - 16;
        self.draw_label(&format!("{} {:.2}", name, p), SIDE_X, y, 2, 0xFFEEEEEE);
        self.fill_rect(SIDE_X, y + 14, bar_w, PROB_BAR_H, BG_COLOR);
        let filled = (bar_w as f32 * p.clamp(0.0, 1.0)) as usize;
        self.fill_rect(SIDE_X, y + 14, filled, PROB_BAR_H, color);
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// Minimal bitmap font, each 3×5 glyph drawn at `scale` pixels per dot.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        for dy in 0..scale {
                            for dx in 0..scale {
                                self.set_pixel(cx + col * scale + dx, y + row * scale + dy, color);
                            }
                        }
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > WIN_W { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}
