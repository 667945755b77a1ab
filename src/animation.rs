//! Canvas state and the procedural animations that run on it.
//!
//! Everything the tick loop mutates lives in one [`AnimationState`], owned by
//! the loop and lent out by `&mut` to the control surface, the animation
//! step, and the renderer in turn.
//!
//! Each animation advances on its own interval, independent of how fast the
//! loop itself ticks.

use crate::clock::elapsed_ms;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Modes and timing ─────────────────────────────────────────────────

/// Active animation. Exactly one at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Canvas only changes through fills.
    #[default]
    None,
    /// Vertical sine bands sweeping across the canvas.
    Wave,
    /// Flip one pixel at a time, raster order.
    Invert,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::None => "none",
            Mode::Wave => "wave",
            Mode::Invert => "invert",
        };
        f.write_str(name)
    }
}

/// Loop cadence and per-animation update intervals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// Sleep at the end of every loop iteration.
    pub tick_ms: u64,
    /// Minimum time between two inverted pixels.
    pub invert_interval_ms: u32,
    /// Minimum time between two wave steps.
    pub wave_interval_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            invert_interval_ms: 10,
            wave_interval_ms: 10,
        }
    }
}

// ── Animation state ──────────────────────────────────────────────────

/// Process-lifetime display state: the canvas plus animation bookkeeping.
#[derive(Clone, Debug)]
pub struct AnimationState {
    width: usize,
    height: usize,
    /// Row-major brightness, `row * width + col`.
    pixels: Vec<f32>,
    mode: Mode,
    /// Pixel index for invert, column for wave.
    cursor: usize,
    last_update_ms: u32,
    active: bool,
    dirty: bool,
    timing: Timing,
}

impl AnimationState {
    /// A dark, active canvas with no animation running.
    pub fn new(width: usize, height: usize, timing: Timing) -> Self {
        Self {
            width,
            height,
            pixels: vec![0.0; width * height],
            mode: Mode::None,
            cursor: 0,
            last_update_ms: 0,
            active: true,
            dirty: true,
            timing,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixel(&self, row: usize, col: usize) -> Result<f32> {
        let index = self.index(row, col)?;
        Ok(self.pixels[index])
    }

    pub fn set_pixel(&mut self, row: usize, col: usize, brightness: f32) -> Result<()> {
        let index = self.index(row, col)?;
        self.pixels[index] = brightness;
        self.dirty = true;
        Ok(())
    }

    fn index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.height || col >= self.width {
            return Err(Error::OutOfRange {
                row,
                col,
                width: self.width,
                height: self.height,
            });
        }
        Ok(row * self.width + col)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Switch animation, restarting it from the beginning.
    pub fn set_mode(&mut self, mode: Mode, now_ms: u32) {
        self.mode = mode;
        self.cursor = 0;
        self.last_update_ms = now_ms;
    }

    /// Paint every cell the same brightness and stop any animation.
    pub fn fill(&mut self, brightness: f32) {
        self.pixels.fill(brightness);
        self.mode = Mode::None;
        self.cursor = 0;
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Advance the current animation if its interval has passed.
    ///
    /// Returns whether the canvas changed.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        if !self.active {
            return false;
        }

        let interval = match self.mode {
            Mode::None => return false,
            Mode::Invert => self.timing.invert_interval_ms,
            Mode::Wave => self.timing.wave_interval_ms,
        };
        if elapsed_ms(now_ms, self.last_update_ms) < interval {
            return false;
        }

        match self.mode {
            Mode::None => unreachable!("gated above"),
            Mode::Invert => self.step_invert(),
            Mode::Wave => self.step_wave(),
        }

        self.last_update_ms = now_ms;
        self.dirty = true;
        true
    }

    fn step_invert(&mut self) {
        if self.cursor >= self.pixels.len() {
            self.cursor = 0;
        }
        if let Some(pixel) = self.pixels.get_mut(self.cursor) {
            *pixel = 100.0 - *pixel;
        }
        self.cursor += 1;
    }

    /// One wave step: a single sine period stretched across the canvas width,
    /// shifted left by the cursor.
    fn step_wave(&mut self) {
        if self.cursor >= self.width {
            self.cursor = 0;
        }

        for x in 0..self.width {
            let brightness = wave_brightness(x, self.cursor, self.width);
            for y in 0..self.height {
                self.pixels[y * self.width + x] = brightness;
            }
        }

        self.cursor += 1;
    }
}

// ── Wave ─────────────────────────────────────────────────────────────

/// Brightness of column `x` of a one-period sine across `width` columns.
///
/// The phase is truncated to whole degrees before taking the sine. An empty
/// canvas has no period and sits on the midline.
pub fn wave_brightness(x: usize, cursor: usize, width: usize) -> f32 {
    if width == 0 {
        return 50.0;
    }
    let phase = ((x + cursor) % width) as f32 / width as f32;
    let degrees = (phase * 360.0).trunc();
    let amplitude = degrees.to_radians().sin();
    (amplitude + 1.0) * 50.0
}

// ── Tests ────────────────────────────────────────────────────────────
