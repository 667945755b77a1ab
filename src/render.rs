//! Render driver and the cooperative tick loop.
//!
//! The loop owns every piece of mutable state. Each iteration:
//! 1. applies at most one operator command,
//! 2. advances the running animation if its interval has elapsed,
//! 3. pushes the canvas to the servos,
//! 4. sleeps for the tick duration.
//!
//! Nothing in here is fatal. Out-of-range values are clamped and counted,
//! and a servo write that fails is skipped so the rest of the canvas still
//! goes out on time.

use crate::animation::AnimationState;
use crate::backend::PwmBackend;
use crate::clock::Clock;
use crate::control::ControlSurface;
use crate::mapper::Topology;
use crate::servo::ServoCalibration;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Failures worth reporting before they flood the log.
const LOGGED_WRITE_FAILURES: u64 = 5;

// ── Policy and reports ───────────────────────────────────────────────

/// When the renderer writes to the servos.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// Every tick, whether or not the canvas changed.
    #[default]
    Always,
    /// Only on ticks where the canvas changed since the last pass.
    OnChange,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub policy: RenderPolicy,
}

/// Running totals of everything the pipeline had to correct or skip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultCounters {
    pub out_of_range_brightness: u64,
    pub out_of_range_angle: u64,
    pub write_failures: u64,
}

/// Summary of one render pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub writes: usize,
    pub failures: usize,
    /// The pass was skipped (inactive, or nothing changed under `OnChange`).
    pub skipped: bool,
}

// ── Renderer ─────────────────────────────────────────────────────────

/// Turns canvas brightness into servo writes.
#[derive(Clone, Debug)]
pub struct Renderer {
    topology: Topology,
    calibration: ServoCalibration,
    policy: RenderPolicy,
    faults: FaultCounters,
}

impl Renderer {
    pub fn new(topology: Topology, calibration: ServoCalibration, policy: RenderPolicy) -> Self {
        Self {
            topology,
            calibration,
            policy,
            faults: FaultCounters::default(),
        }
    }

    pub fn faults(&self) -> FaultCounters {
        self.faults
    }

    pub fn policy(&self) -> RenderPolicy {
        self.policy
    }

    /// Write every cell of the canvas to its servo, in raster order.
    pub fn render<B: PwmBackend>(
        &mut self,
        state: &mut AnimationState,
        backend: &mut B,
    ) -> RenderReport {
        if !state.is_active() || (self.policy == RenderPolicy::OnChange && !state.is_dirty()) {
            return RenderReport {
                skipped: true,
                ..RenderReport::default()
            };
        }

        let mut report = RenderReport::default();
        let width = state.width();

        for (index, &brightness) in state.pixels().iter().enumerate() {
            let (row, col) = (index / width, index % width);

            let translation = self.calibration.translate(brightness);
            if translation.brightness_clamped {
                self.faults.out_of_range_brightness += 1;
                tracing::debug!(
                    "Clamped brightness {} at ({}, {})",
                    brightness,
                    row,
                    col
                );
            }
            if translation.angle_clamped {
                self.faults.out_of_range_angle += 1;
                tracing::warn!(
                    "Servo angle for brightness {} at ({}, {}) left 0..180, clamped to {}",
                    brightness,
                    row,
                    col,
                    translation.angle
                );
            }

            let address = match self.topology.map_canvas_to_device(row, col) {
                Ok(address) => address,
                Err(e) => {
                    self.record_failure(&mut report, format_args!("{e}"));
                    continue;
                }
            };

            match backend.set_pwm(address.bank, address.channel, 0, translation.pulse) {
                Ok(()) => report.writes += 1,
                Err(e) => self.record_failure(
                    &mut report,
                    format_args!(
                        "bank {} channel {}: {}",
                        address.bank, address.channel, e
                    ),
                ),
            }
        }

        // A partial pass still leaves the servos out of sync; try again next tick.
        if report.failures == 0 {
            state.clear_dirty();
        }
        report
    }

    fn record_failure(&mut self, report: &mut RenderReport, detail: std::fmt::Arguments<'_>) {
        report.failures += 1;
        self.faults.write_failures += 1;
        if self.faults.write_failures <= LOGGED_WRITE_FAILURES {
            tracing::warn!("Skipped servo write, {}", detail);
        } else if self.faults.write_failures == LOGGED_WRITE_FAILURES + 1 {
            tracing::warn!("Further servo write failures are only counted");
        }
    }

    /// Drive every servo to its rest angle, ignoring the active flag.
    pub fn park<B: PwmBackend>(&mut self, backend: &mut B) -> RenderReport {
        let pulse = self.calibration.rest_pulse();
        let mut report = RenderReport::default();

        for row in 0..self.topology.canvas_height {
            for col in 0..self.topology.canvas_width {
                let Ok(address) = self.topology.map_canvas_to_device(row, col) else {
                    continue;
                };
                match backend.set_pwm(address.bank, address.channel, 0, pulse) {
                    Ok(()) => report.writes += 1,
                    Err(e) => self.record_failure(
                        &mut report,
                        format_args!(
                            "bank {} channel {}: {}",
                            address.bank, address.channel, e
                        ),
                    ),
                }
            }
        }
        report
    }
}

// ── Tick loop ────────────────────────────────────────────────────────

/// One loop iteration without the trailing sleep.
pub fn step<B, W>(
    state: &mut AnimationState,
    renderer: &mut Renderer,
    backend: &mut B,
    control: &mut ControlSurface<W>,
    now_ms: u32,
) -> RenderReport
where
    B: PwmBackend,
    W: Write,
{
    control.poll(state, now_ms);
    state.tick(now_ms);
    renderer.render(state, backend)
}

/// Run until `running` goes false (Ctrl+C), then park the tiles.
pub fn render_loop<B, C, W>(
    state: &mut AnimationState,
    renderer: &mut Renderer,
    backend: &mut B,
    control: &mut ControlSurface<W>,
    clock: &C,
    running: &AtomicBool,
) where
    B: PwmBackend,
    C: Clock,
    W: Write,
{
    let tick = Duration::from_millis(state.timing().tick_ms);
    let mut ticks: u64 = 0;
    let mut slow_ticks: u64 = 0;

    tracing::info!(
        "Render loop started: {}x{} canvas, tick {}ms, policy {:?}",
        state.width(),
        state.height(),
        tick.as_millis(),
        renderer.policy()
    );

    while running.load(Ordering::SeqCst) {
        let started = std::time::Instant::now();
        step(state, renderer, backend, control, clock.now_ms());
        ticks += 1;

        let took = started.elapsed();
        if took > tick {
            slow_ticks += 1;
            if slow_ticks <= 5 {
                tracing::warn!(
                    "Tick {} took {}ms (tick: {}ms)",
                    ticks,
                    took.as_millis(),
                    tick.as_millis()
                );
            }
        }

        thread::sleep(tick);
    }

    let parked = renderer.park(backend);
    tracing::info!(
        "Render loop stopped after {} ticks ({} slow), parked {} servos, faults: {:?}",
        ticks,
        slow_ticks,
        parked.writes,
        renderer.faults()
    );
}

// ── Tests ────────────────────────────────────────────────────────────
