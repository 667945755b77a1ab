//! Wood tile display: a grid of servo-tilted wood tiles treated as pixels.
//!
//! Brightness per tile (0-100) becomes a servo angle, then a pulse count on
//! one channel of a PCA9685 PWM chip. The pieces, leaves first:
//! - [`mapper`]: canvas cell to (bank, channel)
//! - [`servo`]: brightness to pulse count
//! - [`animation`]: canvas buffer, wave and invert animations
//! - [`render`]: render driver and the cooperative tick loop
//! - [`control`]: numbered operator menu
//! - [`backend`] / [`pca9685`]: the PWM hardware seam
//!
//! The binary wires these together; see `main.rs`.

pub mod animation;
pub mod backend;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod mapper;
pub mod pca9685;
pub mod render;
pub mod servo;

pub use animation::{AnimationState, Mode, Timing};
pub use config::Config;
pub use error::{Error, Result};
pub use mapper::{DeviceAddress, RasterOrder, Topology};
pub use render::{RenderPolicy, Renderer};
pub use servo::ServoCalibration;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Signal handling ──────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets the returned flag to false.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}
