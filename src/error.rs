//! Error type shared across the crate.
//!
//! Only start-up can fail for real (bad config, bus not available, a bank
//! that does not answer). Once the tick loop is running, every problem is
//! clamped, counted, or skipped instead of being returned.

use std::path::PathBuf;

// ── Error type ───────────────────────────────────────────────────────

/// Boxed error coming out of a PWM backend implementation.
pub type BackendSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("canvas cell (row {row}, col {col}) is outside the {width}x{height} canvas")]
    OutOfRange {
        row: usize,
        col: usize,
        width: usize,
        height: usize,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid servo calibration: {0}")]
    InvalidServo(String),

    #[error("failed to read configuration file '{}'", .path.display())]
    ReadingConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ParsingConfig(#[from] toml::de::Error),

    #[error("PWM bank {bank} failed")]
    Backend {
        bank: usize,
        #[source]
        source: BackendSource,
    },

    #[error("'{0}' is not a valid menu option")]
    InvalidCommand(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
