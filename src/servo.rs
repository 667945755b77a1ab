//! Brightness to servo pulse translation.
//!
//! Brightness is percent tile deflection. It goes through a servo angle
//! before landing on a PCA9685 pulse count, using the same truncating integer
//! interpolation as Arduino's `map()` so the tiles sit where they always did.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────

/// Full mechanical travel of a hobby servo, in degrees.
pub const SERVO_TRAVEL_DEGREES: i64 = 180;

/// PCA9685 counts per PWM period (12 bit).
pub const PWM_RESOLUTION: u16 = 4096;

/// Brightness range accepted by the translator.
pub const BRIGHTNESS_MIN: f32 = 0.0;
pub const BRIGHTNESS_MAX: f32 = 100.0;

// ── Calibration ──────────────────────────────────────────────────────

/// Servo calibration shared by every tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServoCalibration {
    /// Angle for brightness 0, in degrees.
    pub min_angle: i64,
    /// Angle for brightness 100, in degrees.
    pub max_angle: i64,
    /// Angle the tiles are parked at on shutdown.
    pub rest_angle: i64,
    /// Pulse count at 0 degrees, out of 4096.
    pub pulse_min: u16,
    /// Pulse count at 180 degrees, out of 4096.
    pub pulse_max: u16,
    /// PWM update frequency. Analog servos run at ~60 Hz; try 50 if they jitter.
    pub frequency_hz: f32,
    /// PCA9685 internal oscillator, trimmed per chip (nominally 25 MHz).
    pub oscillator_hz: u32,
}

impl Default for ServoCalibration {
    /// A narrow 0..60 degree window keeps the tile linkage from binding.
    fn default() -> Self {
        Self {
            min_angle: 0,
            max_angle: 60,
            rest_angle: 30,
            pulse_min: 150,
            pulse_max: 600,
            frequency_hz: 60.0,
            oscillator_hz: 27_000_000,
        }
    }
}

// ── Translation ──────────────────────────────────────────────────────

/// Result of translating one brightness value, including which clamps fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    pub pulse: u16,
    pub angle: i64,
    pub brightness_clamped: bool,
    pub angle_clamped: bool,
}

/// Arduino-style `map()`: integer interpolation that truncates toward zero.
fn map_range(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

impl ServoCalibration {
    pub fn validate(&self) -> Result<()> {
        if !(0..=SERVO_TRAVEL_DEGREES).contains(&self.min_angle)
            || !(0..=SERVO_TRAVEL_DEGREES).contains(&self.max_angle)
        {
            return Err(Error::InvalidServo(format!(
                "angle window {}..{} leaves 0..{SERVO_TRAVEL_DEGREES}",
                self.min_angle, self.max_angle
            )));
        }
        if self.min_angle > self.max_angle {
            return Err(Error::InvalidServo(format!(
                "min_angle {} is above max_angle {}",
                self.min_angle, self.max_angle
            )));
        }
        if !(self.min_angle..=self.max_angle).contains(&self.rest_angle) {
            return Err(Error::InvalidServo(format!(
                "rest_angle {} is outside {}..{}",
                self.rest_angle, self.min_angle, self.max_angle
            )));
        }
        if self.pulse_min > self.pulse_max || self.pulse_max >= PWM_RESOLUTION {
            return Err(Error::InvalidServo(format!(
                "pulse range {}..{} must be ordered and below {PWM_RESOLUTION}",
                self.pulse_min, self.pulse_max
            )));
        }
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(Error::InvalidServo(format!(
                "frequency {} Hz is not usable",
                self.frequency_hz
            )));
        }
        if self.oscillator_hz == 0 {
            return Err(Error::InvalidServo("oscillator frequency is zero".into()));
        }
        Ok(())
    }

    /// Translate brightness into a pulse count, reporting any clamping.
    pub fn translate(&self, brightness: f32) -> Translation {
        let in_range = (BRIGHTNESS_MIN..=BRIGHTNESS_MAX).contains(&brightness);
        // NaN fails the range check and lands on the dark end.
        let clamped = if in_range {
            brightness
        } else if brightness > BRIGHTNESS_MAX {
            BRIGHTNESS_MAX
        } else {
            BRIGHTNESS_MIN
        };

        let angle = map_range(
            clamped as i64,
            BRIGHTNESS_MIN as i64,
            BRIGHTNESS_MAX as i64,
            self.min_angle,
            self.max_angle,
        );
        let bounded = angle.clamp(0, SERVO_TRAVEL_DEGREES);

        Translation {
            pulse: self.angle_to_pulse(bounded),
            angle: bounded,
            brightness_clamped: !in_range,
            angle_clamped: bounded != angle,
        }
    }

    pub fn brightness_to_pulse(&self, brightness: f32) -> u16 {
        self.translate(brightness).pulse
    }

    /// Pulse count for an angle already within `0..=180`.
    fn angle_to_pulse(&self, angle: i64) -> u16 {
        let pulse = map_range(
            angle,
            0,
            SERVO_TRAVEL_DEGREES,
            i64::from(self.pulse_min),
            i64::from(self.pulse_max),
        );
        pulse.clamp(i64::from(self.pulse_min), i64::from(self.pulse_max)) as u16
    }

    /// Pulse count that parks a tile at its rest angle.
    pub fn rest_pulse(&self) -> u16 {
        self.angle_to_pulse(self.rest_angle.clamp(0, SERVO_TRAVEL_DEGREES))
    }

    /// Width of a pulse in microseconds at the configured frequency.
    /// Only approximate: the real period depends on the oscillator trim.
    pub fn ticks_to_micros(&self, ticks: u16) -> f32 {
        let micros_per_tick = 1_000_000.0 / self.frequency_hz / f32::from(PWM_RESOLUTION);
        f32::from(ticks) * micros_per_tick
    }
}

// ── Tests ────────────────────────────────────────────────────────────
