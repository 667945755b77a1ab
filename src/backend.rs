//! PWM backend seam between the render pipeline and the servo driver chips.
//!
//! The renderer only ever talks to [`PwmBackend`]. On a Pi the backend is a
//! row of PCA9685 chips on one I2C bus (see [`crate::pca9685`]); everywhere
//! else, and with `--dry-run`, it is [`DryRunBackend`], which only logs.

use crate::error::{Error, Result};
use crate::servo::ServoCalibration;

// ── Backend trait ────────────────────────────────────────────────────

/// A set of PWM banks addressed by index.
pub trait PwmBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset a bank to its power-on state.
    fn init(&mut self, bank: usize) -> Result<(), Self::Error>;

    /// Tell the bank what its oscillator really runs at, for frequency maths.
    fn set_oscillator_frequency(&mut self, bank: usize, hz: u32) -> Result<(), Self::Error>;

    fn set_pwm_frequency(&mut self, bank: usize, hz: f32) -> Result<(), Self::Error>;

    /// Set one channel's pulse: high at count `on`, low at count `off`, out of 4096.
    fn set_pwm(&mut self, bank: usize, channel: u8, on: u16, off: u16)
    -> Result<(), Self::Error>;
}

// ── Bank bring-up ────────────────────────────────────────────────────

/// Bring up every bank with the servo frequency.
pub fn initialize_banks<B: PwmBackend>(
    backend: &mut B,
    bank_count: usize,
    calibration: &ServoCalibration,
) -> Result<()> {
    for bank in 0..bank_count {
        let wrap = |source: B::Error| Error::Backend {
            bank,
            source: Box::new(source),
        };

        backend.init(bank).map_err(wrap)?;
        backend
            .set_oscillator_frequency(bank, calibration.oscillator_hz)
            .map_err(wrap)?;
        backend
            .set_pwm_frequency(bank, calibration.frequency_hz)
            .map_err(wrap)?;

        tracing::info!(
            "Bank {} ready at {} Hz (oscillator {} Hz)",
            bank,
            calibration.frequency_hz,
            calibration.oscillator_hz
        );
    }
    Ok(())
}

// ── Dry-run backend ──────────────────────────────────────────────────

/// Backend that logs each call instead of touching hardware.
#[derive(Debug, Default)]
pub struct DryRunBackend {
    writes: u64,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_pwm` calls seen so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl PwmBackend for DryRunBackend {
    type Error = std::convert::Infallible;

    fn init(&mut self, bank: usize) -> Result<(), Self::Error> {
        tracing::debug!(bank, "dry-run init");
        Ok(())
    }

    fn set_oscillator_frequency(&mut self, bank: usize, hz: u32) -> Result<(), Self::Error> {
        tracing::debug!(bank, hz, "dry-run oscillator frequency");
        Ok(())
    }

    fn set_pwm_frequency(&mut self, bank: usize, hz: f32) -> Result<(), Self::Error> {
        tracing::debug!(bank, hz, "dry-run PWM frequency");
        Ok(())
    }

    fn set_pwm(
        &mut self,
        bank: usize,
        channel: u8,
        on: u16,
        off: u16,
    ) -> Result<(), Self::Error> {
        self.writes += 1;
        tracing::trace!(bank, channel, on, off, "dry-run set_pwm");
        Ok(())
    }
}

// ── Test doubles ─────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    //! Recording backend shared by the renderer and loop tests.

    use super::PwmBackend;

    #[derive(Debug, thiserror::Error)]
    #[error("bank {0} did not acknowledge")]
    pub struct Nack(pub usize);

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Init(usize),
        Oscillator(usize, u32),
        Frequency(usize, f32),
        Pwm {
            bank: usize,
            channel: u8,
            on: u16,
            off: u16,
        },
    }

    /// Records every call; writes to banks in `failing_banks` return an error.
    #[derive(Debug, Default)]
    pub struct RecordingBackend {
        pub calls: Vec<Call>,
        pub failing_banks: Vec<usize>,
    }

    impl RecordingBackend {
        pub fn pwm_writes(&self) -> Vec<(usize, u8, u16)> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Pwm {
                        bank, channel, off, ..
                    } => Some((*bank, *channel, *off)),
                    _ => None,
                })
                .collect()
        }

        fn check(&self, bank: usize) -> Result<(), Nack> {
            if self.failing_banks.contains(&bank) {
                Err(Nack(bank))
            } else {
                Ok(())
            }
        }
    }

    impl PwmBackend for RecordingBackend {
        type Error = Nack;

        fn init(&mut self, bank: usize) -> Result<(), Nack> {
            self.check(bank)?;
            self.calls.push(Call::Init(bank));
            Ok(())
        }

        fn set_oscillator_frequency(&mut self, bank: usize, hz: u32) -> Result<(), Nack> {
            self.check(bank)?;
            self.calls.push(Call::Oscillator(bank, hz));
            Ok(())
        }

        fn set_pwm_frequency(&mut self, bank: usize, hz: f32) -> Result<(), Nack> {
            self.check(bank)?;
            self.calls.push(Call::Frequency(bank, hz));
            Ok(())
        }

        fn set_pwm(&mut self, bank: usize, channel: u8, on: u16, off: u16) -> Result<(), Nack> {
            self.check(bank)?;
            self.calls.push(Call::Pwm {
                bank,
                channel,
                on,
                off,
            });
            Ok(())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingBackend};
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Bring-up tests ─────────────────────────────────────────────

    #[test]
    fn initialize_banks_configures_each_bank_in_order() {
        let mut backend = RecordingBackend::default();
        let cal = ServoCalibration::default();
        initialize_banks(&mut backend, 2, &cal).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Init(0),
                Call::Oscillator(0, 27_000_000),
                Call::Frequency(0, 60.0),
                Call::Init(1),
                Call::Oscillator(1, 27_000_000),
                Call::Frequency(1, 60.0),
            ]
        );
    }

    #[test]
    fn initialize_banks_reports_failing_bank() {
        let mut backend = RecordingBackend {
            failing_banks: vec![1],
            ..RecordingBackend::default()
        };
        let err = initialize_banks(&mut backend, 3, &ServoCalibration::default()).unwrap_err();
        assert!(matches!(err, Error::Backend { bank: 1, .. }));
    }

    // ── Dry-run tests ──────────────────────────────────────────────

    #[test]
    fn dry_run_counts_writes() {
        let mut backend = DryRunBackend::new();
        backend.set_pwm(0, 3, 0, 225).unwrap();
        backend.set_pwm(2, 15, 0, 300).unwrap();
        assert_eq!(backend.writes(), 2);
    }
}
