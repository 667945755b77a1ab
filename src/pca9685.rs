//! PCA9685 16-channel PWM chips sharing one I2C bus.
//!
//! Register-level driver written against `embedded-hal` 1.0, so it runs over
//! `linux-embedded-hal`'s `I2cdev` on a Pi and over a fake bus in tests.

use crate::backend::PwmBackend;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

// ── Registers ────────────────────────────────────────────────────────

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;

const MODE1_RESTART: u8 = 0x80;
const MODE1_AUTO_INCREMENT: u8 = 0x20;
const MODE1_SLEEP: u8 = 0x10;

const PRESCALE_MIN: f32 = 3.0;
const PRESCALE_MAX: f32 = 255.0;

pub const CHANNELS: u8 = 16;

/// Nominal internal oscillator; real chips drift between ~23 and ~27 MHz.
pub const DEFAULT_OSCILLATOR_HZ: u32 = 25_000_000;

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum Pca9685Error<E: std::fmt::Debug> {
    #[error("I2C transfer to 0x{address:02x} failed: {error:?}")]
    I2c { address: u8, error: E },

    #[error("no PCA9685 configured as bank {0}")]
    UnknownBank(usize),

    #[error("channel {0} does not exist (PCA9685 has 16)")]
    InvalidChannel(u8),

    #[error("PWM frequency {0} Hz is not usable")]
    InvalidFrequency(f32),
}

// ── Banks ────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Bank {
    address: u8,
    oscillator_hz: u32,
}

/// Every PCA9685 on one bus, indexed by bank number.
pub struct Pca9685Banks<I2C, D> {
    i2c: I2C,
    delay: D,
    banks: Vec<Bank>,
}

// ── Frequency maths ──────────────────────────────────────────────────

/// Prescale register value for a target PWM frequency.
pub fn prescale_for(oscillator_hz: u32, frequency_hz: f32) -> u8 {
    let ideal = (oscillator_hz as f32 / (frequency_hz * 4096.0) + 0.5).floor() - 1.0;
    ideal.clamp(PRESCALE_MIN, PRESCALE_MAX) as u8
}

// ── Bus access ───────────────────────────────────────────────────────

impl<I2C, D> Pca9685Banks<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, addresses: &[u8]) -> Self {
        let banks = addresses
            .iter()
            .map(|&address| Bank {
                address,
                oscillator_hz: DEFAULT_OSCILLATOR_HZ,
            })
            .collect();
        Self { i2c, delay, banks }
    }

    /// Give the bus back, e.g. to hand it to another driver.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn bank(&self, bank: usize) -> Result<&Bank, Pca9685Error<I2C::Error>> {
        self.banks.get(bank).ok_or(Pca9685Error::UnknownBank(bank))
    }

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Pca9685Error<I2C::Error>> {
        self.i2c
            .write(address, bytes)
            .map_err(|error| Pca9685Error::I2c { address, error })
    }

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Pca9685Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(address, &[register], &mut buf)
            .map_err(|error| Pca9685Error::I2c { address, error })?;
        Ok(buf[0])
    }
}

// ── PwmBackend impl ──────────────────────────────────────────────────

impl<I2C, D> PwmBackend for Pca9685Banks<I2C, D>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
    D: DelayNs,
{
    type Error = Pca9685Error<I2C::Error>;

    fn init(&mut self, bank: usize) -> Result<(), Self::Error> {
        let address = self.bank(bank)?.address;
        self.write(address, &[MODE1, MODE1_RESTART])?;
        self.delay.delay_ms(10);
        tracing::debug!("PCA9685 0x{:02x} reset", address);
        Ok(())
    }

    fn set_oscillator_frequency(&mut self, bank: usize, hz: u32) -> Result<(), Self::Error> {
        let entry = self
            .banks
            .get_mut(bank)
            .ok_or(Pca9685Error::UnknownBank(bank))?;
        entry.oscillator_hz = hz;
        Ok(())
    }

    fn set_pwm_frequency(&mut self, bank: usize, hz: f32) -> Result<(), Self::Error> {
        if !(hz.is_finite() && hz > 0.0) {
            return Err(Pca9685Error::InvalidFrequency(hz));
        }
        let Bank {
            address,
            oscillator_hz,
        } = *self.bank(bank)?;
        let prescale = prescale_for(oscillator_hz, hz);

        // The prescaler can only be written while the oscillator sleeps.
        let old_mode = self.read_register(address, MODE1)?;
        let sleep_mode = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write(address, &[MODE1, sleep_mode])?;
        self.write(address, &[PRESCALE, prescale])?;
        self.write(address, &[MODE1, old_mode])?;
        self.delay.delay_ms(5);
        self.write(
            address,
            &[MODE1, old_mode | MODE1_RESTART | MODE1_AUTO_INCREMENT],
        )?;

        tracing::debug!(
            "PCA9685 0x{:02x} prescale {} for {} Hz",
            address,
            prescale,
            hz
        );
        Ok(())
    }

    fn set_pwm(&mut self, bank: usize, channel: u8, on: u16, off: u16) -> Result<(), Self::Error> {
        if channel >= CHANNELS {
            return Err(Pca9685Error::InvalidChannel(channel));
        }
        let address = self.bank(bank)?.address;
        let [on_l, on_h] = on.to_le_bytes();
        let [off_l, off_h] = off.to_le_bytes();
        self.write(
            address,
            &[LED0_ON_L + 4 * channel, on_l, on_h, off_l, off_h],
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────────
