//! This is a platform-agnostic Rust driver for the Sensirion SHT40, SHT41, SHT43 and SHT45
//! humidity and temperature sensors using the [`embedded-hal`] traits.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal
//!
//! This driver allows you to:
//! - Take one-shot samples at high, medium or low repeatability.
//! - Sample continuously from a background thread, with samples delivered over a channel.
//! - Pulse the heater at any of the six power/duration settings and read the trailing sample.
//! - Trigger a software reset.
//! - Read the device serial number.
//! - Run a heater decontamination cycle.
//!
//! The device handle can be shared between threads. All bus traffic of one handle is
//! serialized, and a one-shot sample is refused while continuous sampling is running.
//!
//! ## Features
//!
//! - `log`: Enables logging using the `log` framework (default).
//!
//! ## Supported devices: SHT40, SHT41, SHT43, SHT45
//!
//! The SHT4x is a digital humidity and temperature sensor with an I²C interface. Every reading
//! is two 16-bit words, each followed by a CRC-8 byte. A built-in heater can be pulsed at three
//! power levels for 0.1 s or 1 s to drive off condensation or creep-inducing contaminants.
//!
//! Datasheet:
//!   [SHT4x](https://sensirion.com/media/documents/33FD6951/67EB9032/HT_DS_Datasheet_SHT4x_5.pdf)
//!
//! To use this driver, import this crate and an `embedded_hal` implementation, then open the
//! device.
//!
//! ## Example:
//!
//! ```no_run
//! use std::time::Duration;
//! use sht4x::{HeaterMode, Options, Sht4x};
//!
//! # fn demo<I2C, D>(i2c: I2C, delay: D) -> Result<(), sht4x::Error<I2C::Error>>
//! # where
//! #     I2C: embedded_hal::i2c::I2c + Send + 'static,
//! #     I2C::Error: Send + 'static,
//! #     D: embedded_hal::delay::DelayNs + Send + 'static,
//! # {
//! // Platform-specific `i2c` and `delay`, e.g. from linux-embedded-hal
//! let sht4x = Sht4x::open(i2c, delay, Options::default())?;
//! println!("{sht4x}");
//!
//! // Read and display a one-shot sample
//! let sample = sht4x.sense()?;
//! println!("{:0.1} °C, {:0.1} %RH", sample.temperature.celsius(), sample.humidity.percent());
//!
//! // Dry off the sensor surface
//! let after = sht4x.activate_heater(HeaterMode::HighLong)?;
//! println!("after heating: {after}");
//!
//! // Sample every second until ten samples have arrived
//! let samples = sht4x.sense_continuous(Duration::from_secs(1))?;
//! for sample in samples.take(10) {
//!     println!("{sample}");
//! }
//! sht4x.halt()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

cfg_if::cfg_if! {
    if #[cfg(feature = "log")] {
        macro_rules! trace {
            ($($arg:tt)*) => { log::trace!($($arg)*) };
        }
        macro_rules! debug {
            ($($arg:tt)*) => { log::debug!($($arg)*) };
        }
        macro_rules! info {
            ($($arg:tt)*) => { log::info!($($arg)*) };
        }
        macro_rules! warn {
            ($($arg:tt)*) => { log::warn!($($arg)*) };
        }
    } else {
        macro_rules! trace {
            ($($arg:tt)*) => {{ if false { let _ = format_args!($($arg)*); } }};
        }
        macro_rules! debug {
            ($($arg:tt)*) => {{ if false { let _ = format_args!($($arg)*); } }};
        }
        macro_rules! info {
            ($($arg:tt)*) => {{ if false { let _ = format_args!($($arg)*); } }};
        }
        macro_rules! warn {
            ($($arg:tt)*) => {{ if false { let _ = format_args!($($arg)*); } }};
        }
    }
}

pub mod checksum;
pub mod decontaminate;
mod device_impl;
mod hw_def;
mod sampling;
mod types;

pub use crate::{
    checksum::ChecksumError,
    hw_def::{I2cAddr, MEASUREMENT_DELAY_MS, TEMPERATURE_RESOLUTION_KELVIN},
    sampling::Samples,
    types::*,
};

use core::fmt;
use std::sync::{Arc, Mutex};

use crate::sampling::Sampling;

/// SHT4x device driver
///
/// Bus access goes through an internal lock, so every method takes `&self` and the handle can be
/// shared between threads.
#[derive(Debug)]
pub struct Sht4x<I2C, Delay> {
    pub(crate) bus: Arc<Mutex<Bus<I2C, Delay>>>,
    pub(crate) sampling: Mutex<Sampling>,
    pub(crate) name: String,
    pub(crate) i2c_addr: I2cAddr,
    pub(crate) serial: u32,
}

/// Bus and timer of one device; everything behind the lock
#[derive(Debug)]
pub(crate) struct Bus<I2C, Delay> {
    pub(crate) i2c: I2C,
    pub(crate) delay: Delay,
    pub(crate) i2c_addr: I2cAddr,
}

/// All possible errors in this crate
#[derive(Debug)]
pub enum Error<E> {
    /// I²C communication error
    I2c(E),
    /// Failure of a checksum from the device was detected
    CrcMismatch,
    /// A response word was assembled with the wrong number of bytes
    InvalidLength(usize),
    /// Heater mode outside the six defined settings
    InvalidHeaterMode,
    /// One-shot sample requested while continuous sampling owns the bus
    AlreadySensing,
    /// The continuous sampling thread could not be started
    Spawn(std::io::Error),
}
impl<E> From<ChecksumError> for Error<E> {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::Mismatch { .. } => Error::CrcMismatch,
            ChecksumError::InvalidLength(len) => Error::InvalidLength(len),
        }
    }
}
impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "i2c error: {e:?}"),
            Error::CrcMismatch => write!(f, "invalid checksum"),
            Error::InvalidLength(len) => write!(f, "invalid data length {len}"),
            Error::InvalidHeaterMode => write!(f, "invalid heater mode"),
            Error::AlreadySensing => write!(f, "already sensing continuously"),
            Error::Spawn(e) => write!(f, "failed to start sampling thread: {e}"),
        }
    }
}
impl<E: fmt::Debug> std::error::Error for Error<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl<I2C, Delay> fmt::Display for Sht4x<I2C, Delay> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.name, self.serial)
    }
}
