//! Heater decontamination.
//!
//! Repeated long heater pulses drive off volatile contaminants that cause humidity creep. See
//! Sensirion's application note "Heater Decontamination SHT4xX". The sensor can reach 110 °C or
//! more during a run: keep it clear of anything that can burn.

use crate::types::{HeaterMode, Sample, Temperature};
use crate::{Error, Sht4x};

use core::fmt;
use embedded_hal::{delay::DelayNs, i2c::I2c};
use std::time::Duration;

/// Settings for a decontamination run
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decontamination {
    /// cumulative heater-on time to reach
    pub target: Duration,
    /// heater setting for every pulse
    pub mode: HeaterMode,
    /// temperature above which heating pauses
    pub ceiling: Temperature,
    /// pause before re-checking an over-temperature sensor
    pub cooldown: Duration,
}
impl Default for Decontamination {
    fn default() -> Self {
        Self {
            target: Duration::from_secs(60),
            mode: HeaterMode::HighLong,
            ceiling: Temperature::from_celsius(110.0),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Outcome of a completed run
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Report {
    /// heater pulses issued
    pub activations: u32,
    /// cumulative heater-on time
    pub heated: Duration,
    /// hottest reading seen
    pub peak: Temperature,
    /// last reading taken
    pub last: Sample,
}

/// Errors of a decontamination run
#[derive(Debug)]
pub enum DecontaminationError<E> {
    /// the device failed
    Device(Error<E>),
    /// a heater pulse left the sensor colder than before the run
    NoTemperatureRise {
        /// reading before the first pulse
        baseline: Temperature,
        /// reading after the offending pulse
        observed: Temperature,
    },
}
impl<E> From<Error<E>> for DecontaminationError<E> {
    fn from(err: Error<E>) -> Self {
        Self::Device(err)
    }
}
impl<E: fmt::Debug> fmt::Display for DecontaminationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(err) => write!(f, "heater activation failed: {err}"),
            Self::NoTemperatureRise { baseline, observed } => {
                write!(f, "temperature did not increase after activating heater: {observed} < {baseline}")
            }
        }
    }
}
impl<E: fmt::Debug + 'static> std::error::Error for DecontaminationError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Device(err) => Some(err),
            Self::NoTemperatureRise { .. } => None,
        }
    }
}

impl Decontamination {
    /// Pulse the heater until `target` heater-on time is reached
    ///
    /// `pause` times the cooldowns. The run stops at the first error.
    pub fn run<I2C, Delay, E, P>(
        &self,
        device: &Sht4x<I2C, Delay>,
        pause: &mut P,
    ) -> Result<Report, DecontaminationError<E>>
    where
        I2C: I2c<Error = E>,
        Delay: DelayNs,
        P: DelayNs,
    {
        let baseline = device.sense()?.temperature;
        info!("{}: beginning heat cycle of {:?} from {}", device, self.target, baseline);

        let mut activations = 0u32;
        let mut heated = Duration::ZERO;
        let mut peak = baseline;
        let mut last = None;
        while heated < self.target {
            let mut sample = device.activate_heater(self.mode)?;
            activations += 1;
            heated += self.mode.hold();
            if sample.temperature > peak {
                peak = sample.temperature;
            }
            if sample.temperature < baseline {
                return Err(DecontaminationError::NoTemperatureRise {
                    baseline,
                    observed: sample.temperature,
                });
            }
            while sample.temperature > self.ceiling {
                warn!(
                    "{}: temperature {} is above {}, pausing {:?} to cool down",
                    device, sample.temperature, self.ceiling, self.cooldown
                );
                pause.delay_ms(u32::try_from(self.cooldown.as_millis()).unwrap_or(u32::MAX));
                sample = device.sense()?;
            }
            trace!("{}: {} pulses, {:?} heated, {}", device, activations, heated, sample);
            last = Some(sample);
        }

        let last = match last {
            Some(sample) => sample,
            None => device.sense()?,
        };
        info!("{}: heat cycle completed after {:?} ({} pulses)", device, heated, activations);
        Ok(Report { activations, heated, peak, last })
    }
}
