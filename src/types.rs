use crate::hw_def::*;

use core::fmt;
use std::time::Duration;

const ZERO_CELSIUS_KELVIN: f32 = 273.15;

/// Temperature, stored in kelvin
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Temperature {
    kelvin: f32,
}
impl Temperature {
    /// Temperature from kelvin
    pub const fn from_kelvin(kelvin: f32) -> Self {
        Self { kelvin }
    }
    /// Temperature from degrees Celsius
    pub fn from_celsius(celsius: f32) -> Self {
        Self { kelvin: celsius + ZERO_CELSIUS_KELVIN }
    }
    /// Temperature from degrees Fahrenheit
    pub fn from_fahrenheit(fahrenheit: f32) -> Self {
        Self::from_celsius((fahrenheit - 32.0) * 5.0 / 9.0)
    }
    /// Convert raw ticks from the device
    pub fn from_ticks(ticks: u16) -> Self {
        Self::from_celsius(raw_temp_to_centigrade(ticks))
    }
    /// Get temperature in kelvin
    pub fn kelvin(&self) -> f32 {
        self.kelvin
    }
    /// Get temperature in Celsius
    pub fn celsius(&self) -> f32 {
        self.kelvin - ZERO_CELSIUS_KELVIN
    }
    /// Get temperature in Fahrenheit
    pub fn fahrenheit(&self) -> f32 {
        self.celsius() * 9.0 / 5.0 + 32.0
    }
}
impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°C", self.celsius())
    }
}

/// Relative humidity, in percent
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct RelativeHumidity {
    percent: f32,
}
impl RelativeHumidity {
    /// Relative humidity from a percentage
    pub const fn from_percent(percent: f32) -> Self {
        Self { percent }
    }
    /// Convert raw ticks from the device, cropped to 0..=100 %
    pub fn from_ticks(ticks: u16) -> Self {
        Self { percent: raw_rel_humid_to_percent(ticks) }
    }
    /// Get relative humidity in percent
    pub fn percent(&self) -> f32 {
        self.percent
    }
    /// Get relative humidity as a fraction of saturation
    pub fn fraction(&self) -> f32 {
        self.percent / 100.0
    }
}
impl fmt::Display for RelativeHumidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%rH", self.percent)
    }
}

/// Convert raw temperature ticks to a temperature
pub fn ticks_to_temperature(ticks: u16) -> Temperature {
    Temperature::from_ticks(ticks)
}

/// Convert raw humidity ticks to a relative humidity, cropped to 0..=100 %
pub fn ticks_to_humidity(ticks: u16) -> RelativeHumidity {
    RelativeHumidity::from_ticks(ticks)
}

/// One temperature and relative humidity measurement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// measured temperature
    pub temperature: Temperature,
    /// measured relative humidity
    pub humidity: RelativeHumidity,
}
impl Sample {
    /// Convert a raw tick pair from the device
    pub fn from_ticks(temperature: u16, humidity: u16) -> Self {
        Self {
            temperature: Temperature::from_ticks(temperature),
            humidity: RelativeHumidity::from_ticks(humidity),
        }
    }
}
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.temperature, self.humidity)
    }
}

/// Measurement repeatability
///
/// Higher repeatability takes longer and draws more current.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Repeatability {
    /// 0.04 °C / 0.08 %RH, up to 8.3 ms
    #[default]
    High,
    /// 0.07 °C / 0.15 %RH, up to 4.5 ms
    Medium,
    /// 0.1 °C / 0.25 %RH, up to 1.6 ms
    Low,
}

/// Heater power and pulse length
///
/// The heater switches itself off at the end of the pulse, then the device takes a high
/// repeatability measurement. It is not meant for more than a 10% duty cycle over the life of the
/// sensor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum HeaterMode {
    /// 20 mW for 0.1 s
    Low = 0,
    /// 20 mW for 1 s
    LowLong = 1,
    /// 110 mW for 0.1 s
    Medium = 2,
    /// 110 mW for 1 s
    MediumLong = 3,
    /// 200 mW for 0.1 s
    High = 4,
    /// 200 mW for 1 s
    HighLong = 5,
}
impl HeaterMode {
    /// All modes, in raw index order
    pub const ALL: [HeaterMode; 6] = [
        Self::Low,
        Self::LowLong,
        Self::Medium,
        Self::MediumLong,
        Self::High,
        Self::HighLong,
    ];

    /// Whether this is a 1 s pulse
    pub const fn is_long(self) -> bool {
        matches!(self, Self::LowLong | Self::MediumLong | Self::HighLong)
    }

    /// Nominal heater power in milliwatts at 3.3 V
    pub const fn power_mw(self) -> u16 {
        match self {
            Self::Low | Self::LowLong => 20,
            Self::Medium | Self::MediumLong => 110,
            Self::High | Self::HighLong => 200,
        }
    }

    /// Time to wait for the pulse and the trailing measurement, in milliseconds
    pub const fn hold_ms(self) -> u32 {
        if self.is_long() { HEATER_LONG_HOLD_MS } else { HEATER_SHORT_HOLD_MS }
    }

    /// Time to wait for the pulse and the trailing measurement
    pub const fn hold(self) -> Duration {
        Duration::from_millis(self.hold_ms() as u64)
    }
}

/// A raw heater mode index outside 0..=5
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidHeaterMode(pub u8);
impl fmt::Display for InvalidHeaterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid heater mode {}", self.0)
    }
}
impl std::error::Error for InvalidHeaterMode {}

impl TryFrom<u8> for HeaterMode {
    type Error = InvalidHeaterMode;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(raw as usize).copied().ok_or(InvalidHeaterMode(raw))
    }
}
impl From<HeaterMode> for u8 {
    fn from(mode: HeaterMode) -> Self {
        mode as u8
    }
}

/// Construction options for [`Sht4x`](crate::Sht4x)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Options {
    /// bus address of the device
    pub address: I2cAddr,
    /// name used when displaying the device
    pub name: String,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            address: I2cAddr::default(),
            name: "sht4x".into(),
        }
    }
}
impl Options {
    /// Set the bus address
    pub fn address(mut self, address: I2cAddr) -> Self {
        self.address = address;
        self
    }
    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn temperature_units() {
        let t = Temperature::from_celsius(25.0);
        assert!(approx_eq!(f32, t.kelvin(), 298.15, epsilon = 0.001));
        assert!(approx_eq!(f32, t.fahrenheit(), 77.0, epsilon = 0.001));
        let t = Temperature::from_fahrenheit(-40.0);
        assert!(approx_eq!(f32, t.celsius(), -40.0, epsilon = 0.001));
    }

    #[test]
    fn ticks_at_scale_ends() {
        assert!(approx_eq!(f32, ticks_to_temperature(0).celsius(), -45.0, epsilon = 0.001));
        assert!(approx_eq!(f32, ticks_to_temperature(65535).celsius(), 130.0, epsilon = 0.001));
        assert_eq!(ticks_to_humidity(0).percent(), 0.0);
        assert_eq!(ticks_to_humidity(65535).percent(), 100.0);
    }

    #[test]
    fn humidity_always_in_range() {
        for ticks in (0..=u16::MAX).step_by(97) {
            let rh = ticks_to_humidity(ticks).percent();
            assert!((0.0..=100.0).contains(&rh), "ticks {ticks} gave {rh}");
        }
    }

    #[test]
    fn heater_mode_index_round_trip() {
        for raw in 0u8..6 {
            let mode = HeaterMode::try_from(raw).unwrap();
            assert_eq!(u8::from(mode), raw);
        }
        assert_eq!(HeaterMode::try_from(6), Err(InvalidHeaterMode(6)));
        assert_eq!(HeaterMode::try_from(255), Err(InvalidHeaterMode(255)));
    }

    #[test]
    fn heater_mode_table_matches_discriminants() {
        for (index, mode) in HeaterMode::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(u8::from(mode)), index);
        }
    }

    #[test]
    fn heater_hold_times() {
        assert_eq!(HeaterMode::High.hold(), Duration::from_millis(110));
        assert_eq!(HeaterMode::LowLong.hold(), Duration::from_millis(1100));
        assert_eq!(HeaterMode::MediumLong.power_mw(), 110);
    }

    #[test]
    fn display() {
        let sample = Sample {
            temperature: Temperature::from_celsius(21.5),
            humidity: RelativeHumidity::from_percent(40.25),
        };
        assert_eq!(sample.to_string(), "21.50°C 40.25%rH");
    }

    #[test]
    fn options_builder() {
        let opts = Options::default();
        assert_eq!(opts.address.as_u8(), 0x44);
        assert_eq!(opts.name, "sht4x");
        let opts = Options::default().address(I2cAddr::Addr45).name("attic");
        assert_eq!(opts.address.as_u8(), 0x45);
        assert_eq!(opts.name, "attic");
    }
}
