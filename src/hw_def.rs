//! Opcodes, addresses and timings of the SHT4x family.
//!
//! Values are taken from the Sensirion SHT4x datasheet, section 4.

use crate::types::{HeaterMode, Repeatability};

/// I²C address of the device
///
/// The address is fixed in hardware by the part number: SHT4x-Axxx answers on 0x44, SHT4x-Bxxx
/// on 0x45 and SHT4x-Cxxx on 0x46.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum I2cAddr {
    /// 0x44, SHT4x-Axxx parts
    #[default]
    Addr44,
    /// 0x45, SHT4x-Bxxx parts
    Addr45,
    /// 0x46, SHT4x-Cxxx parts
    Addr46,
}
impl I2cAddr {
    /// Raw 7-bit bus address
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Addr44 => 0x44,
            Self::Addr45 => 0x45,
            Self::Addr46 => 0x46,
        }
    }
}

pub(crate) const CMD_SOFT_RESET: u8 = 0x94;
pub(crate) const CMD_READ_SERIAL_NUMBER: u8 = 0x89;

pub(crate) const CMD_MEASURE_HIGH_REPEATABILITY: u8 = 0xFD;
pub(crate) const CMD_MEASURE_MEDIUM_REPEATABILITY: u8 = 0xF6;
pub(crate) const CMD_MEASURE_LOW_REPEATABILITY: u8 = 0xE0;

// 200 mW
pub(crate) const CMD_HEATER_HIGH_1S: u8 = 0x39;
pub(crate) const CMD_HEATER_HIGH_100MS: u8 = 0x32;
// 110 mW
pub(crate) const CMD_HEATER_MEDIUM_1S: u8 = 0x2F;
pub(crate) const CMD_HEATER_MEDIUM_100MS: u8 = 0x24;
// 20 mW
pub(crate) const CMD_HEATER_LOW_1S: u8 = 0x1E;
pub(crate) const CMD_HEATER_LOW_100MS: u8 = 0x15;

/// Minimum wait after a soft reset or a serial number request
pub(crate) const SHORT_COMMAND_DELAY_MS: u32 = 1;

/// Minimum wait after a high repeatability measurement request
///
/// This is also the floor for the continuous sampling interval.
pub const MEASUREMENT_DELAY_MS: u32 = 10;
pub(crate) const MEASUREMENT_DELAY_MEDIUM_MS: u32 = 5;
pub(crate) const MEASUREMENT_DELAY_LOW_MS: u32 = 2;

pub(crate) const HEATER_SHORT_HOLD_MS: u32 = 110;
pub(crate) const HEATER_LONG_HOLD_MS: u32 = 1100;

/// Bytes in one checksummed word: two data bytes and one CRC byte
pub(crate) const WORD_LEN: usize = 3;
/// Bytes in every non-empty response: two checksummed words
pub(crate) const RESPONSE_LEN: usize = 2 * WORD_LEN;

/// One temperature tick on the 16-bit ADC scale, 175 K / 2^16 rounded to 1/32 K
pub const TEMPERATURE_RESOLUTION_KELVIN: f32 = 1.0 / 32.0;

const TICKS_FULL_SCALE: f32 = 65535.0;

/// A command the driver can issue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Command {
    SoftReset,
    ReadSerialNumber,
    Measure(Repeatability),
    Heater(HeaterMode),
}
impl Command {
    /// Single byte written to the device
    pub(crate) const fn opcode(self) -> u8 {
        match self {
            Self::SoftReset => CMD_SOFT_RESET,
            Self::ReadSerialNumber => CMD_READ_SERIAL_NUMBER,
            Self::Measure(Repeatability::High) => CMD_MEASURE_HIGH_REPEATABILITY,
            Self::Measure(Repeatability::Medium) => CMD_MEASURE_MEDIUM_REPEATABILITY,
            Self::Measure(Repeatability::Low) => CMD_MEASURE_LOW_REPEATABILITY,
            Self::Heater(HeaterMode::Low) => CMD_HEATER_LOW_100MS,
            Self::Heater(HeaterMode::LowLong) => CMD_HEATER_LOW_1S,
            Self::Heater(HeaterMode::Medium) => CMD_HEATER_MEDIUM_100MS,
            Self::Heater(HeaterMode::MediumLong) => CMD_HEATER_MEDIUM_1S,
            Self::Heater(HeaterMode::High) => CMD_HEATER_HIGH_100MS,
            Self::Heater(HeaterMode::HighLong) => CMD_HEATER_HIGH_1S,
        }
    }

    /// Mandatory wait between writing the opcode and reading the response
    pub(crate) const fn settle_ms(self) -> u32 {
        match self {
            Self::SoftReset | Self::ReadSerialNumber => SHORT_COMMAND_DELAY_MS,
            Self::Measure(Repeatability::High) => MEASUREMENT_DELAY_MS,
            Self::Measure(Repeatability::Medium) => MEASUREMENT_DELAY_MEDIUM_MS,
            Self::Measure(Repeatability::Low) => MEASUREMENT_DELAY_LOW_MS,
            Self::Heater(mode) => mode.hold_ms(),
        }
    }

    /// Number of bytes the device answers with
    pub(crate) const fn response_len(self) -> usize {
        match self {
            Self::SoftReset => 0,
            Self::ReadSerialNumber | Self::Measure(_) | Self::Heater(_) => RESPONSE_LEN,
        }
    }
}

/// Convert raw temperature ticks to degrees Celsius
pub(crate) fn raw_temp_to_centigrade(ticks: u16) -> f32 {
    -45.0 + 175.0 * (ticks as f32) / TICKS_FULL_SCALE
}

/// Convert raw humidity ticks to percent relative humidity, clamped to 0..=100
///
/// The raw formula reaches -6 %RH and 119 %RH at the ends of the tick range. The datasheet
/// (section 4.6) recommends cropping those values to the physical range.
pub(crate) fn raw_rel_humid_to_percent(ticks: u16) -> f32 {
    let percent = -6.0 + 125.0 * (ticks as f32) / TICKS_FULL_SCALE;
    percent.clamp(0.0, 100.0)
}
