//! CRC-8 over the two data bytes of every word the device sends.
//!
//! Polynomial 0x31 (x^8 + x^5 + x^4 + 1), initial value 0xFF, no reflection, no final XOR.
//! This is the catalogued CRC-8/NRSC-5.

use core::fmt;

use crc::{CRC_8_NRSC_5, Crc};

use crate::hw_def::WORD_LEN;

const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// Failure to validate a checksummed word
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChecksumError {
    /// The CRC byte does not match the data bytes
    Mismatch {
        /// CRC computed over the data bytes
        expected: u8,
        /// CRC byte received from the device
        received: u8,
    },
    /// The block was not exactly one word (two data bytes and a CRC byte) long
    InvalidLength(usize),
}
impl fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected, received } => {
                write!(f, "checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")
            }
            Self::InvalidLength(len) => write!(f, "invalid word length {len}, expected {WORD_LEN}"),
        }
    }
}
impl std::error::Error for ChecksumError {}

/// Compute the CRC byte the device would send after `data`
pub fn compute(data: &[u8; 2]) -> u8 {
    CRC.checksum(data)
}

/// Check one word (two data bytes followed by their CRC) and return the big-endian data
pub fn verify(block: &[u8]) -> Result<u16, ChecksumError> {
    let &[msb, lsb, received] = block else {
        return Err(ChecksumError::InvalidLength(block.len()));
    };
    let expected = compute(&[msb, lsb]);
    if received != expected {
        return Err(ChecksumError::Mismatch { expected, received });
    }
    Ok(u16::from_be_bytes([msb, lsb]))
}
