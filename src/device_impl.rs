use crate::checksum;
use crate::hw_def::*;
use crate::sampling::Sampling;
use crate::types::*;
use crate::{Bus, Error, Sht4x};

use embedded_hal::{delay::DelayNs, i2c::I2c};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lock, ignoring poisoning: bus and sampling state stay consistent across a panicking holder.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<I2C, Delay, E> Bus<I2C, Delay>
where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
{
    pub(crate) fn send(&mut self, cmd: Command) -> Result<(), Error<E>> {
        trace!("sht4x::send(): opcode=0x{:02X}", cmd.opcode());
        self.i2c.write(self.i2c_addr.as_u8(), &[cmd.opcode()]).map_err(Error::I2c)
    }

    pub(crate) fn settle(&mut self, cmd: Command) {
        self.delay.delay_ms(cmd.settle_ms());
    }

    pub(crate) fn receive(&mut self, read_vals: &mut [u16]) -> Result<(), Error<E>> {
        let num_vals = read_vals.len();
        let mut read_buf = [0u8; RESPONSE_LEN];
        let read_buf_slice = read_buf
            .get_mut(..num_vals * WORD_LEN)
            .ok_or(Error::InvalidLength(num_vals * WORD_LEN))?;
        trace!("sht4x::receive(): read_buf_slice.len()={}", read_buf_slice.len());
        self.i2c.read(self.i2c_addr.as_u8(), read_buf_slice).map_err(Error::I2c)?;

        for (ii, (word, val)) in read_buf_slice.chunks(WORD_LEN).zip(read_vals.iter_mut()).enumerate() {
            *val = checksum::verify(word).map_err(|err| {
                warn!("sht4x::receive(): word {}/{}: {} in {:02X?}", ii, num_vals, err, word);
                err
            })?;
        }
        Ok(())
    }

    /// Write `cmd`, wait its settling time, then read and check its response words
    pub(crate) fn cmd_and_read(&mut self, cmd: Command, read_vals: &mut [u16]) -> Result<(), Error<E>> {
        let read_len = read_vals.len() * WORD_LEN;
        if read_len != cmd.response_len() {
            return Err(Error::InvalidLength(read_len));
        }
        self.send(cmd)?;
        self.settle(cmd);
        if !read_vals.is_empty() {
            self.receive(read_vals)?;
        }
        Ok(())
    }

    pub(crate) fn soft_reset(&mut self) -> Result<(), Error<E>> {
        self.cmd_and_read(Command::SoftReset, &mut [0u16; 0])
    }

    pub(crate) fn read_serial_number(&mut self) -> Result<u32, Error<E>> {
        let mut read_buf = [0u16; 2];
        self.cmd_and_read(Command::ReadSerialNumber, &mut read_buf)?;
        Ok(u32::from(read_buf[0]) << 16 | u32::from(read_buf[1]))
    }

    pub(crate) fn measure(&mut self, repeatability: Repeatability) -> Result<Sample, Error<E>> {
        let mut read_buf = [0u16; 2];
        self.cmd_and_read(Command::Measure(repeatability), &mut read_buf)?;
        Ok(Sample::from_ticks(read_buf[0], read_buf[1]))
    }

    /// The heater command ends with a high repeatability measurement of its own
    pub(crate) fn heater(&mut self, mode: HeaterMode) -> Result<Sample, Error<E>> {
        let mut read_buf = [0u16; 2];
        self.cmd_and_read(Command::Heater(mode), &mut read_buf)?;
        Ok(Sample::from_ticks(read_buf[0], read_buf[1]))
    }
}

impl<I2C, Delay, E> Sht4x<I2C, Delay>
where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Open a handle to an SHT4x
    ///
    /// The device is soft reset into a known state, then its serial number is read and cached.
    pub fn open(i2c: I2C, delay: Delay, options: Options) -> Result<Self, Error<E>> {
        let Options { address, name } = options;
        let mut bus = Bus { i2c, delay, i2c_addr: address };
        bus.soft_reset()?;
        let serial = bus.read_serial_number()?;
        debug!("sht4x::open(): {} at 0x{:02X}, serial {}", name, address.as_u8(), serial);
        Ok(Self {
            bus: Arc::new(Mutex::new(bus)),
            sampling: Mutex::new(Sampling::Idle),
            name,
            i2c_addr: address,
            serial,
        })
    }

    /// Take a high repeatability one-shot sample
    ///
    /// Fails with [`Error::AlreadySensing`] rather than waiting while continuous sampling runs.
    pub fn sense(&self) -> Result<Sample, Error<E>> {
        self.sense_with(Repeatability::High)
    }

    /// Take a one-shot sample at the given repeatability
    pub fn sense_with(&self, repeatability: Repeatability) -> Result<Sample, Error<E>> {
        let mut sampling = lock(&self.sampling);
        if sampling.is_running() {
            return Err(Error::AlreadySensing);
        }
        lock(&self.bus).measure(repeatability)
    }

    /// Pulse the heater and return the sample taken at the end of the pulse
    ///
    /// Accepts a [`HeaterMode`] or its raw index; an unknown index fails with
    /// [`Error::InvalidHeaterMode`] before anything is sent. Blocks for the pulse length (0.11 s
    /// or 1.1 s) with the bus held, interleaving with continuous sampling if it runs.
    ///
    /// The heater is rated for at most a 10% duty cycle over the life of the sensor; tracking
    /// that, and cooling down between pulses, is up to the caller.
    pub fn activate_heater<M>(&self, mode: M) -> Result<Sample, Error<E>>
    where
        M: TryInto<HeaterMode>,
    {
        let mode = mode.try_into().map_err(|_| Error::InvalidHeaterMode)?;
        debug!("sht4x::activate_heater(): {:?}", mode);
        lock(&self.bus).heater(mode)
    }

    /// Soft reset the device
    pub fn reset(&self) -> Result<(), Error<E>> {
        let mut sampling = lock(&self.sampling);
        if sampling.is_running() {
            return Err(Error::AlreadySensing);
        }
        lock(&self.bus).soft_reset()
    }
}

impl<I2C, Delay> Sht4x<I2C, Delay> {
    /// Serial number read when the handle was opened
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus address
    pub fn address(&self) -> I2cAddr {
        self.i2c_addr
    }

    /// Temperature resolution of one ADC step
    pub fn precision(&self) -> Temperature {
        Temperature::from_kelvin(TEMPERATURE_RESOLUTION_KELVIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::compute;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
    use float_cmp::approx_eq;

    const ADDR: u8 = 0x44;
    const SERIAL: u32 = 0x1234_5678;

    fn response(first: u16, second: u16) -> Vec<u8> {
        let [a, b] = first.to_be_bytes();
        let [c, d] = second.to_be_bytes();
        vec![a, b, compute(&[a, b]), c, d, compute(&[c, d])]
    }

    fn open_expectations() -> Vec<Transaction> {
        vec![
            Transaction::write(ADDR, vec![0x94]),
            Transaction::write(ADDR, vec![0x89]),
            Transaction::read(ADDR, response((SERIAL >> 16) as u16, SERIAL as u16)),
        ]
    }

    fn ticks(celsius: f32, percent: f32) -> (u16, u16) {
        (
            ((celsius + 45.0) / 175.0 * 65535.0) as u16,
            ((percent + 6.0) / 125.0 * 65535.0) as u16,
        )
    }

    #[test]
    fn open_resets_then_reads_serial() {
        let mut i2c = I2cMock::new(&open_expectations());
        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        assert_eq!(sht4x.serial(), SERIAL);
        assert_eq!(sht4x.name(), "sht4x");
        assert_eq!(sht4x.address(), I2cAddr::Addr44);
        assert_eq!(sht4x.to_string(), "sht4x{305419896}");
        i2c.done();
    }

    #[test]
    fn serial_uses_data_bytes_only() {
        // [A, B, crc, C, D, crc]
        let raw = vec![0xDE, 0xAD, compute(&[0xDE, 0xAD]), 0xBE, 0xEF, 0x92];
        let expectations = [
            Transaction::write(0x45, vec![0x94]),
            Transaction::write(0x45, vec![0x89]),
            Transaction::read(0x45, raw),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let options = Options::default().address(I2cAddr::Addr45).name("attic");
        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), options).unwrap();
        assert_eq!(sht4x.serial(), 0xDEAD_BEEF);
        assert_eq!(sht4x.to_string(), format!("attic{{{}}}", 0xDEAD_BEEFu32));
        i2c.done();
    }

    #[test]
    fn open_fails_on_reset_error() {
        let expectations = [Transaction::write(ADDR, vec![0x94]).with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&expectations);
        let res = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default());
        assert!(matches!(res, Err(Error::I2c(ErrorKind::Other))));
        i2c.done();
    }

    #[test]
    fn open_fails_on_corrupt_serial() {
        let mut raw = response(0x1234, 0x5678);
        raw[5] ^= 0x01;
        let expectations = [
            Transaction::write(ADDR, vec![0x94]),
            Transaction::write(ADDR, vec![0x89]),
            Transaction::read(ADDR, raw),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let res = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default());
        assert!(matches!(res, Err(Error::CrcMismatch)));
        i2c.done();
    }

    #[test]
    fn sense_converts_ticks() {
        let (t, rh) = ticks(23.8, 65.2);
        let mut expectations = open_expectations();
        expectations.push(Transaction::write(ADDR, vec![0xFD]));
        expectations.push(Transaction::read(ADDR, response(t, rh)));
        let mut i2c = I2cMock::new(&expectations);

        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        let sample = sht4x.sense().unwrap();
        assert!(approx_eq!(f32, sample.temperature.celsius(), 23.8, epsilon = 0.01));
        assert!(approx_eq!(f32, sample.humidity.percent(), 65.2, epsilon = 0.01));
        i2c.done();
    }

    #[test]
    fn sense_with_lower_repeatability() {
        let mut expectations = open_expectations();
        expectations.push(Transaction::write(ADDR, vec![0xF6]));
        expectations.push(Transaction::read(ADDR, response(0x6666, 0x8000)));
        expectations.push(Transaction::write(ADDR, vec![0xE0]));
        expectations.push(Transaction::read(ADDR, response(0x6666, 0x8000)));
        let mut i2c = I2cMock::new(&expectations);

        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        let medium = sht4x.sense_with(Repeatability::Medium).unwrap();
        let low = sht4x.sense_with(Repeatability::Low).unwrap();
        assert_eq!(medium, low);
        assert!(approx_eq!(f32, low.temperature.celsius(), 25.0, epsilon = 0.01));
        i2c.done();
    }

    #[test]
    fn sense_rejects_corrupt_humidity() {
        let mut raw = response(0x6666, 0x8000);
        raw[4] ^= 0x80;
        let mut expectations = open_expectations();
        expectations.push(Transaction::write(ADDR, vec![0xFD]));
        expectations.push(Transaction::read(ADDR, raw));
        let mut i2c = I2cMock::new(&expectations);

        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        assert!(matches!(sht4x.sense(), Err(Error::CrcMismatch)));
        i2c.done();
    }

    #[test]
    fn sense_propagates_bus_error() {
        let mut expectations = open_expectations();
        expectations.push(Transaction::write(ADDR, vec![0xFD]));
        expectations.push(Transaction::read(ADDR, vec![0; 6]).with_error(ErrorKind::Bus));
        let mut i2c = I2cMock::new(&expectations);

        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        assert!(matches!(sht4x.sense(), Err(Error::I2c(ErrorKind::Bus))));
        i2c.done();
    }

    #[test]
    fn heater_pulse_then_read() {
        let (t, rh) = ticks(61.0, 12.5);
        let mut expectations = open_expectations();
        expectations.push(Transaction::write(ADDR, vec![0x39]));
        expectations.push(Transaction::read(ADDR, response(t, rh)));
        expectations.push(Transaction::write(ADDR, vec![0x1E]));
        expectations.push(Transaction::read(ADDR, response(t, rh)));
        let mut i2c = I2cMock::new(&expectations);

        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        let sample = sht4x.activate_heater(HeaterMode::HighLong).unwrap();
        assert!(approx_eq!(f32, sample.temperature.celsius(), 61.0, epsilon = 0.01));
        assert!(approx_eq!(f32, sample.humidity.percent(), 12.5, epsilon = 0.01));
        // raw index 1 is LowLong
        sht4x.activate_heater(1u8).unwrap();
        i2c.done();
    }

    #[test]
    fn invalid_heater_mode_touches_nothing() {
        let mut i2c = I2cMock::new(&open_expectations());
        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        assert!(matches!(sht4x.activate_heater(6u8), Err(Error::InvalidHeaterMode)));
        assert!(matches!(sht4x.activate_heater(u8::MAX), Err(Error::InvalidHeaterMode)));
        i2c.done();
    }

    #[test]
    fn reset_writes_opcode_only() {
        let mut expectations = open_expectations();
        expectations.push(Transaction::write(ADDR, vec![0x94]));
        let mut i2c = I2cMock::new(&expectations);
        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        sht4x.reset().unwrap();
        i2c.done();
    }

    #[test]
    fn response_size_must_match_command() {
        let mut i2c = I2cMock::new(&[]);
        let mut bus = Bus { i2c: i2c.clone(), delay: NoopDelay::new(), i2c_addr: I2cAddr::Addr44 };
        assert!(matches!(
            bus.cmd_and_read(Command::SoftReset, &mut [0u16; 2]),
            Err(Error::InvalidLength(6))
        ));
        assert!(matches!(
            bus.cmd_and_read(Command::ReadSerialNumber, &mut [0u16; 1]),
            Err(Error::InvalidLength(3))
        ));
        i2c.done();
    }

    #[test]
    fn precision_is_one_32nd_kelvin() {
        let mut i2c = I2cMock::new(&open_expectations());
        let sht4x = Sht4x::open(i2c.clone(), NoopDelay::new(), Options::default()).unwrap();
        assert_eq!(sht4x.precision().kelvin(), 0.03125);
        i2c.done();
    }
}
