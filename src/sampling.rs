//! Continuous sampling on a background thread.

use crate::device_impl::lock;
use crate::hw_def::{Command, MEASUREMENT_DELAY_MS};
use crate::types::{Repeatability, Sample};
use crate::{Bus, Error, Sht4x};

use core::fmt;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select, tick};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Continuous sampling state of one handle
#[derive(Debug, Default)]
pub(crate) enum Sampling {
    #[default]
    Idle,
    /// Dropping `cancel` disconnects the worker's end, which is its signal to exit.
    Running { cancel: Sender<()>, worker: JoinHandle<()> },
}
impl Sampling {
    /// Whether a worker is live; a worker that already exited is reaped.
    pub(crate) fn is_running(&mut self) -> bool {
        let exited = matches!(self, Sampling::Running { worker, .. } if worker.is_finished());
        if exited {
            self.stop();
        }
        matches!(self, Sampling::Running { .. })
    }

    /// Cancel the worker, if any, and wait for it to exit.
    pub(crate) fn stop(&mut self) {
        if let Sampling::Running { cancel, worker } = mem::take(self) {
            drop(cancel);
            if worker.join().is_err() {
                warn!("sht4x: sampling thread panicked");
            }
            debug!("sht4x: sampling stopped");
        }
    }
}

/// Samples from [`Sht4x::sense_continuous`]
///
/// Iterating blocks until the next sample arrives. The iterator ends when sampling is halted,
/// restarted or fails; after a failure [`Samples::error`] returns the error that ended it.
/// Dropping the stream stops the worker before its next delivery.
#[derive(Debug)]
pub struct Samples<E> {
    samples: Receiver<Sample>,
    failure: Receiver<Error<E>>,
}
impl<E> Samples<E> {
    /// Wait for the next sample; `None` once the stream has ended
    pub fn recv(&self) -> Option<Sample> {
        self.samples.recv().ok()
    }

    /// Wait at most `timeout` for the next sample
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Sample, RecvTimeoutError> {
        self.samples.recv_timeout(timeout)
    }

    /// The underlying channel, for use in `select!`
    pub fn receiver(&self) -> &Receiver<Sample> {
        &self.samples
    }

    /// The measurement error that ended the stream, if it ended because of one
    ///
    /// Can be taken once.
    pub fn error(&self) -> Option<Error<E>> {
        self.failure.try_recv().ok()
    }
}
impl<E> Iterator for Samples<E> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        self.recv()
    }
}

impl<I2C, Delay, E> Sht4x<I2C, Delay>
where
    I2C: I2c<Error = E> + Send + 'static,
    Delay: DelayNs + Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    /// Sample continuously every `interval` on a background thread
    ///
    /// The first sample is taken right away. `interval` is raised to the measurement time if it
    /// is shorter. Samples are handed over one at a time: a consumer that falls behind delays
    /// the next measurement rather than queueing samples.
    ///
    /// A run already in progress is stopped first and its stream ends. Nothing is sent to the
    /// device to stop it. While running, one-shot samples fail with [`Error::AlreadySensing`].
    /// Call [`Sht4x::halt`] when done.
    ///
    /// A failed measurement ends the stream; it is not retried.
    pub fn sense_continuous(&self, interval: Duration) -> Result<Samples<E>, Error<E>> {
        let mut sampling = lock(&self.sampling);
        sampling.stop();

        let interval = interval.max(Duration::from_millis(MEASUREMENT_DELAY_MS.into()));
        let (sample_tx, samples) = bounded(0);
        let (failure_tx, failure) = bounded(1);
        let (cancel, cancelled) = bounded(0);
        let bus = Arc::clone(&self.bus);
        let worker = thread::Builder::new()
            .name(format!("{}-sampling", self.name.replace('\0', "")))
            .spawn(move || run(&bus, interval, &sample_tx, &failure_tx, &cancelled))
            .map_err(Error::Spawn)?;
        debug!("sht4x: {} sampling every {:?}", self.name, interval);

        *sampling = Sampling::Running { cancel, worker };
        Ok(Samples { samples, failure })
    }
}

impl<I2C, Delay, E> Sht4x<I2C, Delay>
where
    I2C: I2c<Error = E>,
{
    /// Stop continuous sampling and wait for the background thread to exit
    ///
    /// Does nothing when not sampling.
    pub fn halt(&self) -> Result<(), Error<E>> {
        lock(&self.sampling).stop();
        Ok(())
    }
}

impl<I2C, Delay> Drop for Sht4x<I2C, Delay> {
    fn drop(&mut self) {
        self.sampling.get_mut().unwrap_or_else(PoisonError::into_inner).stop();
    }
}

fn cancelled_now(cancelled: &Receiver<()>) -> bool {
    matches!(cancelled.try_recv(), Err(TryRecvError::Disconnected))
}

/// One measurement with the bus held, or `None` when cancelled mid-measurement
fn measure<I2C, Delay, E>(
    bus: &Mutex<Bus<I2C, Delay>>,
    cancelled: &Receiver<()>,
) -> Result<Option<Sample>, Error<E>>
where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
{
    let cmd = Command::Measure(Repeatability::High);
    let mut bus = lock(bus);
    bus.send(cmd)?;
    // The device NACKs until its measurement completes, so the bus is held for the full
    // settling time even when cancelled.
    bus.settle(cmd);
    if cancelled_now(cancelled) {
        return Ok(None);
    }
    let mut read_buf = [0u16; 2];
    bus.receive(&mut read_buf)?;
    Ok(Some(Sample::from_ticks(read_buf[0], read_buf[1])))
}

fn run<I2C, Delay, E>(
    bus: &Mutex<Bus<I2C, Delay>>,
    interval: Duration,
    sample_tx: &Sender<Sample>,
    failure_tx: &Sender<Error<E>>,
    cancelled: &Receiver<()>,
) where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
    E: fmt::Debug,
{
    let ticker = tick(interval);
    loop {
        let sample = match measure(bus, cancelled) {
            Ok(Some(sample)) => sample,
            Ok(None) => return,
            Err(err) => {
                warn!("sht4x: continuous sampling failed: {:?}", err);
                // Only ever one failure, and the channel holds one.
                let _ = failure_tx.try_send(err);
                return;
            }
        };
        trace!("sht4x: sampled {}", sample);

        let delivered = select! {
            send(sample_tx, sample) -> sent => sent.is_ok(),
            recv(cancelled) -> _ => false,
        };
        if !delivered {
            return;
        }

        let tick_due = select! {
            recv(cancelled) -> _ => false,
            recv(ticker) -> _ => true,
        };
        if !tick_due {
            return;
        }
    }
}
