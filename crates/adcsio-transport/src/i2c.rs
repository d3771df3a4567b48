use std::thread;
use std::time::{Duration, Instant};

use adcsio_frame::{TcStatus, LAST_TC_ACK};
use adcsio_link::I2cBus;
use tracing::{debug, trace, warn};

use crate::config::I2cConfig;
use crate::error::{AdcsError, Result};

/// Size of the last-telecommand acknowledgment telemetry.
pub const TC_ACK_LEN: usize = 4;
const PROCESSED_FLAG: u8 = 0x01;
/// Largest telecommand written in one I2C transfer.
pub const MAX_I2C_COMMAND_LEN: usize = 255;

/// Poll delay that doubles on every step until it reaches `max`.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    fn step(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

/// ADCS client for the I2C path.
///
/// The I2C peripheral already frames every transfer, so nothing here is
/// stuffed. Completion of a telecommand is learned by polling the
/// last-telecommand acknowledgment rather than from a reply frame.
#[derive(Debug)]
pub struct I2cPollClient<B> {
    bus: B,
    config: I2cConfig,
}

impl<B: I2cBus> I2cPollClient<B> {
    pub fn new(bus: B, config: I2cConfig) -> Self {
        Self { bus, config }
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Write a raw telecommand (ID followed by parameters).
    pub fn send_command(&mut self, command: &[u8]) -> Result<()> {
        if command.is_empty() || command.len() > MAX_I2C_COMMAND_LEN {
            return Err(AdcsError::InvalidCommand {
                len: command.len(),
                max: MAX_I2C_COMMAND_LEN,
            });
        }
        self.bus.write(self.config.address, command)?;
        debug!(id = command[0], len = command.len(), "i2c telecommand written");
        Ok(())
    }

    /// Read telemetry `id` into `buf`, filling it completely.
    pub fn request_telemetry(&mut self, id: u8, buf: &mut [u8]) -> Result<()> {
        self.bus.write_read(self.config.address, id, buf)?;
        trace!(id, len = buf.len(), "i2c telemetry read");
        Ok(())
    }

    /// Poll until the last telecommand is processed, then return its error flag.
    ///
    /// The poll delay starts at `poll_interval` and doubles up to
    /// `max_poll_interval`. Once the processed flag is seen the acknowledgment
    /// is read one more time and its error byte returned as the status.
    pub fn await_processed_and_check(&mut self) -> Result<TcStatus> {
        let started = Instant::now();
        let mut backoff = Backoff::new(self.config.poll_interval, self.config.max_poll_interval);
        let mut polls = 0u32;
        let mut ack = [0u8; TC_ACK_LEN];

        loop {
            self.request_telemetry(LAST_TC_ACK, &mut ack)?;
            polls += 1;
            if ack[1] & PROCESSED_FLAG != 0 {
                break;
            }
            let waited = started.elapsed();
            if waited >= self.config.poll_timeout {
                warn!(polls, ?waited, "telecommand never reported processed");
                return Err(AdcsError::AckTimeout { polls, waited });
            }
            thread::sleep(backoff.step().min(self.config.poll_timeout - waited));
        }

        self.request_telemetry(LAST_TC_ACK, &mut ack)?;
        let status = TcStatus(ack[2]);
        debug!(id = ack[0], polls, %status, "telecommand processed");
        Ok(status)
    }

    /// Write `command` and wait for the device to report it processed.
    pub fn send_command_await_ack(&mut self, command: &[u8]) -> Result<TcStatus> {
        self.send_command(command)?;
        self.await_processed_and_check()
    }

    pub fn get_ref(&self) -> &B {
        &self.bus
    }

    pub fn get_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}
