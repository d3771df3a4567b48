use std::time::Duration;

use crate::error::Result;

/// Transmit half of a UART.
///
/// `send` only starts the transfer. Completion arrives asynchronously through
/// [`LinkNotifier::on_tx_complete`](crate::LinkNotifier::on_tx_complete), the same
/// way the peripheral's transmit interrupt would report it.
pub trait SerialPort: Send {
    /// Start transmitting `frame`.
    fn send(&mut self, frame: &[u8]) -> Result<()>;
}

impl<T: SerialPort + ?Sized> SerialPort for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }
}

/// Blocking I2C master.
///
/// # Invariants
///
/// - One owner per bus instance
/// - Addresses are 7-bit (`0x00..=0x7F`)
pub trait I2cBus {
    /// START - ADDR(W) - DATA - STOP
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()>;

    /// Select `register` then read `buf.len()` bytes with a repeated START.
    fn write_read(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<()>;
}

impl<T: I2cBus + ?Sized> I2cBus for &mut T {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        (**self).write(address, bytes)
    }

    fn write_read(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<()> {
        (**self).write_read(address, register, buf)
    }
}

/// Consumer side of a byte stream fed from interrupt context.
pub trait ByteSource {
    /// Pop the oldest byte, suspending for at most `timeout`.
    ///
    /// Returns `None` when nothing arrived in time.
    fn pop(&self, timeout: Duration) -> Option<u8>;

    /// Discard everything currently queued. Returns the number of bytes dropped.
    fn drain(&self) -> usize;
}
