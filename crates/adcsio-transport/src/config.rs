use std::time::Duration;

use adcsio_frame::PacketLayout;

/// Default 7-bit I2C address of the ADCS.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x57;

/// Timeouts and limits for UART request/response exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// How long to wait for the bus ownership token.
    pub bus_timeout: Duration,
    /// How long to wait for the transmit-complete signal.
    pub tx_timeout: Duration,
    /// How long to wait for each reply byte.
    pub byte_timeout: Duration,
    /// Largest thin telecommand (ID included) accepted for framing.
    pub max_command_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bus_timeout: Duration::from_millis(100),
            tx_timeout: Duration::from_millis(100),
            byte_timeout: Duration::from_millis(100),
            max_command_len: 250,
        }
    }
}

/// Settings for a file-download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Packet shape used by the reassembler.
    pub layout: PacketLayout,
    /// Per-byte wait while a burst is streaming.
    pub byte_timeout: Duration,
    /// How long entering download mode may wait for the bus.
    pub enter_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            layout: PacketLayout::default(),
            byte_timeout: Duration::from_millis(200),
            enter_timeout: Duration::from_secs(1),
        }
    }
}

/// Polling behaviour of the I2C client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    /// 7-bit device address.
    pub address: u8,
    /// First delay between acknowledgment polls; doubles after each miss.
    pub poll_interval: Duration,
    /// Ceiling for the poll delay.
    pub max_poll_interval: Duration,
    /// Total time allowed for the processed flag to appear.
    pub poll_timeout: Duration,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            poll_interval: Duration::from_millis(5),
            max_poll_interval: Duration::from_millis(50),
            poll_timeout: Duration::from_secs(1),
        }
    }
}
