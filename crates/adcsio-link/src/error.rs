/// Errors raised by the physical link primitives.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The serial peripheral refused to start a transmit.
    #[error("serial send failed: {0}")]
    Send(String),

    /// An I2C transaction was not acknowledged or the bus faulted.
    #[error("i2c transaction with 0x{address:02X} failed: {reason}")]
    I2c { address: u8, reason: String },
}

pub type Result<T> = std::result::Result<T, LinkError>;
