//! Bus-serialized transport to a CubeSat ADCS.
//!
//! Two paths reach the device:
//! - [`AdcsTransport`] over UART, with escape-stuffed frames and a bus
//!   ownership token held for every request/response exchange
//! - [`I2cPollClient`] over I2C, which polls the last-telecommand acknowledgment
//!
//! A UART file download holds the token for the whole burst through a
//! [`FileDownloadSession`]. The [`sim`] module provides in-process stand-ins
//! for both devices.

mod bus;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod i2c;
pub mod sim;

pub use bus::BusStats;
pub use config::{DownloadConfig, I2cConfig, TransportConfig, DEFAULT_I2C_ADDRESS};
pub use download::FileDownloadSession;
pub use engine::AdcsTransport;
pub use error::{AdcsError, Result, TransportFailure};
pub use i2c::{I2cPollClient, TC_ACK_LEN};
