use std::path::Path;
use std::time::Duration;

use adcsio_transport::{DownloadConfig, I2cConfig, TransportConfig};
use serde::Deserialize;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};

/// Timeout overrides loaded from `--profile`.
///
/// Every field is optional; anything missing keeps the library default.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub bus_timeout_ms: Option<u64>,
    pub tx_timeout_ms: Option<u64>,
    pub byte_timeout_ms: Option<u64>,
    pub max_command_len: Option<usize>,
    pub download_byte_timeout_ms: Option<u64>,
    pub download_enter_timeout_ms: Option<u64>,
    pub i2c_address: Option<u8>,
    pub poll_interval_ms: Option<u64>,
    pub max_poll_interval_ms: Option<u64>,
    pub poll_timeout_ms: Option<u64>,
}

fn ms(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

impl Profile {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        serde_json::from_str(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("invalid profile {}: {err}", path.display()),
            )
        })
    }

    pub fn transport(&self) -> TransportConfig {
        let base = TransportConfig::default();
        TransportConfig {
            bus_timeout: ms(self.bus_timeout_ms, base.bus_timeout),
            tx_timeout: ms(self.tx_timeout_ms, base.tx_timeout),
            byte_timeout: ms(self.byte_timeout_ms, base.byte_timeout),
            max_command_len: self.max_command_len.unwrap_or(base.max_command_len),
        }
    }

    pub fn download(&self) -> DownloadConfig {
        let base = DownloadConfig::default();
        DownloadConfig {
            byte_timeout: ms(self.download_byte_timeout_ms, base.byte_timeout),
            enter_timeout: ms(self.download_enter_timeout_ms, base.enter_timeout),
            ..base
        }
    }

    pub fn i2c(&self) -> I2cConfig {
        let base = I2cConfig::default();
        I2cConfig {
            address: self.i2c_address.unwrap_or(base.address),
            poll_interval: ms(self.poll_interval_ms, base.poll_interval),
            max_poll_interval: ms(self.max_poll_interval_ms, base.max_poll_interval),
            poll_timeout: ms(self.poll_timeout_ms, base.poll_timeout),
        }
    }
}
