use std::fmt;
use std::io;

use adcsio_transport::{AdcsError, TransportFailure};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const BUSY: i32 = 75;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => USAGE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn adcs_error(context: &str, err: AdcsError) -> CliError {
    let code = match &err {
        AdcsError::BusBusy(_) => BUSY,
        AdcsError::TransportFailed(TransportFailure::TxTimeout(_))
        | AdcsError::TransportFailed(TransportFailure::RxTimeout { .. })
        | AdcsError::AckTimeout { .. } => TIMEOUT,
        AdcsError::IncorrectLength { .. } | AdcsError::MalformedReply(_) => DATA_INVALID,
        AdcsError::InvalidCommand { .. } => USAGE,
        AdcsError::Link(_) => TRANSPORT_ERROR,
        AdcsError::AllocationFailed { .. } => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn maps_taxonomy_to_exit_codes() {
        let busy = adcs_error("x", AdcsError::BusBusy(Duration::from_millis(1)));
        assert_eq!(busy.code, BUSY);

        let rx = adcs_error(
            "x",
            AdcsError::TransportFailed(TransportFailure::RxTimeout {
                received: 0,
                timeout: Duration::from_millis(1),
            }),
        );
        assert_eq!(rx.code, TIMEOUT);

        let length = adcs_error(
            "download",
            AdcsError::IncorrectLength {
                what: "download frame without end marker",
                actual: 49,
                expected: 49,
            },
        );
        assert_eq!(length.code, DATA_INVALID);
        assert!(length.message.starts_with("download: incorrect length"));
    }
}
