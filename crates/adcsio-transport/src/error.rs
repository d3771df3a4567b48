use std::time::Duration;

use adcsio_frame::FrameError;
use adcsio_link::LinkError;

/// Timeout on one of the transport's suspension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    /// The transmit-complete signal was not given in time.
    #[error("transmit not completed within {0:?}")]
    TxTimeout(Duration),

    /// A reply byte did not arrive in time.
    #[error("no reply byte within {timeout:?} after {received} bytes")]
    RxTimeout { received: usize, timeout: Duration },
}

/// Errors surfaced by ADCS transport operations.
///
/// Nothing here is retried internally. Every variant leaves the bus token
/// released and the receive queue empty.
#[derive(Debug, thiserror::Error)]
pub enum AdcsError {
    /// The bus ownership token was not acquired in time. Safe to retry.
    #[error("bus busy: ownership token not acquired within {0:?}")]
    BusBusy(Duration),

    /// A framing buffer could not be reserved.
    #[error("could not allocate a {size}-byte frame buffer")]
    AllocationFailed { size: usize },

    /// A transmit or receive timed out.
    #[error("transport failed: {0}")]
    TransportFailed(TransportFailure),

    /// A frame overran its bound or carried the wrong amount of data.
    #[error("incorrect length: {what}: {actual} bytes (limit {expected})")]
    IncorrectLength {
        what: &'static str,
        actual: usize,
        expected: usize,
    },

    /// The command is empty or exceeds the configured maximum.
    #[error("invalid command: {len} bytes (allowed 1..={max})")]
    InvalidCommand { len: usize, max: usize },

    /// The reply did not have the expected layout.
    #[error("malformed reply: {0}")]
    MalformedReply(&'static str),

    /// The I2C processed flag never appeared.
    #[error("telecommand not processed after {polls} polls in {waited:?}")]
    AckTimeout { polls: u32, waited: Duration },

    /// The underlying peripheral reported an error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl AdcsError {
    /// True for timeouts and peripheral faults on the link itself.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::TransportFailed(_) | Self::Link(_))
    }
}

impl From<FrameError> for AdcsError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ByteTimeout { received, timeout } => {
                Self::TransportFailed(TransportFailure::RxTimeout { received, timeout })
            }
            FrameError::IncorrectLength {
                what,
                actual,
                expected,
            } => Self::IncorrectLength {
                what,
                actual,
                expected,
            },
            FrameError::MalformedReply(reason) => Self::MalformedReply(reason),
            FrameError::AllocationFailed { size } => Self::AllocationFailed { size },
        }
    }
}

pub type Result<T> = std::result::Result<T, AdcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_timeout_maps_to_transport_failure() {
        let err: AdcsError = FrameError::ByteTimeout {
            received: 2,
            timeout: Duration::from_millis(5),
        }
        .into();
        assert!(err.is_transport_failure());
        assert!(matches!(
            err,
            AdcsError::TransportFailed(TransportFailure::RxTimeout { received: 2, .. })
        ));
    }

    #[test]
    fn length_errors_keep_context() {
        let err: AdcsError = FrameError::IncorrectLength {
            what: "download frame without end marker",
            actual: 49,
            expected: 49,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "incorrect length: download frame without end marker: 49 bytes (limit 49)"
        );
    }
}
