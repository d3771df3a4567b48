use std::time::Duration;

/// Errors that can occur while building or collecting ADCS frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No byte arrived on the receive queue within the per-byte timeout.
    #[error("no byte within {timeout:?} after {received} bytes received")]
    ByteTimeout { received: usize, timeout: Duration },

    /// A frame or payload did not have the length the protocol requires.
    #[error("{what}: {actual} bytes (limit {expected})")]
    IncorrectLength {
        what: &'static str,
        actual: usize,
        expected: usize,
    },

    /// The reply did not have the expected header or trailer.
    #[error("malformed reply: {0}")]
    MalformedReply(&'static str),

    /// A framing buffer could not be reserved.
    #[error("could not allocate a {size}-byte frame buffer")]
    AllocationFailed { size: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
