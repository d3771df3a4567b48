//! UART and I2C transport layer for a CubeSat ADCS.
//!
//! adcsio moves telecommands, telemetry requests and file-download bursts
//! between flight software and an attitude determination and control
//! subsystem over one shared UART, with a polled I2C path alongside it.
//!
//! # Crate Structure
//!
//! - [`link`]: receive queue, transmit signal and peripheral traits
//! - [`frame`]: byte stuffing, reply readers and the download reassembler
//! - [`transport`]: bus-serialized request/response engine and I2C client

/// Re-export link types.
pub mod link {
    pub use adcsio_link::*;
}

/// Re-export frame types.
pub mod frame {
    pub use adcsio_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use adcsio_transport::*;
}
