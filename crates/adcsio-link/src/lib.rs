//! Physical link seams for the ADCS transport.
//!
//! Everything below the framing layer lives here:
//! - [`SerialPort`] and [`I2cBus`], the hardware primitives the flight computer provides
//! - [`ByteQueue`], the bounded interrupt-fed receive queue
//! - [`TxSignal`], the single-slot transmit-complete signal
//! - [`Link`] and [`LinkNotifier`], which tie the two together for one UART

pub mod error;
pub mod ingress;
pub mod traits;

pub use error::{LinkError, Result};
pub use ingress::{ByteQueue, Link, LinkNotifier, TxSignal, DEFAULT_QUEUE_CAPACITY};
pub use traits::{ByteSource, I2cBus, SerialPort};
