use adcsio_frame::{encode_command_frame, encode_telemetry_request, FrameReader, Reassembler, TcStatus};
use adcsio_link::{Link, SerialPort};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bus::{BusStats, BusToken};
use crate::config::{DownloadConfig, TransportConfig};
use crate::download::FileDownloadSession;
use crate::error::{AdcsError, Result, TransportFailure};

/// UART transport to the ADCS.
///
/// One value owns everything a link needs: the serial port, the receive queue
/// and transmit signal (through [`Link`]), and the bus ownership token. Every
/// request/response exchange holds the token from transmit until the reply is
/// collected, so frames from two callers never interleave on the wire.
pub struct AdcsTransport<P> {
    port: Mutex<P>,
    link: Link,
    bus: BusToken,
    config: TransportConfig,
}

impl<P: SerialPort> AdcsTransport<P> {
    /// Create a transport with default configuration.
    pub fn new(port: P, link: Link) -> Self {
        Self::with_config(port, link, TransportConfig::default())
    }

    /// Create a transport with explicit configuration.
    pub fn with_config(port: P, link: Link, config: TransportConfig) -> Self {
        Self {
            port: Mutex::new(port),
            link,
            bus: BusToken::default(),
            config,
        }
    }

    /// Send a telecommand and wait for its acknowledgment.
    ///
    /// `command` is the thin telecommand: ID byte followed by parameters.
    /// The returned status is the device's verbatim result for the command.
    pub fn send_command_await_reply(&self, command: &[u8]) -> Result<TcStatus> {
        let _bus = self
            .bus
            .acquire(self.link.queue(), self.config.bus_timeout, "telecommand")?;
        let frame = self.command_frame(command)?;
        self.transmit(&frame)?;

        let reply = FrameReader::new(self.link.queue(), self.config.byte_timeout).read_tc_reply()?;
        if reply.id != command[0] {
            warn!(
                sent = command[0],
                acknowledged = reply.id,
                "acknowledgment for a different telecommand"
            );
        }
        debug!(id = command[0], status = %reply.status, "telecommand acknowledged");
        Ok(reply.status)
    }

    /// Send a telecommand that has no acknowledgment frame.
    ///
    /// The bus is held only for the transmit. Inside a download session use
    /// [`FileDownloadSession::send_command_no_reply`] instead, since the session
    /// already owns the bus.
    pub fn send_command_no_reply(&self, command: &[u8]) -> Result<()> {
        let _bus = self
            .bus
            .acquire(self.link.queue(), self.config.bus_timeout, "telecommand-no-reply")?;
        self.transmit_command(command)
    }

    /// Request telemetry frame `id` and return its `expected_len` data bytes.
    pub fn request_telemetry(&self, id: u8, expected_len: usize) -> Result<Bytes> {
        let _bus = self
            .bus
            .acquire(self.link.queue(), self.config.bus_timeout, "telemetry")?;
        let request = encode_telemetry_request(id);
        self.transmit(&request)?;

        let data = FrameReader::new(self.link.queue(), self.config.byte_timeout)
            .read_telemetry_reply(id, expected_len)?;
        debug!(id, len = data.len(), "telemetry received");
        Ok(data)
    }

    /// Take the bus for a whole download burst.
    ///
    /// The bus stays held until the returned session is exited or dropped.
    pub fn enter_file_download_mode(&self, config: DownloadConfig) -> Result<FileDownloadSession<'_, P>> {
        let bus = self
            .bus
            .acquire(self.link.queue(), config.enter_timeout, "file-download")?;
        debug!(session_type = config.layout.session_type, "entered file download mode");
        Ok(FileDownloadSession::new(
            self,
            bus,
            Reassembler::new(config.layout),
            config,
        ))
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Token hand-over counters.
    pub fn bus_stats(&self) -> BusStats {
        self.bus.stats()
    }

    /// Consume the transport and return the serial port.
    pub fn into_port(self) -> P {
        self.port.into_inner()
    }

    pub(crate) fn transmit_command(&self, command: &[u8]) -> Result<()> {
        let frame = self.command_frame(command)?;
        self.transmit(&frame)
    }

    fn command_frame(&self, command: &[u8]) -> Result<Bytes> {
        if command.is_empty() || command.len() > self.config.max_command_len {
            return Err(AdcsError::InvalidCommand {
                len: command.len(),
                max: self.config.max_command_len,
            });
        }
        Ok(encode_command_frame(command)?)
    }

    /// Hand `frame` to the port and wait for the transmit-complete signal.
    fn transmit(&self, frame: &[u8]) -> Result<()> {
        let signal = self.link.tx_signal();
        if signal.clear() {
            debug!("discarded stale transmit completion");
        }
        self.port.lock().send(frame)?;
        if !signal.take(self.config.tx_timeout) {
            warn!(len = frame.len(), "transmit did not complete");
            return Err(AdcsError::TransportFailed(TransportFailure::TxTimeout(
                self.config.tx_timeout,
            )));
        }
        debug!(len = frame.len(), "frame transmitted");
        Ok(())
    }
}

impl<P> std::fmt::Debug for AdcsTransport<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdcsTransport")
            .field("config", &self.config)
            .field("bus", &self.bus.stats())
            .field("queued", &self.link.queue().len())
            .finish()
    }
}
