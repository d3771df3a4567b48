use adcsio_frame::{DownloadPacket, FrameReader, Reassembler};
use adcsio_link::SerialPort;
use tracing::{debug, warn};

use crate::bus::BusGuard;
use crate::config::DownloadConfig;
use crate::engine::AdcsTransport;
use crate::error::Result;

/// Exclusive hold on the UART for the length of a download burst.
///
/// Created by [`AdcsTransport::enter_file_download_mode`]. The bus token is
/// held for the whole session rather than per packet; [`exit`](Self::exit) or
/// dropping the session drains the queue and releases it.
pub struct FileDownloadSession<'a, P> {
    transport: &'a AdcsTransport<P>,
    bus: BusGuard<'a>,
    reassembler: Reassembler,
    config: DownloadConfig,
    packets: u32,
    failures: u32,
}

impl<'a, P: SerialPort> FileDownloadSession<'a, P> {
    pub(crate) fn new(
        transport: &'a AdcsTransport<P>,
        bus: BusGuard<'a>,
        reassembler: Reassembler,
        config: DownloadConfig,
    ) -> Self {
        Self {
            transport,
            bus,
            reassembler,
            config,
            packets: 0,
            failures: 0,
        }
    }

    /// Send a telecommand without acknowledgment over the held bus.
    ///
    /// This is how the burst itself is started.
    pub fn send_command_no_reply(&mut self, command: &[u8]) -> Result<()> {
        self.transport.transmit_command(command)
    }

    /// Reassemble the next packet from the burst.
    ///
    /// A per-byte timeout or an overlong frame fails only this packet; the next
    /// call starts again by searching for a start marker. Whether to retry or
    /// abandon the download is up to the caller.
    pub fn receive_file_download_packet(&mut self) -> Result<DownloadPacket> {
        let reader = FrameReader::new(self.transport.link().queue(), self.config.byte_timeout);
        match reader.read_download_packet(&mut self.reassembler) {
            Ok(packet) => {
                self.packets += 1;
                debug!(counter = packet.counter, "download packet received");
                Ok(packet)
            }
            Err(err) => {
                self.failures += 1;
                warn!(error = %err, "download packet failed");
                Err(err.into())
            }
        }
    }

    /// Packets delivered so far.
    pub fn packets_received(&self) -> u32 {
        self.packets
    }

    /// Packets that failed with a timeout or length error.
    pub fn packets_failed(&self) -> u32 {
        self.failures
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Leave download mode and release the bus.
    pub fn exit(self) {
        debug!(
            purpose = self.bus.purpose(),
            packets = self.packets,
            failures = self.failures,
            "exiting file download mode"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use adcsio_frame::ESC;
    use adcsio_link::Link;

    use super::*;
    use crate::error::{AdcsError, TransportFailure};
    use crate::sim::{BurstPlan, SimulatedAdcs};

    fn download_config() -> DownloadConfig {
        DownloadConfig {
            byte_timeout: Duration::from_millis(50),
            enter_timeout: Duration::from_millis(20),
            ..DownloadConfig::default()
        }
    }

    fn setup() -> (AdcsTransport<SimulatedAdcs>, SimulatedAdcs) {
        let link = Link::new(64);
        let sim = SimulatedAdcs::new(link.notifier());
        (AdcsTransport::new(sim.clone(), link), sim)
    }

    #[test]
    fn burst_is_reassembled_in_order() {
        let (transport, sim) = setup();
        sim.set_burst(BurstPlan::counting(12, 20).with_leading_garbage(vec![0x00, ESC, 0x7F]));

        let mut session = transport.enter_file_download_mode(download_config()).unwrap();
        session.send_command_no_reply(&[119, 0x00, 0x01]).unwrap();

        for expected in 0..12u16 {
            let packet = session.receive_file_download_packet().unwrap();
            assert_eq!(packet.counter, expected);
            assert_eq!(packet.data.len(), 20);
            assert_eq!(packet.data[0], expected as u8);
        }
        assert_eq!(session.packets_received(), 12);

        let err = session.receive_file_download_packet().unwrap_err();
        assert!(matches!(
            err,
            AdcsError::TransportFailed(TransportFailure::RxTimeout { .. })
        ));
        assert_eq!(session.packets_failed(), 1);

        session.exit();
        let stats = transport.bus_stats();
        assert_eq!((stats.acquisitions, stats.releases), (1, 1));
        assert!(transport.link().queue().is_empty());
    }

    #[test]
    fn session_blocks_other_transactions_until_exit() {
        let (transport, _sim) = setup();
        let session = transport.enter_file_download_mode(download_config()).unwrap();
        assert!(matches!(
            transport.enter_file_download_mode(download_config()),
            Err(AdcsError::BusBusy(_))
        ));
        drop(session);
        assert!(transport.enter_file_download_mode(download_config()).is_ok());
    }

    #[test]
    fn packet_after_mid_packet_timeout_is_received() {
        let (transport, sim) = setup();
        sim.set_burst(BurstPlan::raw(vec![ESC, 0x7F, 119, 0x00, 0x01, 0x5A, 0x5A]));

        let mut session = transport.enter_file_download_mode(download_config()).unwrap();
        session.send_command_no_reply(&[119]).unwrap();
        let err = session.receive_file_download_packet().unwrap_err();
        assert!(matches!(
            err,
            AdcsError::TransportFailed(TransportFailure::RxTimeout { .. })
        ));

        sim.set_burst(BurstPlan::counting(2, 20));
        session.send_command_no_reply(&[119]).unwrap();
        for expected in 0..2u16 {
            let packet = session.receive_file_download_packet().unwrap();
            assert_eq!(packet.counter, expected);
            assert_eq!(packet.data.as_ref(), &[expected as u8; 20]);
        }
        assert_eq!((session.packets_received(), session.packets_failed()), (2, 1));
    }

    #[test]
    fn runaway_packet_reports_incorrect_length() {
        let (transport, sim) = setup();
        let mut raw = vec![ESC, 0x7F, 119];
        raw.extend([0x44; 80]);
        sim.set_burst(BurstPlan::raw(raw));

        let mut session = transport.enter_file_download_mode(download_config()).unwrap();
        session.send_command_no_reply(&[119]).unwrap();
        let err = session.receive_file_download_packet().unwrap_err();
        assert!(matches!(err, AdcsError::IncorrectLength { actual: 49, .. }));
    }
}
