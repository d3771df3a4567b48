use std::time::Duration;

use adcsio_link::ByteSource;
use bytes::Bytes;
use tracing::trace;

use crate::codec::{
    bounded_size, destuff, max_telemetry_reply_len, try_buffer, TcReply, EOM, ESC,
    MAX_TC_REPLY_LEN, SOM, TC_REPLY_LEN, TM_REPLY_DATA_INDEX, TM_REQUEST_LEN,
};
use crate::download::{DownloadPacket, Reassembler};
use crate::error::{FrameError, Result};

/// Watches a reply stream for the unpaired `ESC EOM` that ends a frame.
///
/// A partial match that fails resets only the match index, never the
/// collected bytes. An `ESC` followed by anything but `EOM` also consumes that
/// byte, so the second half of a stuffed pair can never start a false match.
#[derive(Debug, Default, Clone)]
pub struct TelemetryScanner {
    matched: usize,
}

impl TelemetryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns true when it completes the terminator.
    pub fn push(&mut self, byte: u8) -> bool {
        match (self.matched, byte) {
            (0, ESC) => {
                self.matched = 1;
                false
            }
            (1, EOM) => {
                self.matched = 0;
                true
            }
            _ => {
                self.matched = 0;
                false
            }
        }
    }
}

/// Collects reply frames from a [`ByteSource`], one byte at a time.
///
/// Every pop is bounded by `byte_timeout`; running out of time fails the
/// read with [`FrameError::ByteTimeout`].
pub struct FrameReader<'a, S: ?Sized> {
    source: &'a S,
    byte_timeout: Duration,
}

impl<'a, S: ByteSource + ?Sized> FrameReader<'a, S> {
    pub fn new(source: &'a S, byte_timeout: Duration) -> Self {
        Self {
            source,
            byte_timeout,
        }
    }

    fn next_byte(&self, received: usize) -> Result<u8> {
        self.source
            .pop(self.byte_timeout)
            .ok_or(FrameError::ByteTimeout {
                received,
                timeout: self.byte_timeout,
            })
    }

    /// Read a telecommand acknowledgment.
    ///
    /// Six bytes, plus one for each of the id and status that arrives stuffed.
    pub fn read_tc_reply(&self) -> Result<TcReply> {
        let mut reply = Vec::with_capacity(MAX_TC_REPLY_LEN);
        for field in 0..TC_REPLY_LEN {
            let byte = self.next_byte(reply.len())?;
            reply.push(byte);
            if byte == ESC && (2..=3).contains(&field) {
                let pair = self.next_byte(reply.len())?;
                reply.push(pair);
            }
        }
        trace!(?reply, "telecommand acknowledgment received");
        TcReply::parse(&reply)
    }

    /// Read a telemetry reply for `id` and return its destuffed data.
    ///
    /// The wire size is capped at `expected_len * 2 + 5`, the largest a fully
    /// stuffed reply of that length can be. A length whose cap overflows fails
    /// with [`FrameError::AllocationFailed`] before anything is read.
    pub fn read_telemetry_reply(&self, id: u8, expected_len: usize) -> Result<Bytes> {
        let max_wire = bounded_size(max_telemetry_reply_len(expected_len))?;
        let mut reply = try_buffer(max_wire)?;
        let mut scanner = TelemetryScanner::new();

        loop {
            let byte = self.next_byte(reply.len())?;
            reply.push(byte);
            if scanner.push(byte) {
                break;
            }
            if reply.len() >= max_wire {
                return Err(FrameError::IncorrectLength {
                    what: "telemetry reply without end marker",
                    actual: reply.len(),
                    expected: max_wire,
                });
            }
        }
        trace!(id, wire_len = reply.len(), "telemetry reply received");

        if reply.len() < TM_REQUEST_LEN || reply[..2] != [ESC, SOM] {
            return Err(FrameError::MalformedReply("telemetry reply missing start marker"));
        }
        if reply[2] != id {
            return Err(FrameError::MalformedReply("telemetry reply for a different id"));
        }

        let body = &reply[TM_REPLY_DATA_INDEX..reply.len() - 2];
        let mut thin = try_buffer(body.len())?;
        destuff(body, &mut thin);
        if thin.len() != expected_len {
            return Err(FrameError::IncorrectLength {
                what: "telemetry payload",
                actual: thin.len(),
                expected: expected_len,
            });
        }
        Ok(Bytes::from(thin))
    }

    /// Pull bytes through `reassembler` until it yields a packet.
    ///
    /// On any failure the reassembler is reset, so the next call starts from
    /// a clean search for the start marker.
    pub fn read_download_packet(&self, reassembler: &mut Reassembler) -> Result<DownloadPacket> {
        loop {
            let byte = match self.next_byte(reassembler.buffered().len()) {
                Ok(byte) => byte,
                Err(err) => {
                    reassembler.reset();
                    return Err(err);
                }
            };
            if let Some(packet) = reassembler.push(byte)? {
                return Ok(packet);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use adcsio_link::ByteQueue;

    use super::*;
    use crate::codec::{stuff, TERMINATOR};
    use crate::download::PacketLayout;
    use crate::ids::INITIATE_DOWNLOAD_BURST;
    use crate::status::TcStatus;

    const TIMEOUT: Duration = Duration::from_millis(20);

    fn queue_with(bytes: &[u8]) -> ByteQueue {
        let queue = ByteQueue::new(256);
        for &b in bytes {
            assert!(queue.push(b));
        }
        queue
    }

    fn telemetry_reply(id: u8, thin: &[u8]) -> Vec<u8> {
        let mut wire = vec![ESC, SOM, id];
        stuff(thin, &mut wire);
        wire.extend_from_slice(&TERMINATOR);
        wire
    }

    #[test]
    fn scanner_finds_terminator() {
        let mut scanner = TelemetryScanner::new();
        let hits: Vec<bool> = [0x01, ESC, EOM].iter().map(|&b| scanner.push(b)).collect();
        assert_eq!(hits, vec![false, false, true]);
    }

    #[test]
    fn scanner_ignores_stuffed_escape_followed_by_eom() {
        let mut scanner = TelemetryScanner::new();
        // ESC ESC is a literal 0x1F; the following EOM is data.
        for b in [ESC, ESC, EOM] {
            assert!(!scanner.push(b));
        }
        assert!(!scanner.push(ESC));
        assert!(scanner.push(EOM));
    }

    #[test]
    fn scanner_recovers_after_partial_match() {
        let mut scanner = TelemetryScanner::new();
        assert!(!scanner.push(ESC));
        assert!(!scanner.push(0x33));
        assert!(!scanner.push(ESC));
        assert!(scanner.push(EOM));
    }

    #[test]
    fn reads_tc_reply() {
        let queue = queue_with(&[ESC, SOM, 0x0A, 0x02, ESC, EOM]);
        let reader = FrameReader::new(&queue, TIMEOUT);
        let reply = reader.read_tc_reply().unwrap();
        assert_eq!(reply.status, TcStatus::WRONG_LENGTH);
        assert!(queue.is_empty());
    }

    #[test]
    fn reads_stuffed_tc_reply_without_leftovers() {
        let queue = queue_with(&[ESC, SOM, ESC, ESC, 0x03, ESC, EOM, 0x42]);
        let reader = FrameReader::new(&queue, TIMEOUT);
        let reply = reader.read_tc_reply().unwrap();
        assert_eq!(reply.id, ESC);
        assert_eq!(reply.status, TcStatus::INVALID_PARAMETER);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn tc_reply_times_out_midway() {
        let queue = queue_with(&[ESC, SOM, 0x0A]);
        let reader = FrameReader::new(&queue, TIMEOUT);
        let err = reader.read_tc_reply().unwrap_err();
        assert!(matches!(err, FrameError::ByteTimeout { received: 3, .. }));
    }

    #[test]
    fn reads_stuffed_telemetry() {
        let thin = [0x01, ESC, 0x02, EOM, ESC];
        let queue = queue_with(&telemetry_reply(0x90, &thin));
        let reader = FrameReader::new(&queue, TIMEOUT);
        let data = reader.read_telemetry_reply(0x90, thin.len()).unwrap();
        assert_eq!(data.as_ref(), &thin);
    }

    #[test]
    fn telemetry_length_mismatch() {
        let queue = queue_with(&telemetry_reply(0x90, &[1, 2, 3]));
        let reader = FrameReader::new(&queue, TIMEOUT);
        let err = reader.read_telemetry_reply(0x90, 4).unwrap_err();
        assert!(matches!(
            err,
            FrameError::IncorrectLength { actual: 3, expected: 4, .. }
        ));
    }

    #[test]
    fn telemetry_wrong_id() {
        let queue = queue_with(&telemetry_reply(0x91, &[1, 2]));
        let reader = FrameReader::new(&queue, TIMEOUT);
        let err = reader.read_telemetry_reply(0x90, 2).unwrap_err();
        assert!(matches!(err, FrameError::MalformedReply(_)));
    }

    #[test]
    fn telemetry_runaway_is_bounded() {
        let queue = queue_with(&[0x55; 64]);
        let reader = FrameReader::new(&queue, TIMEOUT);
        let err = reader.read_telemetry_reply(0x90, 4).unwrap_err();
        assert!(matches!(
            err,
            FrameError::IncorrectLength { actual: 13, expected: 13, .. }
        ));
    }

    #[test]
    fn telemetry_length_with_overflowing_bound_is_rejected() {
        let queue = queue_with(&telemetry_reply(0x90, &[1, 2]));
        let reader = FrameReader::new(&queue, TIMEOUT);
        let err = reader.read_telemetry_reply(0x90, usize::MAX).unwrap_err();
        assert!(matches!(err, FrameError::AllocationFailed { size: usize::MAX }));
        // Nothing was consumed from the queue.
        assert_eq!(queue.len(), 7);
    }

    #[test]
    fn telemetry_never_completing_times_out() {
        let queue = queue_with(&[ESC, SOM, 0x90, 0x01]);
        let reader = FrameReader::new(&queue, TIMEOUT);
        let err = reader.read_telemetry_reply(0x90, 4).unwrap_err();
        assert!(matches!(err, FrameError::ByteTimeout { received: 4, .. }));
    }

    #[test]
    fn download_packet_then_timeout_resets() {
        let mut thin = 0x0102u16.to_le_bytes().to_vec();
        thin.extend_from_slice(&[0x5A; 20]);
        let mut wire = vec![0xEE, ESC, SOM, INITIATE_DOWNLOAD_BURST];
        stuff(&thin, &mut wire);
        wire.extend_from_slice(&TERMINATOR);
        wire.extend_from_slice(&[ESC, SOM, INITIATE_DOWNLOAD_BURST, 0x01]);

        let queue = queue_with(&wire);
        let reader = FrameReader::new(&queue, TIMEOUT);
        let mut reassembler = Reassembler::new(PacketLayout::default());

        let packet = reader.read_download_packet(&mut reassembler).unwrap();
        assert_eq!(packet.counter, 0x0102);

        let err = reader.read_download_packet(&mut reassembler).unwrap_err();
        assert!(matches!(err, FrameError::ByteTimeout { .. }));
        assert!(reassembler.buffered().is_empty());
    }
}
