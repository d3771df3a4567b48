use bytes::Bytes;
use tracing::trace;

use crate::codec::{destuff, try_buffer, EOM, ESC, SOM, TERMINATOR};
use crate::error::{FrameError, Result};
use crate::ids::INITIATE_DOWNLOAD_BURST;

const START_MARKER_LEN: usize = 3;
const COUNTER_LEN: usize = 2;

/// Shape of the packets in a download burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLayout {
    /// Third byte of the start marker (`ESC SOM <session_type>`).
    pub session_type: u8,
    /// Bytes (start marker included) accepted before end-marker scanning begins.
    pub min_packet_len: usize,
    /// Hard cap on a frame's wire size; reaching it without an end marker fails the packet.
    pub max_frame_len: usize,
    /// Data bytes following the sequence counter in the thin payload.
    pub data_len: usize,
}

impl Default for PacketLayout {
    fn default() -> Self {
        Self {
            session_type: INITIATE_DOWNLOAD_BURST,
            min_packet_len: 25,
            max_frame_len: 27 + 22,
            data_len: 20,
        }
    }
}

impl PacketLayout {
    fn start_marker(&self) -> [u8; START_MARKER_LEN] {
        [ESC, SOM, self.session_type]
    }
}

/// One reassembled download packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPacket {
    /// Little-endian sequence counter from the first two thin bytes.
    pub counter: u16,
    /// Fixed-length data block.
    pub data: Bytes,
}

/// Where the reassembler is within the current packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyState {
    /// Sliding a three-byte window over the stream looking for the start marker.
    SeekingStart,
    /// Inside the guaranteed-minimum region; marker-like pairs are payload.
    Accumulating,
    /// Checking every byte for the end marker.
    SeekingEnd,
}

/// Push-driven state machine that recovers download packets from a raw byte stream.
///
/// Feed bytes one at a time with [`push`](Self::push). A completed packet, or a
/// length failure, returns the machine to [`ReassemblyState::SeekingStart`].
#[derive(Debug)]
pub struct Reassembler {
    layout: PacketLayout,
    buf: Vec<u8>,
    state: ReassemblyState,
    // Last body byte is an ESC not yet paired with its duplicate.
    open_escape: bool,
}

impl Reassembler {
    pub fn new(layout: PacketLayout) -> Self {
        Self {
            buf: Vec::with_capacity(layout.max_frame_len),
            layout,
            state: ReassemblyState::SeekingStart,
            open_escape: false,
        }
    }

    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    pub fn layout(&self) -> &PacketLayout {
        &self.layout
    }

    /// Bytes held for the packet in progress (the start window while seeking).
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Abandon the packet in progress.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = ReassemblyState::SeekingStart;
        self.open_escape = false;
    }

    /// Feed one byte.
    ///
    /// Returns `Ok(Some(packet))` when the byte completed a frame, `Ok(None)` when
    /// more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Result<Option<DownloadPacket>> {
        match self.state {
            ReassemblyState::SeekingStart => {
                if self.buf.len() == START_MARKER_LEN {
                    self.buf.remove(0);
                }
                self.buf.push(byte);
                if self.buf[..] == self.layout.start_marker() {
                    trace!("download start marker found");
                    self.state = ReassemblyState::Accumulating;
                    self.open_escape = false;
                }
                Ok(None)
            }
            ReassemblyState::Accumulating => {
                self.accept_body_byte(byte);
                if self.buf.len() >= self.layout.min_packet_len {
                    trace!(received = self.buf.len(), "download minimum length reached");
                    self.state = ReassemblyState::SeekingEnd;
                }
                Ok(None)
            }
            ReassemblyState::SeekingEnd => {
                let closes = self.accept_body_byte(byte);
                if closes {
                    let packet = self.finish();
                    self.reset();
                    return packet.map(Some);
                }
                if self.buf.len() >= self.layout.max_frame_len {
                    let received = self.buf.len();
                    self.reset();
                    return Err(FrameError::IncorrectLength {
                        what: "download frame without end marker",
                        actual: received,
                        expected: self.layout.max_frame_len,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Store a body byte; returns true if it completes an unpaired `ESC EOM`.
    fn accept_body_byte(&mut self, byte: u8) -> bool {
        self.buf.push(byte);
        let closes = self.open_escape && byte == EOM;
        self.open_escape = byte == ESC && !self.open_escape;
        closes
    }

    fn finish(&self) -> Result<DownloadPacket> {
        debug_assert!(self.buf.ends_with(&TERMINATOR));
        let body = &self.buf[START_MARKER_LEN..self.buf.len() - TERMINATOR.len()];
        let mut thin = try_buffer(body.len())?;
        destuff(body, &mut thin);

        let needed = COUNTER_LEN + self.layout.data_len;
        if thin.len() < needed {
            return Err(FrameError::IncorrectLength {
                what: "download packet payload",
                actual: thin.len(),
                expected: needed,
            });
        }

        let counter = u16::from_le_bytes([thin[0], thin[1]]);
        trace!(counter, wire_len = self.buf.len(), "download packet complete");
        thin.truncate(needed);
        let data = Bytes::from(thin).slice(COUNTER_LEN..);
        Ok(DownloadPacket { counter, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::stuff;

    fn layout() -> PacketLayout {
        PacketLayout::default()
    }

    fn packet_frame(counter: u16, data: &[u8]) -> Vec<u8> {
        let mut thin = counter.to_le_bytes().to_vec();
        thin.extend_from_slice(data);
        let mut frame = vec![ESC, SOM, INITIATE_DOWNLOAD_BURST];
        stuff(&thin, &mut frame);
        frame.extend_from_slice(&TERMINATOR);
        frame
    }

    fn feed(r: &mut Reassembler, bytes: &[u8]) -> Vec<Result<DownloadPacket>> {
        bytes
            .iter()
            .filter_map(|&b| r.push(b).transpose())
            .collect()
    }

    #[test]
    fn reassembles_after_garbage() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = vec![0x00, 0x55, ESC, 0x13];
        stream.extend(packet_frame(0x0302, &data));

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &stream);
        assert_eq!(out.len(), 1);
        let packet = out.into_iter().next().unwrap().unwrap();
        assert_eq!(packet.counter, 0x0302);
        assert_eq!(packet.data.as_ref(), data.as_slice());
        assert_eq!(r.state(), ReassemblyState::SeekingStart);
    }

    #[test]
    fn split_start_marker_is_not_lost() {
        let data = [0xAB; 20];
        let mut stream = vec![ESC, SOM, 0x00];
        stream.extend(packet_frame(7, &data));

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &stream);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().counter, 7);
    }

    #[test]
    fn overlapping_start_prefix_is_detected() {
        // ESC ESC SOM <type>: the window must keep the second ESC.
        let data = [0x01; 20];
        let mut stream = vec![ESC];
        stream.extend(packet_frame(9, &data));

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &stream);
        assert_eq!(out[0].as_ref().unwrap().counter, 9);
    }

    #[test]
    fn end_marker_inside_minimum_region_is_payload() {
        let mut data = [0x10; 20];
        // Raw ESC EOM sitting early in the body: not a terminator yet.
        data[3] = ESC;
        data[4] = EOM;
        let frame = packet_frame(1, &data);

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &frame);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().data.as_ref(), &data);
    }

    #[test]
    fn stuffed_escape_before_eom_does_not_close() {
        let mut data = [0x22; 20];
        data[18] = ESC;
        data[19] = EOM;
        let frame = packet_frame(2, &data);

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &frame);
        assert_eq!(out.len(), 1);
        let packet = out[0].as_ref().unwrap();
        assert_eq!(packet.data.as_ref(), &data);
    }

    #[test]
    fn missing_end_marker_is_bounded() {
        let mut stream = vec![ESC, SOM, INITIATE_DOWNLOAD_BURST];
        stream.extend(std::iter::repeat(0x44).take(200));

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &stream);
        let first = out.into_iter().next().expect("bound should trip");
        match first {
            Err(FrameError::IncorrectLength { actual, expected, .. }) => {
                assert_eq!(actual, 49);
                assert_eq!(expected, 49);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(r.state(), ReassemblyState::SeekingStart);
    }

    #[test]
    fn fully_stuffed_packet_fits_bound() {
        let data = [ESC; 20];
        let frame = packet_frame(u16::from_le_bytes([ESC, ESC]), &data);
        assert_eq!(frame.len(), 49);

        let mut r = Reassembler::new(layout());
        let out = feed(&mut r, &frame);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().counter, 0x1F1F);
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut frame = vec![ESC, SOM, INITIATE_DOWNLOAD_BURST];
        frame.extend(std::iter::repeat(0x01).take(22));
        frame.extend_from_slice(&TERMINATOR);
        let layout = PacketLayout {
            data_len: 30,
            ..PacketLayout::default()
        };
        let mut r = Reassembler::new(layout);
        let out = feed(&mut r, &frame);
        assert!(matches!(
            out[0],
            Err(FrameError::IncorrectLength { actual: 22, .. })
        ));
    }

    #[test]
    fn consecutive_packets() {
        let mut stream = Vec::new();
        for counter in 0..3u16 {
            stream.extend(packet_frame(counter, &[counter as u8; 20]));
        }
        let mut r = Reassembler::new(layout());
        let counters: Vec<u16> = feed(&mut r, &stream)
            .into_iter()
            .map(|p| p.unwrap().counter)
            .collect();
        assert_eq!(counters, vec![0, 1, 2]);
    }

    #[test]
    fn reset_returns_to_seeking_start() {
        let mut r = Reassembler::new(layout());
        for b in [ESC, SOM, INITIATE_DOWNLOAD_BURST, 1, 2] {
            r.push(b).unwrap();
        }
        assert_eq!(r.state(), ReassemblyState::Accumulating);
        r.reset();
        assert_eq!(r.state(), ReassemblyState::SeekingStart);
        assert!(r.buffered().is_empty());
    }
}
