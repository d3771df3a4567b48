use bytes::{BufMut, Bytes};

use crate::error::{FrameError, Result};
use crate::status::TcStatus;

/// Escape (parsing) byte. Opens every marker; doubled when it appears as data.
pub const ESC: u8 = 0x1F;

/// Start-of-message marker, preceded by [`ESC`].
pub const SOM: u8 = 0x7F;

/// End-of-message marker, preceded by [`ESC`].
pub const EOM: u8 = 0xFF;

/// Two-byte sequence that closes every frame.
pub const TERMINATOR: [u8; 2] = [ESC, EOM];

/// Bytes a telecommand frame adds around its stuffed body: `ESC SOM` + `ESC EOM`.
pub const TC_FRAME_OVERHEAD: usize = 4;

/// Length of a telemetry request frame: `ESC SOM <id> ESC EOM`.
pub const TM_REQUEST_LEN: usize = 5;

/// Length of a telecommand acknowledgment: `ESC SOM <id> <status> ESC EOM`.
pub const TC_REPLY_LEN: usize = 6;

/// Longest telecommand acknowledgment: both the id and the status stuffed.
pub const MAX_TC_REPLY_LEN: usize = TC_REPLY_LEN + 2;

/// Offset of the status byte inside a telecommand acknowledgment.
pub const TC_REPLY_STATUS_INDEX: usize = 3;

/// Offset of the first data byte inside a telemetry reply.
pub const TM_REPLY_DATA_INDEX: usize = 3;

/// Length of `thin` once stuffed: one extra byte per literal [`ESC`].
pub fn stuffed_len(thin: &[u8]) -> usize {
    thin.len() + thin.iter().filter(|&&b| b == ESC).count()
}

/// Upper bound on the wire size of a telecommand frame carrying `thin_len` bytes.
///
/// `None` when the bound does not fit in `usize`.
pub const fn max_command_frame_len(thin_len: usize) -> Option<usize> {
    match thin_len.checked_mul(2) {
        Some(n) => n.checked_add(TC_FRAME_OVERHEAD),
        None => None,
    }
}

/// Upper bound on the wire size of a telemetry reply carrying `thin_len` bytes.
///
/// `None` when the bound does not fit in `usize`.
pub const fn max_telemetry_reply_len(thin_len: usize) -> Option<usize> {
    match thin_len.checked_mul(2) {
        Some(n) => n.checked_add(TM_REQUEST_LEN),
        None => None,
    }
}

/// Append `thin` to `dst`, doubling every [`ESC`]. Returns the number of bytes written.
pub fn stuff<B: BufMut>(thin: &[u8], dst: &mut B) -> usize {
    let mut written = 0;
    for &byte in thin {
        dst.put_u8(byte);
        written += 1;
        if byte == ESC {
            dst.put_u8(ESC);
            written += 1;
        }
    }
    written
}

/// Append the thin form of `stuffed` to `dst`. Returns the number of bytes written.
///
/// The byte following every [`ESC`] is its duplicate and is skipped.
pub fn destuff<B: BufMut>(stuffed: &[u8], dst: &mut B) -> usize {
    let mut written = 0;
    let mut bytes = stuffed.iter();
    while let Some(&byte) = bytes.next() {
        dst.put_u8(byte);
        written += 1;
        if byte == ESC {
            bytes.next();
        }
    }
    written
}

/// Resolve a computed buffer bound, treating overflow as an unsatisfiable size.
pub(crate) fn bounded_size(bound: Option<usize>) -> Result<usize> {
    bound.ok_or(FrameError::AllocationFailed { size: usize::MAX })
}

/// Reserve an exact-size buffer, reporting exhaustion instead of aborting.
pub(crate) fn try_buffer(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| FrameError::AllocationFailed { size })?;
    Ok(buf)
}

/// Build a telecommand frame.
///
/// Wire format:
/// ```text
/// ┌─────┬─────┬────────────────────┬─────┬─────┐
/// │ ESC │ SOM │ stuffed command    │ ESC │ EOM │
/// │ 1F  │ 7F  │ (id + parameters)  │ 1F  │ FF  │
/// └─────┴─────┴────────────────────┴─────┴─────┘
/// ```
///
/// The buffer is sized to [`max_command_frame_len`], so stuffing never reallocates.
pub fn encode_command_frame(command: &[u8]) -> Result<Bytes> {
    let mut frame = try_buffer(bounded_size(max_command_frame_len(command.len()))?)?;
    frame.put_slice(&[ESC, SOM]);
    stuff(command, &mut frame);
    frame.put_slice(&TERMINATOR);
    Ok(Bytes::from(frame))
}

/// Build the five-byte telemetry request for `id`.
pub fn encode_telemetry_request(id: u8) -> [u8; TM_REQUEST_LEN] {
    [ESC, SOM, id, ESC, EOM]
}

/// Decoded telecommand acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcReply {
    /// ID of the telecommand being acknowledged.
    pub id: u8,
    /// Status byte, passed through untouched.
    pub status: TcStatus,
}

impl TcReply {
    /// Parse an acknowledgment frame.
    ///
    /// The id and status are stuffed like any other body, so the frame is six
    /// bytes unless one of them is [`ESC`].
    pub fn parse(reply: &[u8]) -> Result<Self> {
        if reply.len() < TC_REPLY_LEN || reply.len() > MAX_TC_REPLY_LEN {
            return Err(FrameError::IncorrectLength {
                what: "acknowledgment",
                actual: reply.len(),
                expected: TC_REPLY_LEN,
            });
        }
        if reply[..2] != [ESC, SOM] {
            return Err(FrameError::MalformedReply("acknowledgment missing start marker"));
        }
        if !reply.ends_with(&TERMINATOR) {
            return Err(FrameError::MalformedReply("acknowledgment missing end marker"));
        }
        if reply.len() == TC_REPLY_LEN {
            return Ok(Self {
                id: reply[2],
                status: TcStatus(reply[TC_REPLY_STATUS_INDEX]),
            });
        }

        let mut body = [0u8; MAX_TC_REPLY_LEN];
        let mut thin = &mut body[..];
        let written = destuff(&reply[2..reply.len() - 2], &mut thin);
        if written != 2 {
            return Err(FrameError::MalformedReply("acknowledgment body is not id and status"));
        }
        Ok(Self {
            id: body[0],
            status: TcStatus(body[1]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stuffed(thin: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        stuff(thin, &mut out);
        out
    }

    fn destuffed(wire: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        destuff(wire, &mut out);
        out
    }

    #[test]
    fn plain_bytes_are_unchanged() {
        assert_eq!(stuffed(&[0x01, 0x02]), vec![0x01, 0x02]);
        assert_eq!(stuffed_len(&[0x01, 0x02]), 2);
    }

    #[test]
    fn escape_byte_is_doubled() {
        assert_eq!(stuffed(&[0x1F, 0x02]), vec![0x1F, 0x1F, 0x02]);
        assert_eq!(destuffed(&[0x1F, 0x1F, 0x02]), vec![0x1F, 0x02]);
    }

    #[test]
    fn stuffed_length_counts_escapes() {
        let samples: [&[u8]; 5] = [
            &[],
            &[ESC],
            &[ESC, ESC, ESC],
            &[0x00, ESC, 0x7F, 0xFF, ESC],
            &[SOM, EOM, 0x10],
        ];
        for thin in samples {
            let wire = stuffed(thin);
            assert_eq!(wire.len(), stuffed_len(thin));
            assert_eq!(
                wire.len(),
                thin.len() + thin.iter().filter(|&&b| b == ESC).count()
            );
        }
    }

    #[test]
    fn destuff_inverts_stuff_over_all_byte_values() {
        let thin: Vec<u8> = (0..=255u8).chain((0..=255u8).rev()).collect();
        assert_eq!(destuffed(&stuffed(&thin)), thin);
    }

    #[test]
    fn destuff_of_lone_trailing_escape_keeps_it() {
        assert_eq!(destuffed(&[0x05, ESC]), vec![0x05, ESC]);
    }

    #[test]
    fn stuff_reports_written_count() {
        let mut out = Vec::new();
        assert_eq!(stuff(&[ESC, 1, ESC], &mut out), 5);
        let mut thin = Vec::new();
        assert_eq!(destuff(&out, &mut thin), 3);
    }

    #[test]
    fn command_frame_layout() {
        let frame = encode_command_frame(&[0x0A, ESC, 0x03]).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[ESC, SOM, 0x0A, ESC, ESC, 0x03, ESC, EOM]
        );
        assert!(frame.len() <= max_command_frame_len(3).unwrap());
    }

    #[test]
    fn frame_bounds_report_overflow() {
        assert_eq!(max_command_frame_len(10), Some(24));
        assert_eq!(max_telemetry_reply_len(4), Some(13));
        assert_eq!(max_command_frame_len(usize::MAX), None);
        assert_eq!(max_telemetry_reply_len(usize::MAX / 2), None);
        assert!(matches!(
            bounded_size(max_command_frame_len(usize::MAX)),
            Err(FrameError::AllocationFailed { size: usize::MAX })
        ));
    }

    #[test]
    fn empty_command_frame_is_markers_only() {
        let frame = encode_command_frame(&[]).unwrap();
        assert_eq!(frame.as_ref(), &[ESC, SOM, ESC, EOM]);
    }

    #[test]
    fn telemetry_request_layout() {
        assert_eq!(encode_telemetry_request(0xF0), [ESC, SOM, 0xF0, ESC, EOM]);
    }

    #[test]
    fn parse_tc_reply_extracts_status() {
        let reply = TcReply::parse(&[ESC, SOM, 0x0A, 0x03, ESC, EOM]).unwrap();
        assert_eq!(reply.id, 0x0A);
        assert_eq!(reply.status, TcStatus::INVALID_PARAMETER);
    }

    #[test]
    fn parse_tc_reply_rejects_bad_markers() {
        let err = TcReply::parse(&[0x00, SOM, 0x0A, 0x00, ESC, EOM]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedReply(_)));

        let err = TcReply::parse(&[ESC, SOM, 0x0A, 0x00, ESC, 0x00]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedReply(_)));
    }

    #[test]
    fn parse_tc_reply_destuffs_escape_id_and_status() {
        let reply = TcReply::parse(&[ESC, SOM, ESC, ESC, 0x01, ESC, EOM]).unwrap();
        assert_eq!(reply.id, ESC);
        assert_eq!(reply.status, TcStatus::INVALID_ID);

        let reply = TcReply::parse(&[ESC, SOM, ESC, ESC, ESC, ESC, ESC, EOM]).unwrap();
        assert_eq!((reply.id, reply.status), (ESC, TcStatus(ESC)));
    }

    #[test]
    fn parse_tc_reply_rejects_odd_bodies() {
        // Seven bytes but nothing stuffed: three body bytes.
        let err = TcReply::parse(&[ESC, SOM, 0x0A, 0x00, 0x01, ESC, EOM]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedReply(_)));

        let err = TcReply::parse(&[ESC, SOM, ESC, EOM]).unwrap_err();
        assert!(matches!(err, FrameError::IncorrectLength { actual: 4, .. }));
    }
}
