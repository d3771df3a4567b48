//! Escape-stuffed framing for the ADCS UART protocol.
//!
//! Every frame on the wire is delimited with a two-byte start and a two-byte end:
//! - `ESC SOM` opens the frame
//! - `ESC EOM` closes it
//!
//! There is no length field. Any literal `ESC` inside the body is doubled, so
//! the only unpaired `ESC` in a frame is the one belonging to a marker.

pub mod codec;
pub mod download;
pub mod error;
pub mod ids;
pub mod reader;
pub mod status;

pub use codec::{
    destuff, encode_command_frame, encode_telemetry_request, max_command_frame_len,
    max_telemetry_reply_len, stuff, stuffed_len, TcReply, EOM, ESC, MAX_TC_REPLY_LEN, SOM,
    TC_FRAME_OVERHEAD, TC_REPLY_LEN, TERMINATOR, TM_REQUEST_LEN,
};
pub use download::{DownloadPacket, PacketLayout, ReassemblyState, Reassembler};
pub use error::{FrameError, Result};
pub use ids::{INITIATE_DOWNLOAD_BURST, LAST_TC_ACK};
pub use reader::{FrameReader, TelemetryScanner};
pub use status::TcStatus;
