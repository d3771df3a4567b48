//! Telecommand and telemetry identifiers used by the transport itself.
//!
//! IDs 0-127 are telecommands, 128-255 are telemetry requests.

/// Telemetry: acknowledgment of the last telecommand (4 bytes).
pub const LAST_TC_ACK: u8 = 240;

/// Telecommand: start streaming a file as a burst of download packets.
/// Also the session-type byte in every download frame's start marker.
pub const INITIATE_DOWNLOAD_BURST: u8 = 119;

/// First telemetry ID.
pub const TELEMETRY_ID_START: u8 = 128;

/// Returns true if `id` addresses a telemetry frame.
pub fn is_telemetry(id: u8) -> bool {
    id >= TELEMETRY_ID_START
}

/// Returns a human-readable name for an ID this crate knows about.
pub fn id_name(id: u8) -> &'static str {
    match id {
        LAST_TC_ACK => "LAST_TC_ACK",
        INITIATE_DOWNLOAD_BURST => "INITIATE_DOWNLOAD_BURST",
        0..=127 => "TELECOMMAND",
        _ => "TELEMETRY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ids() {
        assert!(is_telemetry(LAST_TC_ACK));
        assert!(!is_telemetry(INITIATE_DOWNLOAD_BURST));
        assert_eq!(id_name(3), "TELECOMMAND");
        assert_eq!(id_name(150), "TELEMETRY");
        assert_eq!(id_name(240), "LAST_TC_ACK");
    }
}
