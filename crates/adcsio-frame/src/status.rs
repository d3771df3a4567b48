use std::fmt;

/// Status byte the ADCS returns for a telecommand.
///
/// The transport copies it verbatim from the reply; interpreting it is the
/// caller's business. The named constants cover the codes the device documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TcStatus(pub u8);

impl TcStatus {
    pub const OK: Self = Self(0);
    pub const INVALID_ID: Self = Self(1);
    pub const WRONG_LENGTH: Self = Self(2);
    pub const INVALID_PARAMETER: Self = Self(3);
    pub const CRC_ERROR: Self = Self(4);

    /// The raw status byte.
    pub fn code(self) -> u8 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "OK",
            1 => "INVALID_ID",
            2 => "WRONG_LENGTH",
            3 => "INVALID_PARAMETER",
            4 => "CRC_ERROR",
            _ => "UNKNOWN",
        }
    }
}

impl From<u8> for TcStatus {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl fmt::Display for TcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}
