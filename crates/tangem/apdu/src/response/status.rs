//! Status word definitions for card responses

use std::fmt;

use tracing::Level;

/// Status word (SW1-SW2) returned by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusWord {
    /// Command processed (90 00)
    ProcessCompleted,
    /// Processed, access code changed (90 01)
    Pin1Changed,
    /// Processed, passcode changed (90 02)
    Pin2Changed,
    /// Processed, access code and passcode changed (90 03)
    Pins12Changed,
    /// Processed, third code changed (90 04)
    Pin3Changed,
    /// Processed, access code and third code changed (90 05)
    Pins13Changed,
    /// Processed, passcode and third code changed (90 06)
    Pins23Changed,
    /// Processed, all codes changed (90 07)
    Pins123Changed,
    /// Security delay in progress, resend the same command (97 89)
    NeedPause,
    /// Resend with a stronger encryption tier (69 82)
    NeedEncryption,
    /// Invalid parameters, usually a wrong code (6A 86)
    InvalidParams,
    /// Generic processing failure (62 86)
    ErrorProcessingCommand,
    /// Card is not in a state to run the command (69 85)
    InvalidState,
    /// Instruction not supported (6D 00)
    InsNotSupported,
    /// File not found (6A 82)
    FileNotFound,
    /// Anything outside the known code space
    Unknown(u16),
}

/// Outcome bucket that drives the retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The command was processed
    Success,
    /// Wait out a security delay and resend
    NeedsPause,
    /// Escalate the encryption tier and resend
    NeedsEncryption,
    /// The card refused the command
    Failure,
}

impl StatusWord {
    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(sw: u16) -> Self {
        match sw {
            0x9000 => Self::ProcessCompleted,
            0x9001 => Self::Pin1Changed,
            0x9002 => Self::Pin2Changed,
            0x9003 => Self::Pins12Changed,
            0x9004 => Self::Pin3Changed,
            0x9005 => Self::Pins13Changed,
            0x9006 => Self::Pins23Changed,
            0x9007 => Self::Pins123Changed,
            0x9789 => Self::NeedPause,
            0x6982 => Self::NeedEncryption,
            0x6A86 => Self::InvalidParams,
            0x6286 => Self::ErrorProcessingCommand,
            0x6985 => Self::InvalidState,
            0x6D00 => Self::InsNotSupported,
            0x6A82 => Self::FileNotFound,
            other => Self::Unknown(other),
        }
    }

    /// Create from the two status bytes
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self::from_u16(((sw1 as u16) << 8) | (sw2 as u16))
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        match self {
            Self::ProcessCompleted => 0x9000,
            Self::Pin1Changed => 0x9001,
            Self::Pin2Changed => 0x9002,
            Self::Pins12Changed => 0x9003,
            Self::Pin3Changed => 0x9004,
            Self::Pins13Changed => 0x9005,
            Self::Pins23Changed => 0x9006,
            Self::Pins123Changed => 0x9007,
            Self::NeedPause => 0x9789,
            Self::NeedEncryption => 0x6982,
            Self::InvalidParams => 0x6A86,
            Self::ErrorProcessingCommand => 0x6286,
            Self::InvalidState => 0x6985,
            Self::InsNotSupported => 0x6D00,
            Self::FileNotFound => 0x6A82,
            Self::Unknown(sw) => *sw,
        }
    }

    /// Bucket this status word for the retry logic
    pub const fn class(&self) -> StatusClass {
        match self {
            Self::ProcessCompleted
            | Self::Pin1Changed
            | Self::Pin2Changed
            | Self::Pins12Changed
            | Self::Pin3Changed
            | Self::Pins13Changed
            | Self::Pins23Changed
            | Self::Pins123Changed => StatusClass::Success,
            Self::NeedPause => StatusClass::NeedsPause,
            Self::NeedEncryption => StatusClass::NeedsEncryption,
            _ => StatusClass::Failure,
        }
    }

    /// Check if this status word reports a processed command
    pub const fn is_success(&self) -> bool {
        matches!(self.class(), StatusClass::Success)
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        match self.class() {
            StatusClass::Success => Level::DEBUG,
            StatusClass::NeedsPause | StatusClass::NeedsEncryption => Level::INFO,
            StatusClass::Failure => Level::WARN,
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match self {
            Self::ProcessCompleted => "Process completed",
            Self::Pin1Changed => "Access code changed",
            Self::Pin2Changed => "Passcode changed",
            Self::Pins12Changed => "Access code and passcode changed",
            Self::Pin3Changed => "Third code changed",
            Self::Pins13Changed => "Access code and third code changed",
            Self::Pins23Changed => "Passcode and third code changed",
            Self::Pins123Changed => "All codes changed",
            Self::NeedPause => "Security delay in progress",
            Self::NeedEncryption => "Encryption required",
            Self::InvalidParams => "Invalid parameters",
            Self::ErrorProcessingCommand => "Error processing command",
            Self::InvalidState => "Invalid state",
            Self::InsNotSupported => "Instruction not supported",
            Self::FileNotFound => "File not found",
            Self::Unknown(_) => "Unknown status word",
        }
    }
}

impl From<u16> for StatusWord {
    fn from(sw: u16) -> Self {
        Self::from_u16(sw)
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sw = self.to_u16();
        write!(f, "{:02X} {:02X}", sw >> 8, sw & 0xFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_from_to_u16() {
        for sw in [0x9000, 0x9003, 0x9789, 0x6982, 0x6A86, 0x6985, 0x1234] {
            assert_eq!(StatusWord::from_u16(sw).to_u16(), sw);
        }
        assert_eq!(StatusWord::new(0x97, 0x89), StatusWord::NeedPause);
    }

    #[test]
    fn test_classification() {
        assert_eq!(StatusWord::Pins123Changed.class(), StatusClass::Success);
        assert_eq!(StatusWord::NeedPause.class(), StatusClass::NeedsPause);
        assert_eq!(
            StatusWord::NeedEncryption.class(),
            StatusClass::NeedsEncryption
        );
        assert_eq!(StatusWord::InvalidParams.class(), StatusClass::Failure);
        // Unknown codes land in the failure bucket instead of panicking
        assert_eq!(StatusWord::from_u16(0x6F00), StatusWord::Unknown(0x6F00));
        assert_eq!(StatusWord::Unknown(0x6F00).class(), StatusClass::Failure);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusWord::NeedPause.to_string(), "97 89");
        assert_eq!(StatusWord::Unknown(0x0102).to_string(), "01 02");
    }
}
