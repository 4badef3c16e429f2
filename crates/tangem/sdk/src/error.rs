//! Error types for Tangem sessions
//!
//! [`Error`] is flat, cloneable and comparable: command hooks return and
//! compare it, and the executor decides whether to retry by looking at the
//! variant.

use nexum_tangem_apdu::{StatusWord, TlvError};

/// Result type for Tangem operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Malformed traffic or a card that does not follow the protocol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// TLV body could not be encoded or decoded
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// APDU framing or body encryption failed
    #[error(transparent)]
    Apdu(nexum_tangem_apdu::Error),

    /// A response was decoded after the key it was received under changed
    #[error("Response was received under a stale encryption key")]
    StaleEncryptionKey,

    /// A security delay response did not carry the remaining time
    #[error("Security delay response without a decodable delay")]
    UndecodableSecurityDelay,

    /// The card kept answering the same way without any state change
    #[error("No forward progress after {count} identical {status} responses")]
    NoForwardProgress {
        /// Repeated status word
        status: StatusWord,
        /// Number of identical responses seen
        count: usize,
    },

    /// The card asked for more encryption while already at the strongest tier
    #[error("Encryption requested beyond the strongest tier")]
    EncryptionExhausted,

    /// Session key negotiation failed
    #[error("Key negotiation failed: {0}")]
    KeyNegotiation(&'static str),
}

/// Link level failures, never retried by the executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No card is connected
    #[error("Card not connected")]
    NotConnected,

    /// The card left the field or the link dropped
    #[error("Connection lost")]
    ConnectionLost,

    /// The exchange itself failed
    #[error("Transmission failed: {0}")]
    Transmission(String),

    /// The session was stopped by its owner
    #[error("Session cancelled")]
    Cancelled,
}

/// Error type for Tangem operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Protocol level error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Transport level error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Access code is wrong or missing and the user declined to provide one
    #[error("Access code required")]
    PrimaryCredentialRequired,

    /// Passcode or CVC is wrong or missing and the user declined to provide one
    #[error("Passcode or CVC required")]
    SecondaryCredentialOrCvcRequired,

    /// The command needs card metadata from a preceding read
    #[error("Card must be read before running this command")]
    MissingPreflightRead,

    /// Card has not been personalized
    #[error("Card is not personalized")]
    NotPersonalized,

    /// Card has not been activated
    #[error("Card is not activated")]
    NotActivated,

    /// Requested wallet does not exist on the card
    #[error("Wallet not found")]
    WalletNotFound,

    /// Requested wallet has been purged
    #[error("Wallet is purged")]
    WalletPurged,

    /// Card rejected the parameters (6A 86)
    #[error("Invalid parameters")]
    InvalidParams,

    /// Card is not in a state to run the command (69 85)
    #[error("Invalid state")]
    InvalidState,

    /// Card does not support the instruction (6D 00)
    #[error("Instruction not supported")]
    InsNotSupported,

    /// Card failed to process the command (62 86)
    #[error("Error processing command")]
    ErrorProcessingCommand,

    /// File not found on the card (6A 82)
    #[error("File not found")]
    FileNotFound,

    /// Status word outside the known code space
    #[error("Unknown status word {0:#06x}")]
    UnknownStatus(u16),

    /// A successful response body could not be turned into a result
    #[error("Failed to deserialize response: {0}")]
    DeserializationFailed(String),

    /// Wallet signature over the challenge did not verify
    #[error("Card verification failed")]
    CardVerificationFailed,

    /// Curve name not supported
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(String),

    /// Key or signature material is malformed
    #[error("Crypto error: {0}")]
    Crypto(&'static str),
}

impl Error {
    /// Map a failure status word to the corresponding error
    pub const fn from_status(status: StatusWord) -> Self {
        match status {
            StatusWord::InvalidParams => Self::InvalidParams,
            StatusWord::InvalidState => Self::InvalidState,
            StatusWord::InsNotSupported => Self::InsNotSupported,
            StatusWord::ErrorProcessingCommand => Self::ErrorProcessingCommand,
            StatusWord::FileNotFound => Self::FileNotFound,
            other => Self::UnknownStatus(other.to_u16()),
        }
    }

    /// Classify a failure raised while turning a response into a result
    ///
    /// Malformed bodies become [`Error::DeserializationFailed`]; anything a
    /// command reports on purpose is kept as is.
    pub fn into_deserialization_failure(self) -> Self {
        match self {
            Self::Protocol(ProtocolError::Tlv(e)) => Self::DeserializationFailed(e.to_string()),
            Self::Protocol(ProtocolError::Apdu(e)) => Self::DeserializationFailed(e.to_string()),
            other => other,
        }
    }
}

impl From<nexum_tangem_apdu::Error> for ProtocolError {
    fn from(error: nexum_tangem_apdu::Error) -> Self {
        match error {
            nexum_tangem_apdu::Error::Tlv(e) => Self::Tlv(e),
            nexum_tangem_apdu::Error::StaleKey => Self::StaleEncryptionKey,
            other => Self::Apdu(other),
        }
    }
}

impl From<nexum_tangem_apdu::Error> for Error {
    fn from(error: nexum_tangem_apdu::Error) -> Self {
        Self::Protocol(error.into())
    }
}

impl From<TlvError> for Error {
    fn from(error: TlvError) -> Self {
        Self::Protocol(ProtocolError::Tlv(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexum_tangem_apdu::Tag;

    #[test]
    fn test_from_status() {
        assert_eq!(
            Error::from_status(StatusWord::InvalidParams),
            Error::InvalidParams
        );
        assert_eq!(
            Error::from_status(StatusWord::Unknown(0x6F00)),
            Error::UnknownStatus(0x6F00)
        );
    }

    #[test]
    fn test_apdu_errors_are_protocol_errors() {
        assert_eq!(
            Error::from(nexum_tangem_apdu::Error::StaleKey),
            Error::Protocol(ProtocolError::StaleEncryptionKey)
        );
        assert_eq!(
            Error::from(TlvError::DecodingFailed(Tag::CardId)),
            Error::Protocol(ProtocolError::Tlv(TlvError::DecodingFailed(Tag::CardId)))
        );
    }

    #[test]
    fn test_deserialization_failure() {
        let err = Error::from(TlvError::DecodingFailed(Tag::Salt)).into_deserialization_failure();
        assert!(matches!(err, Error::DeserializationFailed(_)));
        assert_eq!(
            Error::CardVerificationFailed.into_deserialization_failure(),
            Error::CardVerificationFailed
        );
    }
}
