//! Error types for TLV and APDU handling

use crate::tlv::Tag;

/// Result type for this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the TLV codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    /// A value does not fit the declared type of its tag
    #[error("Encoding failed for {tag}: {reason}")]
    EncodingFailed {
        /// Tag being encoded
        tag: Tag,
        /// What was wrong with the value
        reason: &'static str,
    },

    /// A tag is absent or its bytes do not convert to the requested type
    #[error("Decoding failed for {0}")]
    DecodingFailed(Tag),

    /// Record framing is truncated or overruns the buffer
    #[error("Malformed TLV framing at offset {0}")]
    Malformed(usize),
}

impl TlvError {
    /// Create an encoding error for `tag`
    pub const fn encoding(tag: Tag, reason: &'static str) -> Self {
        Self::EncodingFailed { tag, reason }
    }
}

/// Errors raised while framing or unwrapping APDUs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// TLV codec error
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// Response shorter than a status word
    #[error("Incomplete response: {0} bytes")]
    IncompleteResponse(usize),

    /// Command body does not fit an extended APDU
    #[error("Command data too long: {0} bytes")]
    DataTooLong(usize),

    /// Body could not be decrypted with the current key
    #[error("Failed to decrypt response body")]
    Decryption,

    /// Body was encrypted under a key that is no longer installed
    #[error("Response was received under a different encryption key")]
    StaleKey,

    /// Encryption was requested without a negotiated key
    #[error("No encryption key negotiated")]
    MissingKey,
}
