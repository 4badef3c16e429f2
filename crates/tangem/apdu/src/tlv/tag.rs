//! Tag registry shared by the encoder and the decoder

use std::fmt;

/// How the value bytes of a tag are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Raw bytes rendered as an upper-case hex string
    HexString,
    /// UTF-8 text
    Utf8String,
    /// Single unsigned byte
    U8,
    /// Big-endian u16
    U16,
    /// Big-endian u32
    U32,
    /// Presence means `true`
    Bool,
    /// Opaque bytes
    Bytes,
    /// Card lifecycle status byte
    CardStatus,
    /// Zero-terminated curve name
    EllipticCurve,
    /// Read interaction mode byte
    InteractionMode,
    /// Nested TLV sequence
    Nested,
}

macro_rules! tags {
    ($( $(#[$doc:meta])* $name:ident = $code:literal => $ty:ident ),+ $(,)?) => {
        /// TLV tag known to the card firmware
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Tag {
            $( $(#[$doc])* $name, )+
            /// Tag byte outside the registry
            Unknown(u8),
        }

        impl Tag {
            /// Wire code of this tag
            pub const fn code(&self) -> u8 {
                match self {
                    $( Self::$name => $code, )+
                    Self::Unknown(code) => *code,
                }
            }

            /// Resolve a wire code, keeping unknown codes
            pub const fn from_code(code: u8) -> Self {
                match code {
                    $( $code => Self::$name, )+
                    other => Self::Unknown(other),
                }
            }

            /// Declared value type for this tag
            pub const fn value_type(&self) -> ValueType {
                match self {
                    $( Self::$name => ValueType::$ty, )+
                    Self::Unknown(_) => ValueType::Bytes,
                }
            }
        }
    };
}

tags! {
    /// Card identifier
    CardId = 0x01 => HexString,
    /// Card lifecycle status
    Status = 0x02 => CardStatus,
    /// Card public key
    CardPublicKey = 0x03 => Bytes,
    /// Curve of the primary wallet
    CurveId = 0x05 => EllipticCurve,
    /// Settings mask
    SettingsMask = 0x0A => U16,
    /// Access code (PIN1) hash
    Pin = 0x10 => Bytes,
    /// Passcode (PIN2) hash
    Pin2 = 0x11 => Bytes,
    /// New access code hash
    NewPin = 0x12 => Bytes,
    /// New passcode hash
    NewPin2 = 0x13 => Bytes,
    /// Terminal challenge
    Challenge = 0x16 => Bytes,
    /// Card salt
    Salt = 0x17 => Bytes,
    /// Card verification code
    Cvc = 0x19 => Utf8String,
    /// Terminal half of the session key exchange
    SessionKeyA = 0x1A => Bytes,
    /// Card half of the session key exchange
    SessionKeyB = 0x1B => Bytes,
    /// Remaining security delay, in milliseconds
    Pause = 0x1C => U32,
    /// Card manufacturer name
    ManufacturerName = 0x20 => Utf8String,
    /// Read interaction mode
    InteractionMode = 0x23 => InteractionMode,
    /// Security delay is being persisted to flash
    Flash = 0x28 => Bool,
    /// Legacy NFC timeout setting
    LegacyMode = 0x29 => U8,
    /// Card requires activation
    IsActivated = 0x3A => Bool,
    /// Pause before passcode checks, in units of 10ms
    PauseBeforePin2 = 0x09 => U16,
    /// Wallet public key
    WalletPublicKey = 0x60 => Bytes,
    /// Wallet signature
    WalletSignature = 0x61 => Bytes,
    /// Remaining wallet signatures
    WalletRemainingSignatures = 0x62 => U32,
    /// Number of hashes signed by the wallet
    WalletSignedHashes = 0x63 => U32,
    /// Wallet slot index
    WalletIndex = 0x65 => U32,
    /// Number of wallet slots
    WalletsCount = 0x66 => U16,
    /// One wallet record
    CardWallet = 0x67 => Nested,
    /// Wallet slot status
    WalletStatus = 0x68 => U8,
    /// Session unique identifier
    Uid = 0x0B => Bytes,
    /// File type name
    FileTypeName = 0x70 => Utf8String,
    /// File content
    FileData = 0x71 => Bytes,
    /// Firmware version string, zero padded by the card
    FirmwareVersion = 0x80 => Utf8String,
    /// Batch identifier
    BatchId = 0x81 => HexString,
}

impl Tag {
    /// Firmware pads this text value with trailing zero bytes
    pub const fn is_zero_padded(&self) -> bool {
        matches!(self, Self::FirmwareVersion)
    }
}

impl From<u8> for Tag {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.code()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code:#04x})"),
            known => write!(f, "{known:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_codes_round_trip() {
        for tag in [Tag::CardId, Tag::Pin, Tag::Pause, Tag::Flash, Tag::FileData] {
            assert_eq!(Tag::from_code(tag.code()), tag);
        }
        assert_eq!(Tag::from_code(0xEE), Tag::Unknown(0xEE));
        assert_eq!(Tag::Unknown(0xEE).code(), 0xEE);
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Tag::Flash.value_type(), ValueType::Bool);
        assert_eq!(Tag::Pause.value_type(), ValueType::U32);
        assert_eq!(Tag::Unknown(0xEE).value_type(), ValueType::Bytes);
    }
}
