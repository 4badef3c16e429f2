//! Wire level types for Tangem cards
//!
//! This crate covers everything between a typed command and the bytes that
//! travel over NFC:
//!
//! - The TLV codec with the tag registry shared by encoder and decoder
//! - Command APDU framing and the instruction registry
//! - Response parsing and status word classification
//! - Body encryption for the negotiated encryption tiers
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod response;
pub mod secure_channel;
pub mod tlv;

pub use command::{CommandApdu, Instruction};
pub use error::{Error, Result, TlvError};
pub use response::ResponseApdu;
pub use response::status::{StatusClass, StatusWord};
pub use secure_channel::{EncryptionMode, SessionKey};
pub use tlv::{
    FromTlvValue, Tag, Tlv, TlvBuilder, TlvDecoder, ToTlvValue, ValueType, expect_type,
};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CommandApdu, EncryptionMode, Error, Instruction, ResponseApdu,
        SessionKey, StatusClass, StatusWord, Tag, Tlv, TlvBuilder, TlvDecoder, TlvError,
    };
}
