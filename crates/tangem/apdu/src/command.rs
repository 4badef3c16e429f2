//! Command APDU definitions

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::Error;
use crate::secure_channel::{EncryptionMode, SessionKey};
use crate::tlv::TlvBuilder;

/// Class byte used by every command
pub const CLA: u8 = 0x00;

/// Instruction codes understood by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Read card (and wallet) data
    Read,
    /// Verify the card against the manufacturer key
    VerifyCard,
    /// Validate card state
    ValidateCard,
    /// Verify installed code
    VerifyCode,
    /// Write issuer data
    WriteIssuerData,
    /// Read issuer data
    ReadIssuerData,
    /// Create a wallet
    CreateWallet,
    /// Change access code and/or passcode
    SetPin,
    /// Sign hashes
    Sign,
    /// Challenge/response proof of wallet key ownership
    CheckWallet,
    /// Purge a wallet
    PurgeWallet,
    /// Negotiate a session encryption key
    OpenSession,
    /// Instruction outside the registry
    Unknown(u8),
}

impl Instruction {
    /// Wire code
    pub const fn code(&self) -> u8 {
        match self {
            Self::Read => 0xF2,
            Self::VerifyCard => 0xF3,
            Self::ValidateCard => 0xF4,
            Self::VerifyCode => 0xF5,
            Self::WriteIssuerData => 0xF6,
            Self::ReadIssuerData => 0xF7,
            Self::CreateWallet => 0xF8,
            Self::SetPin => 0xFA,
            Self::Sign => 0xFB,
            Self::CheckWallet => 0xFC,
            Self::PurgeWallet => 0xFD,
            Self::OpenSession => 0xFF,
            Self::Unknown(code) => *code,
        }
    }

    /// Resolve a wire code
    pub const fn from_code(code: u8) -> Self {
        match code {
            0xF2 => Self::Read,
            0xF3 => Self::VerifyCard,
            0xF4 => Self::ValidateCard,
            0xF5 => Self::VerifyCode,
            0xF6 => Self::WriteIssuerData,
            0xF7 => Self::ReadIssuerData,
            0xF8 => Self::CreateWallet,
            0xFA => Self::SetPin,
            0xFB => Self::Sign,
            0xFC => Self::CheckWallet,
            0xFD => Self::PurgeWallet,
            0xFF => Self::OpenSession,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({:#04x})", self.code())
    }
}

/// A command ready for transmission
///
/// The payload is the serialized TLV body, already encrypted when the
/// command was built under a tier other than [`EncryptionMode::None`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    instruction: Instruction,
    encryption: EncryptionMode,
    payload: Bytes,
}

impl CommandApdu {
    /// Create a plain command from a serialized TLV body
    pub const fn new(instruction: Instruction, payload: Bytes) -> Self {
        Self {
            instruction,
            encryption: EncryptionMode::None,
            payload,
        }
    }

    /// Build a command from a TLV builder
    pub fn from_builder(instruction: Instruction, builder: &TlvBuilder) -> Result<Self, Error> {
        Ok(Self::new(instruction, builder.serialize()?))
    }

    /// Wrap the body for `mode`, using `key` when the tier requires one
    pub fn encrypted(self, mode: EncryptionMode, key: Option<&SessionKey>) -> Result<Self, Error> {
        if mode == EncryptionMode::None {
            return Ok(self);
        }
        let key = key.ok_or(Error::MissingKey)?;
        let payload = key.encrypt(&self.payload)?;
        trace!(
            instruction = %self.instruction,
            %mode,
            plain_len = self.payload.len(),
            cipher_len = payload.len(),
            "Encrypted command body"
        );
        Ok(Self {
            instruction: self.instruction,
            encryption: mode,
            payload,
        })
    }

    /// Announce `mode` in P1 while leaving the body plain
    ///
    /// Used by the key negotiation itself, which runs before a key exists.
    pub const fn announcing(mut self, mode: EncryptionMode) -> Self {
        self.encryption = mode;
        self
    }

    /// Instruction code
    pub const fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// Tier announced in P1
    pub const fn encryption(&self) -> EncryptionMode {
        self.encryption
    }

    /// Body as transmitted
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Convert to raw APDU bytes
    ///
    /// `CLA INS P1 P2`, an extended Lc with the body, then an extended Le.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let len = u16::try_from(self.payload.len())
            .map_err(|_| Error::DataTooLong(self.payload.len()))?;

        let mut buffer = BytesMut::with_capacity(self.payload.len() + 9);
        buffer.put_u8(CLA);
        buffer.put_u8(self.instruction.code());
        buffer.put_u8(self.encryption.byte());
        buffer.put_u8(0x00);
        if !self.payload.is_empty() {
            buffer.put_u8(0x00);
            buffer.put_u16(len);
            buffer.put_slice(&self.payload);
        } else {
            buffer.put_u8(0x00);
        }
        buffer.put_u16(0x0000);
        Ok(buffer.freeze())
    }
}
