//! Body encryption for command and response APDUs
//!
//! Bodies are framed as `len(u16) | crc16(u16) | tlv` before encryption with
//! AES-256-CBC. The framing lets a wrong key be detected on decryption.

use std::fmt;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use bytes::{BufMut, Bytes, BytesMut};
use derive_more::Display;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

/// Size of a session key in bytes
pub const SESSION_KEY_SIZE: usize = 32;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Encryption tier negotiated for APDU bodies, ordered by strength
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EncryptionMode {
    /// Plain bodies
    #[default]
    #[display("none")]
    None,
    /// Symmetric key derived from session nonces
    #[display("fast")]
    Fast,
    /// Symmetric key derived from an ECDH exchange
    #[display("strong")]
    Strong,
}

impl EncryptionMode {
    /// Value carried in P1
    pub const fn byte(&self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Fast => 0x01,
            Self::Strong => 0x02,
        }
    }

    /// Next stronger tier, `None` once `Strong` is reached
    pub const fn escalated(&self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Fast),
            Self::Fast => Some(Self::Strong),
            Self::Strong => None,
        }
    }
}

/// Symmetric key for one encryption tier
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl From<[u8; SESSION_KEY_SIZE]> for SessionKey {
    fn from(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl SessionKey {
    /// Encrypt a plain TLV body
    pub fn encrypt(&self, plain: &[u8]) -> Result<Bytes, Error> {
        let len = u16::try_from(plain.len()).map_err(|_| Error::DataTooLong(plain.len()))?;

        let mut framed = BytesMut::with_capacity(plain.len() + 4);
        framed.put_u16(len);
        framed.put_u16(crc16(plain));
        framed.put_slice(plain);

        let ciphertext = Encryptor::new(&self.0.into(), &ZERO_IV.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&framed);
        Ok(Bytes::from(ciphertext))
    }

    /// Decrypt a body and verify its framing
    pub fn decrypt(&self, cipher: &[u8]) -> Result<Bytes, Error> {
        let framed = Decryptor::new(&self.0.into(), &ZERO_IV.into())
            .decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map_err(|_| Error::Decryption)?;

        if framed.len() < 4 {
            return Err(Error::Decryption);
        }
        let len = u16::from_be_bytes([framed[0], framed[1]]) as usize;
        let crc = u16::from_be_bytes([framed[2], framed[3]]);
        let plain = &framed[4..];

        if plain.len() != len || crc16(plain) != crc {
            return Err(Error::Decryption);
        }
        Ok(Bytes::copy_from_slice(plain))
    }
}

/// CRC-16/CCITT-FALSE
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, byte| {
        (0..8).fold(crc ^ (u16::from(*byte) << 8), |crc, _| {
            if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_mode_ordering_and_escalation() {
        assert!(EncryptionMode::None < EncryptionMode::Fast);
        assert!(EncryptionMode::Fast < EncryptionMode::Strong);
        assert_eq!(EncryptionMode::None.escalated(), Some(EncryptionMode::Fast));
        assert_eq!(
            EncryptionMode::Fast.escalated(),
            Some(EncryptionMode::Strong)
        );
        assert_eq!(EncryptionMode::Strong.escalated(), None);
    }

    #[test]
    fn test_encrypt_decrypt() {
        let key = SessionKey::from([0x42; SESSION_KEY_SIZE]);
        let plain = hex::decode("0108cb79000000018201").unwrap();

        let cipher = key.encrypt(&plain).unwrap();
        assert_eq!(cipher.len() % 16, 0);
        assert_ne!(cipher.as_ref(), plain.as_slice());
        assert_eq!(key.decrypt(&cipher).unwrap().as_ref(), plain.as_slice());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = SessionKey::from([0x42; SESSION_KEY_SIZE]);
        let other = SessionKey::from([0x24; SESSION_KEY_SIZE]);
        let cipher = key.encrypt(b"some tlv body").unwrap();
        assert_eq!(other.decrypt(&cipher), Err(Error::Decryption));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = SessionKey::from([0x42; SESSION_KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "SessionKey(..)");
    }
}
