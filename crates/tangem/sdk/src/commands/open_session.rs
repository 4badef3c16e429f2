use bytes::Bytes;
use nexum_tangem_apdu::{CommandApdu, EncryptionMode, Instruction, ResponseApdu, Tag, TlvDecoder};

use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};

/// Card half of a key exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionResponse {
    /// Card nonce (fast) or card ephemeral public key (strong)
    pub session_key_b: Bytes,
    /// Card unique identifier, the PBKDF2 salt of the fast tier
    pub uid: Bytes,
}

/// Start an encrypted session
///
/// Sent by the key negotiator outside the retry loop, with a plain body and
/// the requested tier announced in P1. It is not a [`Command`] because it
/// produces the key every other command is encrypted with.
///
/// [`Command`]: crate::command::Command
#[derive(Debug, Clone)]
pub struct OpenSessionCommand {
    mode: EncryptionMode,
    session_key_a: Bytes,
}

impl OpenSessionCommand {
    /// Offer `session_key_a` for the `mode` tier
    pub fn new(mode: EncryptionMode, session_key_a: impl Into<Bytes>) -> Self {
        Self {
            mode,
            session_key_a: session_key_a.into(),
        }
    }

    /// Tier being negotiated
    pub const fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Build the command APDU
    pub fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let builder = environment
            .tlv_builder()
            .append(Tag::SessionKeyA, &self.session_key_a);
        Ok(CommandApdu::from_builder(Instruction::OpenSession, &builder)?.announcing(self.mode))
    }

    /// Parse the card half of the exchange
    pub fn deserialize(&self, response: &ResponseApdu) -> Result<OpenSessionResponse> {
        if !response.status().is_success() {
            return Err(Error::from_status(response.status()));
        }
        // Always plain, whatever key the session holds
        let tlvs = response.tlv_data(None, response.key_epoch())?;
        let decoder = TlvDecoder::new(&tlvs);
        Ok(OpenSessionResponse {
            session_key_b: decoder.decode(Tag::SessionKeyB)?,
            uid: decoder.decode(Tag::Uid)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexum_tangem_apdu::TlvBuilder;

    #[test]
    fn test_announces_tier_with_plain_body() {
        let env = SessionEnvironment::default();
        let command = OpenSessionCommand::new(EncryptionMode::Fast, vec![0xAA; 16]);
        let bytes = command.serialize(&env).unwrap().to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0xFF, 0x01, 0x00]);
        assert_eq!(&bytes[7..9], &[0x1A, 0x10]);
        assert_eq!(&bytes[9..25], &[0xAA; 16]);
    }

    #[test]
    fn test_deserialize() {
        let command = OpenSessionCommand::new(EncryptionMode::Fast, vec![0xAA; 16]);
        let mut raw = TlvBuilder::new()
            .append(Tag::SessionKeyB, &[0xBB; 16][..])
            .append(Tag::Uid, &[0x01, 0x02, 0x03][..])
            .serialize()
            .unwrap()
            .to_vec();
        raw.extend_from_slice(&[0x90, 0x00]);
        let response = ResponseApdu::from_bytes(Bytes::from(raw), 3).unwrap();
        let result = command.deserialize(&response).unwrap();
        assert_eq!(result.session_key_b.as_ref(), &[0xBB; 16]);
        assert_eq!(result.uid.as_ref(), &[0x01, 0x02, 0x03]);

        let refused = ResponseApdu::from_bytes(Bytes::from_static(&[0x6D, 0x00]), 0).unwrap();
        assert_eq!(command.deserialize(&refused), Err(Error::InsNotSupported));
    }
}
