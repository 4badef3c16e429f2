//! APDU response definitions
//!
//! A response is the raw bytes returned by the card: an optionally encrypted
//! TLV body followed by the two status bytes.

pub mod status;

use bytes::Bytes;
use tracing::trace;

use crate::error::Error;
use crate::secure_channel::SessionKey;
use crate::tlv::Tlv;
use status::StatusWord;

/// Response received from the card
///
/// The body is only meaningful relative to the key that was installed when
/// the response arrived, so the key epoch of that moment travels with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    raw: Bytes,
    status: StatusWord,
    key_epoch: u64,
}

impl ResponseApdu {
    /// Parse raw response bytes received under `key_epoch`
    pub fn from_bytes(raw: Bytes, key_epoch: u64) -> Result<Self, Error> {
        if raw.len() < 2 {
            return Err(Error::IncompleteResponse(raw.len()));
        }
        let status = StatusWord::new(raw[raw.len() - 2], raw[raw.len() - 1]);

        trace!(
            status = %status,
            body_len = raw.len() - 2,
            key_epoch,
            "Parsed APDU response"
        );

        Ok(Self {
            raw,
            status,
            key_epoch,
        })
    }

    /// Status word of the response
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whole response as received
    pub const fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Body without the status word, still encrypted if it was sent so
    pub fn body(&self) -> Bytes {
        self.raw.slice(..self.raw.len() - 2)
    }

    /// Key epoch the response was received under
    pub const fn key_epoch(&self) -> u64 {
        self.key_epoch
    }

    /// Decode the TLV body
    ///
    /// `key` and `current_epoch` describe the key installed now. A response
    /// received under another epoch is refused. When a key is installed the
    /// body is decrypted first; an empty body decodes to no records.
    pub fn tlv_data(&self, key: Option<&SessionKey>, current_epoch: u64) -> Result<Vec<Tlv>, Error> {
        if self.key_epoch != current_epoch {
            return Err(Error::StaleKey);
        }

        let body = self.body();
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let plain = match key {
            Some(key) => key.decrypt(&body)?,
            None => body,
        };
        Ok(Tlv::deserialize(&plain)?)
    }
}

impl TryFrom<&[u8]> for ResponseApdu {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(Bytes::copy_from_slice(data), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_channel::SESSION_KEY_SIZE;
    use crate::tlv::{Tag, TlvBuilder};

    #[test]
    fn test_status_only_response() {
        let response = ResponseApdu::try_from(&[0x97, 0x89][..]).unwrap();
        assert_eq!(response.status(), StatusWord::NeedPause);
        assert!(response.body().is_empty());
        assert!(response.tlv_data(None, 0).unwrap().is_empty());
    }

    #[test]
    fn test_incomplete_response() {
        assert_eq!(
            ResponseApdu::try_from(&[0x90][..]),
            Err(Error::IncompleteResponse(1))
        );
    }

    #[test]
    fn test_plain_body() {
        let response = ResponseApdu::try_from(&hex::decode("1c0400000bb82801019000").unwrap()[..]).unwrap();
        assert_eq!(response.status(), StatusWord::ProcessCompleted);

        let tlvs = response.tlv_data(None, 0).unwrap();
        assert_eq!(tlvs.len(), 2);
        assert_eq!(tlvs[0].tag, Tag::Pause);
        assert_eq!(tlvs[1].tag, Tag::Flash);
    }

    #[test]
    fn test_encrypted_body_and_stale_key() {
        let key = SessionKey::from([9u8; SESSION_KEY_SIZE]);
        let plain = TlvBuilder::new()
            .append(Tag::CardId, "CB79000000018201")
            .serialize()
            .unwrap();
        let mut raw = key.encrypt(&plain).unwrap().to_vec();
        raw.extend_from_slice(&[0x90, 0x00]);

        let response = ResponseApdu::from_bytes(Bytes::from(raw), 3).unwrap();
        let tlvs = response.tlv_data(Some(&key), 3).unwrap();
        assert_eq!(tlvs[0].tag, Tag::CardId);

        assert_eq!(response.tlv_data(Some(&key), 4), Err(Error::StaleKey));
        assert_eq!(response.tlv_data(None, 4), Err(Error::StaleKey));
    }

    #[test]
    fn test_malformed_body() {
        let response = ResponseApdu::try_from(&[0x01, 0x05, 0xAA, 0x90, 0x00][..]).unwrap();
        assert!(matches!(response.tlv_data(None, 0), Err(Error::Tlv(_))));
    }
}
