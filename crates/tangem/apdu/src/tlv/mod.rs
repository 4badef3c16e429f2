//! Tag-Length-Value codec
//!
//! A record is a one byte tag, a length and the value. Lengths below `0xFF`
//! take a single byte; longer values are prefixed with `0xFF` and a
//! big-endian `u16`.

mod builder;
mod decoder;
mod tag;

pub use builder::{TlvBuilder, ToTlvValue, expect_type};
pub use decoder::{FromTlvValue, TlvDecoder};
pub use tag::{Tag, ValueType};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::TlvError;

/// Marker for a two byte length
const EXTENDED_LENGTH: u8 = 0xFF;

/// A single tag/value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    /// Record tag
    pub tag: Tag,
    /// Record value
    pub value: Bytes,
}

impl Tlv {
    /// Create a new record
    pub fn new(tag: Tag, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Append the wire form of this record to `buf`
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<(), TlvError> {
        let len = self.value.len();
        buf.put_u8(self.tag.code());
        if len < EXTENDED_LENGTH as usize {
            buf.put_u8(len as u8);
        } else {
            let len = u16::try_from(len)
                .map_err(|_| TlvError::encoding(self.tag, "value longer than 65535 bytes"))?;
            buf.put_u8(EXTENDED_LENGTH);
            buf.put_u16(len);
        }
        buf.put_slice(&self.value);
        Ok(())
    }

    /// Serialize a sequence of records
    pub fn serialize(tlvs: &[Self]) -> Result<Bytes, TlvError> {
        let mut buf = BytesMut::new();
        for tlv in tlvs {
            tlv.write_to(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Parse a flat buffer into records
    ///
    /// Truncated framing or a length running past the end of the buffer is
    /// rejected rather than read.
    pub fn deserialize(data: &[u8]) -> Result<Vec<Self>, TlvError> {
        let mut tlvs = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let start = offset;
            let tag = Tag::from_code(data[offset]);
            offset += 1;

            let len_byte = *data.get(offset).ok_or(TlvError::Malformed(start))?;
            offset += 1;

            let len = if len_byte == EXTENDED_LENGTH {
                let hi = *data.get(offset).ok_or(TlvError::Malformed(start))?;
                let lo = *data.get(offset + 1).ok_or(TlvError::Malformed(start))?;
                offset += 2;
                u16::from_be_bytes([hi, lo]) as usize
            } else {
                len_byte as usize
            };

            let end = offset
                .checked_add(len)
                .filter(|end| *end <= data.len())
                .ok_or(TlvError::Malformed(start))?;

            tlvs.push(Self::new(tag, Bytes::copy_from_slice(&data[offset..end])));
            offset = end;
        }

        trace!(records = tlvs.len(), "Parsed TLV sequence");
        Ok(tlvs)
    }
}
