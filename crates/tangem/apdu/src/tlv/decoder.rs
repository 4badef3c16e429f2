//! Typed TLV decoding

use bytes::Bytes;

use super::{Tag, Tlv, ValueType};
use crate::error::TlvError;

/// Values that can be decoded from the bytes of a tag
pub trait FromTlvValue: Sized {
    /// Convert the bytes stored under `tag`
    fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError>;

    /// Value implied by the tag being absent, if any
    ///
    /// Only presence-encoded types have one; everything else treats a
    /// missing tag as a decoding failure.
    fn absent() -> Option<Self> {
        None
    }
}

fn require_type(tag: Tag, accepted: &[ValueType]) -> Result<ValueType, TlvError> {
    let value_type = tag.value_type();
    if accepted.contains(&value_type) {
        Ok(value_type)
    } else {
        Err(TlvError::DecodingFailed(tag))
    }
}

impl FromTlvValue for Bytes {
    fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError> {
        require_type(
            tag,
            &[ValueType::Bytes, ValueType::HexString, ValueType::Nested],
        )?;
        Ok(Self::copy_from_slice(value))
    }
}

impl FromTlvValue for Vec<u8> {
    fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError> {
        Bytes::from_tlv_value(tag, value).map(|bytes| bytes.to_vec())
    }
}

impl FromTlvValue for String {
    fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError> {
        match require_type(tag, &[ValueType::Utf8String, ValueType::HexString])? {
            ValueType::HexString => Ok(hex::encode_upper(value)),
            _ => {
                let end = if tag.is_zero_padded() {
                    value.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1)
                } else {
                    value.len()
                };
                std::str::from_utf8(&value[..end])
                    .map(str::to_owned)
                    .map_err(|_| TlvError::DecodingFailed(tag))
            }
        }
    }
}

impl FromTlvValue for bool {
    fn from_tlv_value(tag: Tag, _value: &[u8]) -> Result<Self, TlvError> {
        require_type(tag, &[ValueType::Bool])?;
        Ok(true)
    }

    fn absent() -> Option<Self> {
        Some(false)
    }
}

/// Decode a big-endian unsigned integer of the width declared by `tag`
fn decode_uint(tag: Tag, value: &[u8]) -> Result<u64, TlvError> {
    let width = match require_type(tag, &[ValueType::U8, ValueType::U16, ValueType::U32])? {
        ValueType::U8 => 1,
        ValueType::U16 => 2,
        _ => 4,
    };
    // Cards occasionally send shorter encodings than declared
    if value.is_empty() || value.len() > width {
        return Err(TlvError::DecodingFailed(tag));
    }
    Ok(value.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

macro_rules! uint_values {
    ($($ty:ty),+) => {
        $(
            impl FromTlvValue for $ty {
                fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError> {
                    <$ty>::try_from(decode_uint(tag, value)?)
                        .map_err(|_| TlvError::DecodingFailed(tag))
                }
            }
        )+
    };
}

uint_values!(u8, u16, u32, u64, usize);

/// Read-only view over a decoded TLV sequence
#[derive(Debug, Clone, Copy)]
pub struct TlvDecoder<'a> {
    tlvs: &'a [Tlv],
}

impl<'a> TlvDecoder<'a> {
    /// Wrap a sequence of records
    pub const fn new(tlvs: &'a [Tlv]) -> Self {
        Self { tlvs }
    }

    /// First record carrying `tag`
    pub fn find(&self, tag: Tag) -> Option<&'a Tlv> {
        self.tlvs.iter().find(|tlv| tlv.tag == tag)
    }

    /// Whether `tag` is present
    pub fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    /// Decode a required value
    pub fn decode<T: FromTlvValue>(&self, tag: Tag) -> Result<T, TlvError> {
        match self.find(tag) {
            Some(tlv) => T::from_tlv_value(tag, &tlv.value),
            None => T::absent().ok_or(TlvError::DecodingFailed(tag)),
        }
    }

    /// Decode a value that may be missing
    ///
    /// A present but unconvertible value is still an error.
    pub fn decode_optional<T: FromTlvValue>(&self, tag: Tag) -> Result<Option<T>, TlvError> {
        self.find(tag)
            .map(|tlv| T::from_tlv_value(tag, &tlv.value))
            .transpose()
    }

    /// Decode every record carrying `tag`, in order
    pub fn decode_all<T: FromTlvValue>(&self, tag: Tag) -> Result<Vec<T>, TlvError> {
        self.tlvs
            .iter()
            .filter(|tlv| tlv.tag == tag)
            .map(|tlv| T::from_tlv_value(tag, &tlv.value))
            .collect()
    }
}
