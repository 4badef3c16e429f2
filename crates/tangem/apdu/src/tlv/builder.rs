//! Typed TLV encoding

use bytes::{BufMut, Bytes, BytesMut};

use super::{Tag, Tlv, ValueType};
use crate::error::TlvError;

/// Values that can be encoded under a tag
///
/// Returning `Ok(None)` writes nothing, which is how absent optionals and
/// `false` booleans are expressed on the wire.
pub trait ToTlvValue {
    /// Encode `self` according to the declared type of `tag`
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError>;
}

/// Reject `tag` unless its declared type is one of `accepted`
pub fn expect_type(tag: Tag, accepted: &[ValueType]) -> Result<ValueType, TlvError> {
    let value_type = tag.value_type();
    if accepted.contains(&value_type) {
        Ok(value_type)
    } else {
        Err(TlvError::encoding(tag, "value does not match the tag type"))
    }
}

impl<T: ToTlvValue + ?Sized> ToTlvValue for &T {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        (**self).to_tlv_value(tag)
    }
}

impl<T: ToTlvValue> ToTlvValue for Option<T> {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        match self {
            Some(value) => value.to_tlv_value(tag),
            None => Ok(None),
        }
    }
}

impl ToTlvValue for [u8] {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        expect_type(
            tag,
            &[ValueType::Bytes, ValueType::HexString, ValueType::Nested],
        )?;
        Ok(Some(Bytes::copy_from_slice(self)))
    }
}

impl ToTlvValue for Vec<u8> {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        self.as_slice().to_tlv_value(tag)
    }
}

impl ToTlvValue for Bytes {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        expect_type(
            tag,
            &[ValueType::Bytes, ValueType::HexString, ValueType::Nested],
        )?;
        Ok(Some(self.clone()))
    }
}

impl ToTlvValue for str {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        match expect_type(tag, &[ValueType::Utf8String, ValueType::HexString])? {
            ValueType::HexString => hex::decode(self)
                .map(|bytes| Some(Bytes::from(bytes)))
                .map_err(|_| TlvError::encoding(tag, "invalid hex string")),
            _ => Ok(Some(Bytes::copy_from_slice(self.as_bytes()))),
        }
    }
}

impl ToTlvValue for String {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        self.as_str().to_tlv_value(tag)
    }
}

impl ToTlvValue for bool {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        expect_type(tag, &[ValueType::Bool])?;
        Ok(self.then(|| Bytes::from_static(&[0x01])))
    }
}

/// Encode an integer as the fixed width declared by `tag`
fn encode_int(tag: Tag, value: i128) -> Result<Option<Bytes>, TlvError> {
    if value < 0 {
        return Err(TlvError::encoding(tag, "negative value"));
    }

    let mut buf = BytesMut::with_capacity(4);
    match expect_type(tag, &[ValueType::U8, ValueType::U16, ValueType::U32])? {
        ValueType::U8 => buf.put_u8(
            u8::try_from(value).map_err(|_| TlvError::encoding(tag, "value exceeds u8"))?,
        ),
        ValueType::U16 => buf.put_u16(
            u16::try_from(value).map_err(|_| TlvError::encoding(tag, "value exceeds u16"))?,
        ),
        _ => buf.put_u32(
            u32::try_from(value).map_err(|_| TlvError::encoding(tag, "value exceeds u32"))?,
        ),
    }
    Ok(Some(buf.freeze()))
}

macro_rules! int_values {
    ($($ty:ty),+) => {
        $(
            impl ToTlvValue for $ty {
                fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
                    encode_int(tag, *self as i128)
                }
            }
        )+
    };
}

int_values!(u8, u16, u32, u64, usize, i32, i64);

/// Fluent builder for a TLV sequence
///
/// The first failing `append` is remembered and reported by `serialize`,
/// so a whole chain can be checked once.
#[derive(Debug, Clone, Default)]
pub struct TlvBuilder {
    tlvs: Vec<Tlv>,
    error: Option<TlvError>,
}

impl TlvBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` under `tag`
    pub fn append<V: ToTlvValue + ?Sized>(mut self, tag: Tag, value: &V) -> Self {
        if self.error.is_none() {
            match value.to_tlv_value(tag) {
                Ok(Some(bytes)) => self.tlvs.push(Tlv::new(tag, bytes)),
                Ok(None) => {}
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Append an already built record
    pub fn append_tlv(mut self, tlv: Tlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    /// Records appended so far, or the first encoding failure
    pub fn build(self) -> Result<Vec<Tlv>, TlvError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.tlvs),
        }
    }

    /// Serialize the sequence, or report the first encoding failure
    pub fn serialize(&self) -> Result<Bytes, TlvError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Tlv::serialize(&self.tlvs),
        }
    }
}
