use bytes::Bytes;
use nexum_tangem_apdu::{Tag, Tlv, TlvBuilder, TlvDecoder};

use crate::Result;

/// File payload tagged with a type name
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedFile {
    /// File type name
    pub name: String,
    /// File content
    pub payload: Bytes,
}

impl NamedFile {
    /// Create a new named file
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Parse the TLV encoded form
    pub fn from_tlv_data(data: &[u8]) -> Result<Self> {
        let tlvs = Tlv::deserialize(data)?;
        let decoder = TlvDecoder::new(&tlvs);
        Ok(Self {
            name: decoder.decode(Tag::FileTypeName)?,
            payload: decoder.decode(Tag::FileData)?,
        })
    }

    /// Serialize into the TLV encoded form
    pub fn serialize(&self) -> Result<Bytes> {
        Ok(TlvBuilder::new()
            .append(Tag::FileTypeName, &self.name)
            .append(Tag::FileData, &self.payload)
            .serialize()?)
    }
}
