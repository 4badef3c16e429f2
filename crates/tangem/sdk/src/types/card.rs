//! Card metadata learned from Read

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use derive_more::Display;
use nexum_tangem_apdu::{
    FromTlvValue, Tag, TlvBuilder, TlvError, ToTlvValue, ValueType, expect_type,
};

/// Lifecycle status of the card
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CardStatus {
    /// Blank card
    #[display("not personalized")]
    NotPersonalized,
    /// Personalized, no wallet created
    #[display("empty")]
    Empty,
    /// Wallet created
    #[display("loaded")]
    Loaded,
    /// Wallet purged
    #[display("purged")]
    Purged,
}

impl CardStatus {
    /// Resolve the status byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::NotPersonalized),
            1 => Some(Self::Empty),
            2 => Some(Self::Loaded),
            3 => Some(Self::Purged),
            _ => None,
        }
    }

    /// Status byte on the wire
    pub const fn byte(&self) -> u8 {
        match self {
            Self::NotPersonalized => 0,
            Self::Empty => 1,
            Self::Loaded => 2,
            Self::Purged => 3,
        }
    }
}

impl ToTlvValue for CardStatus {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        expect_type(tag, &[ValueType::CardStatus])?;
        Ok(Some(Bytes::copy_from_slice(&[self.byte()])))
    }
}

impl FromTlvValue for CardStatus {
    fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError> {
        if tag.value_type() != ValueType::CardStatus {
            return Err(TlvError::DecodingFailed(tag));
        }
        match value {
            [byte] => Self::from_byte(*byte).ok_or(TlvError::DecodingFailed(tag)),
            _ => Err(TlvError::DecodingFailed(tag)),
        }
    }
}

/// Status of one wallet slot
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WalletStatus {
    /// Slot is free
    #[display("empty")]
    Empty,
    /// Slot holds a key
    #[display("loaded")]
    Loaded,
    /// Slot was purged and cannot be reused
    #[display("purged")]
    Purged,
}

impl WalletStatus {
    /// Resolve the wallet status byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Empty),
            2 => Some(Self::Loaded),
            3 => Some(Self::Purged),
            _ => None,
        }
    }
}

/// Curves the card can hold wallet keys on
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EllipticCurve {
    /// secp256k1
    #[display("secp256k1")]
    Secp256k1,
    /// ed25519
    #[display("ed25519")]
    Ed25519,
    /// secp256r1 (P-256)
    #[display("secp256r1")]
    Secp256r1,
}

impl FromStr for EllipticCurve {
    type Err = crate::Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "secp256k1" => Ok(Self::Secp256k1),
            "ed25519" => Ok(Self::Ed25519),
            "secp256r1" => Ok(Self::Secp256r1),
            other => Err(crate::Error::UnsupportedCurve(other.to_string())),
        }
    }
}

impl ToTlvValue for EllipticCurve {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        expect_type(tag, &[ValueType::EllipticCurve])?;
        let mut name = self.to_string().into_bytes();
        name.push(0);
        Ok(Some(Bytes::from(name)))
    }
}

impl FromTlvValue for EllipticCurve {
    fn from_tlv_value(tag: Tag, value: &[u8]) -> Result<Self, TlvError> {
        if tag.value_type() != ValueType::EllipticCurve {
            return Err(TlvError::DecodingFailed(tag));
        }
        // Zero terminated on the wire
        let end = value.iter().position(|b| *b == 0).unwrap_or(value.len());
        std::str::from_utf8(&value[..end])
            .ok()
            .and_then(|name| name.parse().ok())
            .ok_or(TlvError::DecodingFailed(tag))
    }
}

/// Card operating system version, e.g. `4.52r`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Build suffix (`r` for release, `d SDK` for development cards)
    pub suffix: String,
}

impl FirmwareVersion {
    /// First version that keeps wallets in separate slots
    pub const WALLET_DATA: Self = Self::new(4, 0);

    /// Create a version without a suffix
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            suffix: String::new(),
        }
    }

    /// Parse the version string reported by the card
    ///
    /// Anything after the numeric part is kept as the suffix.
    pub fn parse(version: &str) -> Option<Self> {
        let (major, rest) = version.trim().split_once('.')?;
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        Some(Self {
            major: major.parse().ok()?,
            minor: rest[..digits].parse().ok()?,
            suffix: rest[digits..].trim().to_string(),
        })
    }

    /// Whether wallets are read separately from the card
    pub fn supports_wallet_data(&self) -> bool {
        *self >= Self::WALLET_DATA
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, &self.suffix).cmp(&(other.major, other.minor, &other.suffix))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}{}", self.major, self.minor, self.suffix)
    }
}

/// How a command addresses a wallet slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WalletIndex {
    /// By slot number
    Index(u32),
    /// By the public key held in the slot
    PublicKey(Bytes),
}

impl WalletIndex {
    /// Append the addressing tag to a command body
    pub fn append_to(&self, builder: TlvBuilder) -> TlvBuilder {
        match self {
            Self::Index(index) => builder.append(Tag::WalletIndex, index),
            Self::PublicKey(key) => builder.append(Tag::WalletPublicKey, key),
        }
    }

    /// Whether `wallet` is the slot this index points at
    pub fn matches(&self, wallet: &Wallet) -> bool {
        match self {
            Self::Index(index) => wallet.index == *index,
            Self::PublicKey(key) => wallet.public_key.as_ref() == Some(key),
        }
    }
}

/// One wallet slot
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wallet {
    /// Slot number
    pub index: u32,
    /// Slot status
    pub status: WalletStatus,
    /// Curve of the key, when known
    pub curve: Option<EllipticCurve>,
    /// Public key, absent for empty slots
    pub public_key: Option<Bytes>,
    /// Signatures left before the slot locks
    pub remaining_signatures: Option<u32>,
    /// Hashes signed so far
    pub signed_hashes: Option<u32>,
}

/// Card metadata installed into the session by the preflight read
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Card {
    /// Card identifier as upper-case hex
    pub card_id: String,
    /// Manufacturer name
    pub manufacturer_name: String,
    /// Lifecycle status
    pub status: CardStatus,
    /// Operating system version
    pub firmware_version: FirmwareVersion,
    /// Card public key
    pub card_public_key: Option<Bytes>,
    /// Settings mask
    pub settings_mask: Option<u16>,
    /// Batch identifier
    pub batch_id: Option<String>,
    /// Number of wallet slots
    pub wallets_count: Option<u16>,
    /// Pause before passcode checks, in units of 10ms
    pub pause_before_passcode: Option<u16>,
    /// The card still waits for its activation step
    pub requires_activation: bool,
    /// Wallets known so far
    pub wallets: Vec<Wallet>,
}

impl Card {
    /// Find the wallet addressed by `index`
    pub fn wallet(&self, index: &WalletIndex) -> Option<&Wallet> {
        self.wallets.iter().find(|wallet| index.matches(wallet))
    }

    /// Replace the known wallets
    pub fn set_wallets(&mut self, mut wallets: Vec<Wallet>) {
        wallets.sort_by_key(|wallet| wallet.index);
        self.wallets = wallets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexum_tangem_apdu::{Tlv, TlvDecoder};

    #[test]
    fn test_firmware_version() {
        let version = FirmwareVersion::parse("4.52r").unwrap();
        assert_eq!(version.major, 4);
        assert_eq!(version.minor, 52);
        assert_eq!(version.suffix, "r");
        assert!(version.supports_wallet_data());
        assert_eq!(version.to_string(), "4.52r");

        let legacy = FirmwareVersion::parse("2.42d SDK").unwrap();
        assert!(!legacy.supports_wallet_data());
        assert!(legacy < version);

        assert_eq!(FirmwareVersion::parse("garbage"), None);
    }

    #[test]
    fn test_status_and_curve_decoding() {
        let tlvs = vec![
            Tlv::new(Tag::Status, vec![0x02]),
            Tlv::new(Tag::CurveId, b"secp256k1\0".to_vec()),
        ];
        let decoder = TlvDecoder::new(&tlvs);
        assert_eq!(decoder.decode::<CardStatus>(Tag::Status), Ok(CardStatus::Loaded));
        assert_eq!(
            decoder.decode::<EllipticCurve>(Tag::CurveId),
            Ok(EllipticCurve::Secp256k1)
        );

        let bad = vec![Tlv::new(Tag::Status, vec![0x09])];
        assert_eq!(
            TlvDecoder::new(&bad).decode::<CardStatus>(Tag::Status),
            Err(TlvError::DecodingFailed(Tag::Status))
        );
    }

    #[test]
    fn test_wallet_index_matching() {
        let key = Bytes::from_static(&[0x04, 0x01]);
        let wallet = Wallet {
            index: 1,
            status: WalletStatus::Loaded,
            curve: Some(EllipticCurve::Secp256k1),
            public_key: Some(key.clone()),
            remaining_signatures: None,
            signed_hashes: None,
        };
        assert!(WalletIndex::Index(1).matches(&wallet));
        assert!(WalletIndex::PublicKey(key).matches(&wallet));
        assert!(!WalletIndex::Index(0).matches(&wallet));
    }
}
