use bytes::Bytes;
use nexum_tangem_apdu::{
    CommandApdu, Instruction, ResponseApdu, Tag, TlvDecoder, TlvError, ToTlvValue, ValueType,
    expect_type,
};

use crate::command::Command;
use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};
use crate::types::{Card, CardStatus, FirmwareVersion, Wallet, WalletStatus};

/// What a Read instruction returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Card data
    ReadCard,
    /// One wallet slot
    Wallet,
    /// Every wallet slot
    WalletsList,
}

impl InteractionMode {
    const fn byte(&self) -> u8 {
        match self {
            Self::ReadCard => 0x01,
            Self::Wallet => 0x02,
            Self::WalletsList => 0x03,
        }
    }
}

impl ToTlvValue for InteractionMode {
    fn to_tlv_value(&self, tag: Tag) -> Result<Option<Bytes>, TlvError> {
        expect_type(tag, &[ValueType::InteractionMode])?;
        Ok(Some(Bytes::copy_from_slice(&[self.byte()])))
    }
}

/// Read card data
///
/// The first command of every session. A wrong access code is reported as
/// invalid parameters, which is mapped to a request for the access code.
#[derive(Debug, Clone, Default)]
pub struct ReadCommand;

impl ReadCommand {
    /// Create a new Read command
    pub const fn new() -> Self {
        Self
    }
}

impl Command for ReadCommand {
    type Response = Card;

    fn needs_preflight_read(&self) -> bool {
        false
    }

    fn map_error(&self, _card: Option<&Card>, error: Error) -> Error {
        match error {
            Error::InvalidParams => Error::PrimaryCredentialRequired,
            other => other,
        }
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.access_code())
            .append(Tag::InteractionMode, &InteractionMode::ReadCard);
        Ok(CommandApdu::from_builder(Instruction::Read, &builder)?)
    }

    fn deserialize(&self, environment: &SessionEnvironment, response: &ResponseApdu) -> Result<Card> {
        let tlvs = environment.decode(response)?;
        decode_card(&TlvDecoder::new(&tlvs))
    }
}

/// Decode card metadata from a Read response
pub(crate) fn decode_card(decoder: &TlvDecoder<'_>) -> Result<Card> {
    let version: String = decoder.decode(Tag::FirmwareVersion)?;
    let firmware_version = FirmwareVersion::parse(&version)
        .ok_or_else(|| Error::DeserializationFailed(format!("invalid firmware version {version}")))?;
    let status: CardStatus = decoder.decode(Tag::Status)?;

    let mut card = Card {
        card_id: decoder.decode(Tag::CardId)?,
        manufacturer_name: decoder.decode(Tag::ManufacturerName)?,
        status,
        card_public_key: decoder.decode_optional(Tag::CardPublicKey)?,
        settings_mask: decoder.decode_optional(Tag::SettingsMask)?,
        batch_id: decoder.decode_optional(Tag::BatchId)?,
        wallets_count: decoder.decode_optional(Tag::WalletsCount)?,
        pause_before_passcode: decoder.decode_optional(Tag::PauseBeforePin2)?,
        requires_activation: decoder.decode(Tag::IsActivated)?,
        wallets: Vec::new(),
        firmware_version,
    };

    // Older cards report their single wallet together with the card
    if !card.firmware_version.supports_wallet_data() {
        let wallet_status = match status {
            CardStatus::Loaded => Some(WalletStatus::Loaded),
            CardStatus::Purged => Some(WalletStatus::Purged),
            CardStatus::Empty => Some(WalletStatus::Empty),
            CardStatus::NotPersonalized => None,
        };
        if let Some(wallet_status) = wallet_status {
            card.wallets.push(Wallet {
                index: 0,
                status: wallet_status,
                curve: decoder.decode_optional(Tag::CurveId)?,
                public_key: decoder.decode_optional(Tag::WalletPublicKey)?,
                remaining_signatures: decoder.decode_optional(Tag::WalletRemainingSignatures)?,
                signed_hashes: decoder.decode_optional(Tag::WalletSignedHashes)?,
            });
        }
    }

    Ok(card)
}

/// Decode one wallet slot from the records of a wallet read
pub(crate) fn decode_wallet(decoder: &TlvDecoder<'_>) -> Result<Wallet> {
    let status: u8 = decoder.decode(Tag::WalletStatus)?;
    Ok(Wallet {
        index: decoder.decode(Tag::WalletIndex)?,
        status: WalletStatus::from_byte(status)
            .ok_or_else(|| Error::from(TlvError::DecodingFailed(Tag::WalletStatus)))?,
        curve: decoder.decode_optional(Tag::CurveId)?,
        public_key: decoder.decode_optional(Tag::WalletPublicKey)?,
        remaining_signatures: decoder.decode_optional(Tag::WalletRemainingSignatures)?,
        signed_hashes: decoder.decode_optional(Tag::WalletSignedHashes)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EllipticCurve;
    use nexum_tangem_apdu::TlvBuilder;

    fn response(builder: TlvBuilder) -> ResponseApdu {
        let mut raw = builder.serialize().unwrap().to_vec();
        raw.extend_from_slice(&[0x90, 0x00]);
        ResponseApdu::from_bytes(Bytes::from(raw), 0).unwrap()
    }

    #[test]
    fn test_serialize() {
        let env = SessionEnvironment::default();
        let apdu = ReadCommand::new().serialize(&env).unwrap();
        assert_eq!(apdu.instruction(), Instruction::Read);

        let bytes = apdu.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0xF2, 0x00, 0x00]);
        // Hashed access code followed by the interaction mode
        assert_eq!(&bytes[7..9], &[0x10, 0x20]);
        assert_eq!(&bytes[41..44], &[0x23, 0x01, 0x01]);
    }

    #[test]
    fn test_deserialize_v4_card() {
        let env = SessionEnvironment::default();
        let builder = TlvBuilder::new()
            .append(Tag::CardId, "CB79000000018201")
            .append(Tag::ManufacturerName, "TANGEM")
            .append(Tag::Status, &CardStatus::Loaded)
            .append(Tag::FirmwareVersion, "4.52r")
            .append(Tag::WalletsCount, &2u16);
        let card = ReadCommand::new().deserialize(&env, &response(builder)).unwrap();
        assert_eq!(card.card_id, "CB79000000018201");
        assert_eq!(card.status, CardStatus::Loaded);
        assert_eq!(card.wallets_count, Some(2));
        assert!(!card.requires_activation);
        assert!(card.wallets.is_empty());
    }

    #[test]
    fn test_deserialize_legacy_card_carries_wallet() {
        let env = SessionEnvironment::default();
        let builder = TlvBuilder::new()
            .append(Tag::CardId, "BB03000000000001")
            .append(Tag::ManufacturerName, "TANGEM")
            .append(Tag::Status, &CardStatus::Loaded)
            .append(Tag::FirmwareVersion, "2.42r")
            .append(Tag::CurveId, &EllipticCurve::Secp256k1)
            .append(Tag::WalletPublicKey, &[0x04u8, 0xAA][..])
            .append(Tag::WalletRemainingSignatures, &10u32);
        let card = ReadCommand::new().deserialize(&env, &response(builder)).unwrap();
        assert_eq!(card.wallets.len(), 1);
        assert_eq!(card.wallets[0].curve, Some(EllipticCurve::Secp256k1));
        assert_eq!(card.wallets[0].remaining_signatures, Some(10));
    }

    #[test]
    fn test_missing_card_id_fails() {
        let env = SessionEnvironment::default();
        let builder = TlvBuilder::new()
            .append(Tag::ManufacturerName, "TANGEM")
            .append(Tag::Status, &CardStatus::Loaded)
            .append(Tag::FirmwareVersion, "4.52r");
        assert_eq!(
            ReadCommand::new().deserialize(&env, &response(builder)),
            Err(Error::from(TlvError::DecodingFailed(Tag::CardId)))
        );
    }

    #[test]
    fn test_invalid_params_asks_for_access_code() {
        assert_eq!(
            ReadCommand::new().map_error(None, Error::InvalidParams),
            Error::PrimaryCredentialRequired
        );
        assert_eq!(
            ReadCommand::new().map_error(None, Error::InvalidState),
            Error::InvalidState
        );
    }
}
