use bytes::Bytes;
use nexum_tangem_apdu::{CommandApdu, Instruction, ResponseApdu, Tag, Tlv, TlvDecoder};

use super::read::{InteractionMode, decode_wallet};
use crate::command::Command;
use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};
use crate::types::{Card, Wallet, WalletIndex};

/// Result of [`ReadWalletCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadWalletResponse {
    /// Card identifier
    pub card_id: String,
    /// Wallet slot
    pub wallet: Wallet,
}

/// Result of [`ReadWalletListCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadWalletListResponse {
    /// Card identifier
    pub card_id: String,
    /// Every wallet slot reported by the card
    pub wallets: Vec<Wallet>,
}

fn map_read_error(error: Error) -> Error {
    match error {
        Error::InvalidParams => Error::PrimaryCredentialRequired,
        other => other,
    }
}

/// Read a single wallet slot (firmware 4.0 and later)
#[derive(Debug, Clone)]
pub struct ReadWalletCommand {
    index: WalletIndex,
}

impl ReadWalletCommand {
    /// Read the wallet addressed by `index`
    pub const fn new(index: WalletIndex) -> Self {
        Self { index }
    }
}

impl Command for ReadWalletCommand {
    type Response = ReadWalletResponse;

    fn map_error(&self, _card: Option<&Card>, error: Error) -> Error {
        map_read_error(error)
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.access_code())
            .append(Tag::CardId, &environment.card_id())
            .append(Tag::InteractionMode, &InteractionMode::Wallet);
        let builder = self.index.append_to(builder);
        Ok(CommandApdu::from_builder(Instruction::Read, &builder)?)
    }

    fn deserialize(
        &self,
        environment: &SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<ReadWalletResponse> {
        let tlvs = environment.decode(response)?;
        let decoder = TlvDecoder::new(&tlvs);
        Ok(ReadWalletResponse {
            card_id: decoder.decode(Tag::CardId)?,
            wallet: decode_wallet(&decoder)?,
        })
    }
}

/// Read every wallet slot (firmware 4.0 and later)
#[derive(Debug, Clone, Default)]
pub struct ReadWalletListCommand;

impl ReadWalletListCommand {
    /// Create a new wallet list read
    pub const fn new() -> Self {
        Self
    }
}

impl Command for ReadWalletListCommand {
    type Response = ReadWalletListResponse;

    fn map_error(&self, _card: Option<&Card>, error: Error) -> Error {
        map_read_error(error)
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.access_code())
            .append(Tag::CardId, &environment.card_id())
            .append(Tag::InteractionMode, &InteractionMode::WalletsList);
        Ok(CommandApdu::from_builder(Instruction::Read, &builder)?)
    }

    fn deserialize(
        &self,
        environment: &SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<ReadWalletListResponse> {
        let tlvs = environment.decode(response)?;
        let decoder = TlvDecoder::new(&tlvs);

        let wallets = decoder
            .decode_all::<Bytes>(Tag::CardWallet)?
            .iter()
            .map(|nested| {
                let records = Tlv::deserialize(nested)?;
                decode_wallet(&TlvDecoder::new(&records))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReadWalletListResponse {
            card_id: decoder.decode(Tag::CardId)?,
            wallets,
        })
    }
}
