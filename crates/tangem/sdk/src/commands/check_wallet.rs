use std::sync::Arc;

use bytes::Bytes;
use nexum_tangem_apdu::{CommandApdu, Instruction, ResponseApdu, Tag, TlvDecoder};
use tracing::{debug, warn};

use crate::command::{Command, PreflightReadSettings};
use crate::crypto::{NONCE_SIZE, Secp256k1Verifier, SignatureVerifier, random_bytes};
use crate::environment::SessionEnvironment;
use crate::error::{Error, Result};
use crate::types::{Card, CardStatus, EllipticCurve, WalletIndex, WalletStatus};

/// Result of [`CheckWalletCommand`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckWalletResponse {
    /// Card identifier
    pub card_id: String,
    /// Random salt chosen by the card
    pub salt: Bytes,
    /// Signature over the challenge followed by the salt
    pub wallet_signature: Bytes,
}

/// Prove that the card holds the private key of a wallet
///
/// The challenge is drawn once when the command is built, so every resend
/// of the command carries the same challenge.
#[derive(Debug, Clone)]
pub struct CheckWalletCommand {
    curve: EllipticCurve,
    index: WalletIndex,
    public_key: Bytes,
    challenge: [u8; NONCE_SIZE],
    verifier: Arc<dyn SignatureVerifier>,
}

impl CheckWalletCommand {
    /// Check the wallet holding `public_key`
    pub fn new(curve: EllipticCurve, public_key: impl Into<Bytes>) -> Self {
        let public_key = public_key.into();
        Self {
            curve,
            index: WalletIndex::PublicKey(public_key.clone()),
            public_key,
            challenge: random_bytes(),
            verifier: Arc::new(Secp256k1Verifier),
        }
    }

    /// Use another signature verifier
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Challenge sent to the card
    pub const fn challenge(&self) -> &[u8; NONCE_SIZE] {
        &self.challenge
    }

    fn verify(&self, response: &CheckWalletResponse) -> Result<()> {
        let mut message = Vec::with_capacity(NONCE_SIZE + response.salt.len());
        message.extend_from_slice(&self.challenge);
        message.extend_from_slice(&response.salt);

        if self
            .verifier
            .verify(self.curve, &self.public_key, &message, &response.wallet_signature)?
        {
            debug!(card_id = %response.card_id, "Wallet signature verified");
            Ok(())
        } else {
            warn!(card_id = %response.card_id, "Wallet signature did not verify");
            Err(Error::CardVerificationFailed)
        }
    }
}

impl Command for CheckWalletCommand {
    type Response = CheckWalletResponse;

    fn preflight_read_settings(&self) -> PreflightReadSettings {
        PreflightReadSettings::ReadWallet(self.index.clone())
    }

    fn perform_pre_check(&self, card: &Card) -> Option<Error> {
        if card.status == CardStatus::NotPersonalized {
            return Some(Error::NotPersonalized);
        }
        if card.requires_activation {
            return Some(Error::NotActivated);
        }
        match card.wallet(&self.index).map(|wallet| wallet.status) {
            Some(WalletStatus::Loaded) => None,
            Some(WalletStatus::Purged) => Some(Error::WalletPurged),
            Some(WalletStatus::Empty) | None => Some(Error::WalletNotFound),
        }
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let builder = environment
            .tlv_builder()
            .append(Tag::Pin, environment.access_code())
            .append(Tag::CardId, &environment.card_id())
            .append(Tag::Challenge, &self.challenge[..]);

        // Single wallet cards address their only wallet implicitly
        let addressed = environment
            .card()
            .is_none_or(|card| card.firmware_version.supports_wallet_data());
        let builder = if addressed {
            self.index.append_to(builder)
        } else {
            builder
        };
        Ok(CommandApdu::from_builder(Instruction::CheckWallet, &builder)?)
    }

    fn deserialize(
        &self,
        environment: &SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<CheckWalletResponse> {
        let tlvs = environment.decode(response)?;
        let decoder = TlvDecoder::new(&tlvs);
        let response = CheckWalletResponse {
            card_id: decoder.decode(Tag::CardId)?,
            salt: decoder.decode(Tag::Salt)?,
            wallet_signature: decoder.decode(Tag::WalletSignature)?,
        };
        self.verify(&response)?;
        Ok(response)
    }
}
